//! DIRECT sampling: pick a small, representative subset of structures.
//!
//! ## Pipeline
//!
//! ```text
//! structures ─encode─▶ features (N × D)
//!            ─standardise + PCA + whiten─▶ components (N × D')
//!            ─BIRCH─▶ labels + distance to cluster centroid
//!            ─stratified pick─▶ sorted indices
//! ```
//!
//! ### Encoders
//!
//! Each [`DomainTag`] selects one encoder family:
//!
//! - **Latent**: a pretrained model's 128-D latent vector. Without a model (or when
//!   it fails) a deterministic composition+geometry vector is used instead, and the
//!   fallback is reported rather than hidden.
//! - **Descriptor**: an averaged local power spectrum, for non-periodic clusters.
//!
//! ### Whitening
//!
//! Features are standardised per column, projected onto the leading principal
//! components covering the tag's variance cutoff, and each component is scaled by
//! the square root of its explained variance.
//!
//! ### Clustering and selection
//!
//! BIRCH builds a CF-tree with the tag's radius threshold, then merges leaf
//! subclusters into `max(1, dft_budget / k)` clusters. The picker takes `k` rows
//! per cluster, closest to the centroid first.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use direct_sampler::sampling::{DirectSampler, DomainTag, PipelineContext};
//! use direct_sampler::{Lattice, Structure};
//!
//! let structures: Vec<Structure> = [3.0, 3.01, 4.0, 4.01, 5.0, 5.01]
//!     .iter()
//!     .map(|&a| Structure::periodic(Lattice::cubic(a), ["Li"], &[[0.0; 3]]).unwrap())
//!     .collect();
//!
//! let report = DirectSampler::new(DomainTag::Battery)
//!     .with_context(Arc::new(PipelineContext::new()))
//!     .sample_report(&structures, 3)
//!     .unwrap();
//! assert_eq!(report.indices.len(), 3);
//! assert_eq!(report.fallback_encodings, 6);
//! ```

mod birch;
mod context;
mod descriptor;
mod encoder;
mod latent;
mod pca;
mod sampler;
mod stratified;
mod tags;
mod traits;
mod util;

pub use birch::{birch_cluster, Birch, BirchFit, ClusteringFeature};
pub use context::PipelineContext;
pub use descriptor::{PowerSpectrum, PowerSpectrumParams};
pub use encoder::{Encoded, EncodedBatch, Encoder};
pub use latent::{
    composition_vector, FallbackReason, LatentModel, LatentModelLoader, LatentOutcome, ModelError,
    NoModel, COMPOSITION_ELEMENTS, LATENT_DIM, MODEL_ID,
};
pub use pca::{whiten, WhitenedPca};
pub use sampler::{sample_direct, DirectSampler, SampleReport};
pub use stratified::{stratified_pick, PickOutcome, StratifiedPicker};
pub use tags::{
    DomainTag, EncoderKind, TagParams, DEFAULT_BRANCHING_FACTOR, DEFAULT_THRESHOLD,
    DEFAULT_VARIANCE_CUT,
};
pub use traits::Clustering;
