//! Budgeted selection of atomic structures for DFT.
//!
//! `direct_sampler` implements DIRECT sampling: encode each candidate structure as a
//! feature vector, reduce it with whitened PCA, cluster with BIRCH, and keep a few
//! representatives per cluster so the selection covers configuration space.
//!
//! The primary public API is under [`sampling`], which provides:
//! - encoders (learned latent with a deterministic fallback, local power spectrum)
//! - whitening PCA
//! - BIRCH clustering
//! - stratified representative picking
//! - the [`DirectSampler`] facade
//!
//! [`dft`] holds the thin hand-off to single-point calculations: queue routing and
//! a static-flow description.

#![forbid(unsafe_code)]

pub mod dft;
pub mod error;
pub mod sampling;
pub mod structure;

pub use error::{Error, Result};
pub use sampling::{sample_direct, Clustering, DirectSampler, DomainTag, PipelineContext, TagParams};
pub use structure::{Lattice, Site, Structure};
