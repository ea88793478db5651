//! DIRECT sampling facade: encode → whiten → cluster → pick.

use std::sync::Arc;

use tracing::debug;

use super::birch::Birch;
use super::context::PipelineContext;
use super::encoder::Encoder;
use super::pca::WhitenedPca;
use super::stratified::StratifiedPicker;
use super::tags::{DomainTag, TagParams};
use crate::error::{Error, Result};
use crate::structure::Structure;

/// Everything a sampling run decided, for logging and inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleReport {
    /// Selected structure indices, ascending.
    pub indices: Vec<usize>,
    /// `max(1, dft_budget / k)`.
    pub n_clusters_requested: usize,
    /// Clusters actually formed.
    pub n_clusters_formed: usize,
    /// Retained principal components (0 when PCA was skipped).
    pub n_components: usize,
    /// Length of the raw feature vectors.
    pub feature_dim: usize,
    /// Structures encoded with the composition+geometry fallback.
    pub fallback_encodings: usize,
    /// Clusters sampled with replacement because they had fewer than `k` members.
    pub undersized_clusters: usize,
}

/// Selects structures for DFT single points with DIRECT sampling.
///
/// # Example
///
/// ```
/// use direct_sampler::{DirectSampler, DomainTag, Lattice, Structure};
///
/// let structures: Vec<Structure> = (0..30)
///     .map(|i| {
///         let a = 3.0 + 0.5 * (i / 10) as f64 + 0.001 * (i % 10) as f64;
///         Structure::periodic(Lattice::cubic(a), ["Li"], &[[0.0; 3]]).unwrap()
///     })
///     .collect();
///
/// let picked = DirectSampler::new(DomainTag::Battery)
///     .with_seed(0)
///     .sample(&structures, 3)
///     .unwrap();
/// assert_eq!(picked.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct DirectSampler {
    tag: DomainTag,
    params: TagParams,
    k: usize,
    seed: u64,
    context: Arc<PipelineContext>,
}

impl DirectSampler {
    /// Sampler for `tag` with its table hyperparameters, `k = 1`, `seed = 42`
    /// and the process-wide [`PipelineContext`].
    pub fn new(tag: DomainTag) -> Self {
        Self {
            tag,
            params: TagParams::for_tag(tag),
            k: 1,
            seed: 42,
            context: PipelineContext::global(),
        }
    }

    /// Set representatives per cluster.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the seed used when clusters are smaller than `k`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the tag's table hyperparameters.
    pub fn with_params(mut self, params: TagParams) -> Self {
        self.params = params;
        self
    }

    /// Use a specific model cache instead of the process-wide one.
    pub fn with_context(mut self, context: Arc<PipelineContext>) -> Self {
        self.context = context;
        self
    }

    /// The domain tag.
    pub fn tag(&self) -> DomainTag {
        self.tag
    }

    /// Hyperparameters in effect.
    pub fn params(&self) -> &TagParams {
        &self.params
    }

    /// Indices of the structures to compute, ascending.
    pub fn sample(&self, structures: &[Structure], dft_budget: usize) -> Result<Vec<usize>> {
        Ok(self.sample_report(structures, dft_budget)?.indices)
    }

    /// Run the pipeline and report intermediate sizes alongside the selection.
    pub fn sample_report(
        &self,
        structures: &[Structure],
        dft_budget: usize,
    ) -> Result<SampleReport> {
        if self.k < 1 {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "must be at least 1",
            });
        }
        self.params.validate()?;
        if structures.is_empty() {
            return Err(Error::EmptyInput);
        }

        let n_clusters = (dft_budget / self.k).max(1);
        let batch = Encoder::for_tag(self.tag).encode_batch(&self.context, structures)?;
        let feature_dim = batch.rows[0].len();
        let picker = StratifiedPicker::new(self.k).with_seed(self.seed);

        let (pick, n_formed, n_components) = if structures.len() == 1 {
            (picker.pick(&[0])?, 1, 0)
        } else {
            let (pcs, pca) = WhitenedPca::fit_transform(&batch.rows, self.params.variance_cut)?;
            let fit = Birch::new(n_clusters)
                .with_threshold(self.params.threshold)
                .with_branching_factor(self.params.branching_factor)
                .fit(&pcs)?;
            (
                picker.pick_ranked(&fit.labels, &fit.distances)?,
                fit.n_clusters_formed,
                pca.n_components(),
            )
        };

        debug!(
            tag = %self.tag,
            structures = structures.len(),
            dft_budget,
            k = self.k,
            requested = n_clusters,
            formed = n_formed,
            selected = pick.indices.len(),
            "DIRECT sampling finished"
        );

        Ok(SampleReport {
            indices: pick.indices,
            n_clusters_requested: n_clusters,
            n_clusters_formed: n_formed,
            n_components,
            feature_dim,
            fallback_encodings: batch.fallback_count,
            undersized_clusters: pick.undersized_clusters,
        })
    }
}

/// Select structures for `tag` (given as a string) with the process-wide context.
///
/// The tag is validated before any structure is encoded.
pub fn sample_direct(
    structures: &[Structure],
    tag: &str,
    dft_budget: usize,
    k: usize,
    seed: u64,
) -> Result<Vec<usize>> {
    let tag: DomainTag = tag.parse()?;
    DirectSampler::new(tag)
        .with_k(k)
        .with_seed(seed)
        .sample(structures, dft_budget)
}
