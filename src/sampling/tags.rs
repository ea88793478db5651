//! Domain tags and their hyperparameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Cluster threshold used by tags without an explicit entry.
pub const DEFAULT_THRESHOLD: f64 = 1.5;

/// Variance cutoff used when a tag has no explicit entry.
pub const DEFAULT_VARIANCE_CUT: f64 = 0.95;

/// BIRCH branching factor.
pub const DEFAULT_BRANCHING_FACTOR: usize = 50;

/// Which encoder family a tag uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderKind {
    /// Learned-model latent vector with a composition+geometry fallback.
    Latent,
    /// Averaged local power-spectrum descriptor for non-periodic clusters.
    Descriptor,
}

/// Chemical/physical domain a batch of structures belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainTag {
    /// Battery materials.
    Battery,
    /// Polar perovskites.
    PolarPerovskite,
    /// Surfaces for catalysis.
    SurfaceCat,
    /// Polymer fragments.
    Polymer,
    /// Liquid electrolyte clusters.
    Electrolyte,
}

impl DomainTag {
    /// Every registered tag.
    pub const ALL: [DomainTag; 5] = [
        DomainTag::Battery,
        DomainTag::PolarPerovskite,
        DomainTag::SurfaceCat,
        DomainTag::Polymer,
        DomainTag::Electrolyte,
    ];

    /// Canonical string form.
    pub fn as_str(self) -> &'static str {
        match self {
            DomainTag::Battery => "battery",
            DomainTag::PolarPerovskite => "polar_perovskite",
            DomainTag::SurfaceCat => "surface_cat",
            DomainTag::Polymer => "polymer",
            DomainTag::Electrolyte => "electrolyte",
        }
    }

    /// Encoder family for this tag.
    pub fn encoder_kind(self) -> EncoderKind {
        match self {
            DomainTag::Battery | DomainTag::PolarPerovskite | DomainTag::SurfaceCat => {
                EncoderKind::Latent
            }
            // Polymers use the descriptor until a molecular GNN encoder exists.
            DomainTag::Polymer | DomainTag::Electrolyte => EncoderKind::Descriptor,
        }
    }

    /// Cumulative explained variance the PCA step must retain.
    pub fn variance_cut(self) -> f64 {
        match self {
            DomainTag::Battery => 0.95,
            DomainTag::PolarPerovskite => 0.98,
            DomainTag::SurfaceCat => 0.98,
            DomainTag::Polymer => 0.90,
            DomainTag::Electrolyte => 0.97,
        }
    }

    /// BIRCH merge radius in whitened PCA space.
    pub fn cluster_threshold(self) -> f64 {
        match self {
            // Tight enough to resolve many Li bcc variants.
            DomainTag::Battery => 0.05,
            DomainTag::SurfaceCat => 0.8,
            DomainTag::Electrolyte => 1.2,
            _ => DEFAULT_THRESHOLD,
        }
    }
}

impl fmt::Display for DomainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DomainTag::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownTag { tag: s.to_string() })
    }
}

/// Hyperparameters for one sampling run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TagParams {
    /// PCA cumulative explained-variance target, in `(0, 1]`.
    pub variance_cut: f64,
    /// BIRCH subcluster radius.
    pub threshold: f64,
    /// BIRCH tree fan-out.
    pub branching_factor: usize,
}

impl Default for TagParams {
    fn default() -> Self {
        Self {
            variance_cut: DEFAULT_VARIANCE_CUT,
            threshold: DEFAULT_THRESHOLD,
            branching_factor: DEFAULT_BRANCHING_FACTOR,
        }
    }
}

impl TagParams {
    /// Parameters from the fixed per-tag tables.
    pub fn for_tag(tag: DomainTag) -> Self {
        Self {
            variance_cut: tag.variance_cut(),
            threshold: tag.cluster_threshold(),
            branching_factor: DEFAULT_BRANCHING_FACTOR,
        }
    }

    /// Set the variance cutoff.
    #[must_use]
    pub fn with_variance_cut(mut self, variance_cut: f64) -> Self {
        self.variance_cut = variance_cut;
        self
    }

    /// Set the clustering threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the branching factor.
    #[must_use]
    pub fn with_branching_factor(mut self, branching_factor: usize) -> Self {
        self.branching_factor = branching_factor;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.variance_cut > 0.0 && self.variance_cut <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "variance_cut",
                message: "must be in (0, 1]",
            });
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(Error::InvalidParameter {
                name: "threshold",
                message: "must be positive and finite",
            });
        }
        if self.branching_factor < 2 {
            return Err(Error::InvalidParameter {
                name: "branching_factor",
                message: "must be at least 2",
            });
        }
        Ok(())
    }
}
