use thiserror::Error;

/// Errors returned by the sampling pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Input is empty (no structures, no feature rows, or a structure without sites).
    #[error("empty input")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// Domain tag is not registered.
    #[error(
        "unknown tag '{tag}'. Available: battery, polar_perovskite, surface_cat, polymer, electrolyte"
    )]
    UnknownTag {
        /// The rejected tag.
        tag: String,
    },

    /// Rows of a feature matrix have inconsistent dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// A structure contains a species the local descriptor was not configured for.
    #[error("species {species} is not covered by the configured descriptor")]
    UnknownSpecies {
        /// Offending element symbol.
        species: String,
    },

    /// A matrix decomposition failed.
    #[error("decomposition failed: {0}")]
    Decomposition(&'static str),

    /// Reading a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing a YAML configuration document failed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
