//! Learned-latent encoder.
//!
//! A pretrained universal potential provides a 128-D latent vector per structure.
//! No such model ships with this crate: callers plug one in through
//! [`LatentModelLoader`]. When the model is unavailable, or a call into it fails,
//! the encoder switches to a deterministic composition+geometry vector so the
//! pipeline still runs (at reduced fidelity).

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::structure::Structure;

/// Identifier of the pretrained model requested from the loader.
pub const MODEL_ID: &str = "M3GNet-MP-2023";

/// Length of the latent vector (and of the fallback vector).
pub const LATENT_DIM: usize = 128;

/// Elements with a dedicated composition slot, in slot order.
pub const COMPOSITION_ELEMENTS: [&str; 20] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca",
];

/// Failure reported by a latent model at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError(pub String);

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ModelError {}

/// A pretrained model that maps a structure to a latent vector.
pub trait LatentModel: Send + Sync {
    /// Latent representation of `structure`.
    fn predict_latent(&self, structure: &Structure) -> std::result::Result<Vec<f64>, ModelError>;
}

/// Loads a [`LatentModel`] by identifier.
pub trait LatentModelLoader: Send + Sync {
    /// Returns `None` when the model (or its runtime) is not installed.
    fn load(&self, model_id: &str) -> Option<Arc<dyn LatentModel>>;
}

/// Loader used when nothing is configured: the model is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModel;

impl LatentModelLoader for NoModel {
    fn load(&self, _model_id: &str) -> Option<Arc<dyn LatentModel>> {
        None
    }
}

/// Why the encoder fell back to the composition vector.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// The loader could not provide a model.
    ModelUnavailable,
    /// The model returned an error.
    Runtime(String),
    /// The model returned a vector of the wrong length.
    WrongLength {
        /// Expected length.
        expected: usize,
        /// Returned length.
        found: usize,
    },
    /// The model returned NaN or infinite values.
    NonFinite,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::ModelUnavailable => f.write_str("model unavailable"),
            FallbackReason::Runtime(msg) => write!(f, "runtime failure: {msg}"),
            FallbackReason::WrongLength { expected, found } => {
                write!(f, "latent length {found}, expected {expected}")
            }
            FallbackReason::NonFinite => f.write_str("latent contains non-finite values"),
        }
    }
}

/// Result of asking the model for a latent vector.
#[derive(Debug, Clone, PartialEq)]
pub enum LatentOutcome {
    /// The model produced a usable latent vector.
    Model(Vec<f64>),
    /// The model could not be used.
    Fallback(FallbackReason),
}

impl LatentOutcome {
    /// Query `model` (if any) and classify the answer.
    pub fn query(model: Option<&dyn LatentModel>, structure: &Structure) -> Self {
        let Some(model) = model else {
            return LatentOutcome::Fallback(FallbackReason::ModelUnavailable);
        };
        match model.predict_latent(structure) {
            Err(e) => LatentOutcome::Fallback(FallbackReason::Runtime(e.0)),
            Ok(v) if v.len() != LATENT_DIM => LatentOutcome::Fallback(FallbackReason::WrongLength {
                expected: LATENT_DIM,
                found: v.len(),
            }),
            Ok(v) if v.iter().any(|x| !x.is_finite()) => {
                LatentOutcome::Fallback(FallbackReason::NonFinite)
            }
            Ok(v) => LatentOutcome::Model(v),
        }
    }

    /// True if the fallback path was taken.
    pub fn is_fallback(&self) -> bool {
        matches!(self, LatentOutcome::Fallback(_))
    }
}

/// Deterministic composition+geometry vector of length [`LATENT_DIM`].
///
/// - slots `0..20`: fraction of sites occupied by each of [`COMPOSITION_ELEMENTS`]
///   (elements outside the list contribute only to the denominator);
/// - slot `20`: volume per site / 100, or `0.0` for non-periodic structures;
/// - remaining slots: zero.
pub fn composition_vector(structure: &Structure) -> Result<Vec<f64>> {
    if structure.is_empty() {
        return Err(Error::EmptyInput);
    }
    let n_sites = structure.len() as f64;
    let mut vec = vec![0.0f64; LATENT_DIM];

    for site in &structure.sites {
        if let Some(slot) = COMPOSITION_ELEMENTS
            .iter()
            .position(|&el| el == site.species)
        {
            vec[slot] += 1.0;
        }
    }
    for v in &mut vec[..COMPOSITION_ELEMENTS.len()] {
        *v /= n_sites;
    }

    // Breaks ties between structures with identical composition.
    vec[COMPOSITION_ELEMENTS.len()] = structure.volume().map_or(0.0, |v| v / n_sites / 100.0);

    Ok(vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::Lattice;

    struct Fixed(Vec<f64>);

    impl LatentModel for Fixed {
        fn predict_latent(&self, _: &Structure) -> std::result::Result<Vec<f64>, ModelError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl LatentModel for Broken {
        fn predict_latent(&self, _: &Structure) -> std::result::Result<Vec<f64>, ModelError> {
            Err(ModelError("graph construction failed".into()))
        }
    }

    fn li(a: f64) -> Structure {
        Structure::periodic(Lattice::cubic(a), ["Li"], &[[0.0; 3]]).unwrap()
    }

    #[test]
    fn composition_histogram_and_volume_slot() {
        let s = Structure::periodic(
            Lattice::cubic(4.0),
            ["Li", "Li", "O", "Fe"],
            &[[0.0; 3], [0.5, 0.5, 0.5], [0.25, 0.25, 0.25], [0.75, 0.75, 0.75]],
        )
        .unwrap();
        let v = composition_vector(&s).unwrap();
        assert_eq!(v.len(), LATENT_DIM);
        assert_eq!(v[2], 0.5); // Li
        assert_eq!(v[7], 0.25); // O
        // Fe has no slot; fractions need not sum to one.
        assert_eq!(v[..20].iter().sum::<f64>(), 0.75);
        assert_eq!(v[20], 64.0 / 4.0 / 100.0);
        assert!(v[21..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn same_composition_differs_only_in_volume_slot() {
        let a = composition_vector(&li(3.5)).unwrap();
        let b = composition_vector(&li(3.6)).unwrap();
        for i in 0..LATENT_DIM {
            if i == 20 {
                assert_ne!(a[i], b[i]);
            } else {
                assert_eq!(a[i].to_bits(), b[i].to_bits());
            }
        }
        let again = composition_vector(&li(3.5)).unwrap();
        assert!(a.iter().zip(&again).all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn molecule_volume_slot_is_zero() {
        let s = Structure::molecule(["H", "H"], &[[0.0; 3], [0.74, 0.0, 0.0]]).unwrap();
        let v = composition_vector(&s).unwrap();
        assert_eq!(v[0], 1.0);
        assert_eq!(v[20], 0.0);
    }

    #[test]
    fn empty_structure_is_rejected() {
        let s = Structure::molecule(Vec::<String>::new(), &[]).unwrap();
        assert!(matches!(composition_vector(&s), Err(Error::EmptyInput)));
    }

    #[test]
    fn outcome_classification() {
        let s = li(3.5);
        assert_eq!(
            LatentOutcome::query(None, &s),
            LatentOutcome::Fallback(FallbackReason::ModelUnavailable)
        );
        assert!(matches!(
            LatentOutcome::query(Some(&Broken), &s),
            LatentOutcome::Fallback(FallbackReason::Runtime(_))
        ));
        assert_eq!(
            LatentOutcome::query(Some(&Fixed(vec![1.0; 3])), &s),
            LatentOutcome::Fallback(FallbackReason::WrongLength { expected: 128, found: 3 })
        );
        let mut nan = vec![0.0; LATENT_DIM];
        nan[5] = f64::NAN;
        assert_eq!(
            LatentOutcome::query(Some(&Fixed(nan)), &s),
            LatentOutcome::Fallback(FallbackReason::NonFinite)
        );
        let ok = vec![0.5; LATENT_DIM];
        assert_eq!(
            LatentOutcome::query(Some(&Fixed(ok.clone())), &s),
            LatentOutcome::Model(ok)
        );
    }

    #[test]
    fn default_loader_has_no_model() {
        assert!(NoModel.load(MODEL_ID).is_none());
    }
}
