//! Standardisation + PCA with whitening.
//!
//! 1. Standardise each column to zero mean and unit (population) variance.
//! 2. Full SVD of the standardised matrix; keep the fewest components whose
//!    cumulative explained-variance ratio reaches `variance_cut`.
//! 3. Project onto the kept components and scale column `i` by
//!    `sqrt(explained_variance[i])`.
//!
//! Component signs are fixed so that each component's largest-magnitude loading
//! is positive, which makes the output independent of the SVD routine's sign
//! choice.

use nalgebra::DMatrix;
use tracing::debug;

use super::util;
use crate::error::{Error, Result};

const SVD_EPS: f64 = 1e-12;
const SVD_MAX_ITER: usize = 10_000;

/// Fitted whitening PCA.
#[derive(Debug, Clone, PartialEq)]
pub struct WhitenedPca {
    mean: Vec<f64>,
    scale: Vec<f64>,
    /// Retained components, one row each, length = input dimension.
    components: Vec<Vec<f64>>,
    explained_variance: Vec<f64>,
    explained_variance_ratio: Vec<f64>,
}

impl WhitenedPca {
    /// Fit on `features` (N rows of equal length D, N >= 2) and return the
    /// whitened components of the training rows with the fitted model.
    pub fn fit_transform(
        features: &[Vec<f64>],
        variance_cut: f64,
    ) -> Result<(Vec<Vec<f64>>, Self)> {
        if !(variance_cut > 0.0 && variance_cut <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "variance_cut",
                message: "must be in (0, 1]",
            });
        }
        let d = util::validate_rows(features)?;
        let n = features.len();
        if n < 2 {
            return Err(Error::InvalidParameter {
                name: "features",
                message: "need at least two rows",
            });
        }

        let (mean, scale) = column_stats(features, d);
        let x = DMatrix::from_fn(n, d, |i, j| (features[i][j] - mean[j]) / scale[j]);

        if x.iter().all(|v| *v == 0.0) {
            // Constant input: one null axis.
            let model = Self {
                mean,
                scale,
                components: vec![vec![0.0; d]],
                explained_variance: vec![0.0],
                explained_variance_ratio: vec![1.0],
            };
            let pcs = model.transform(features)?;
            return Ok((pcs, model));
        }

        let svd = x
            .try_svd(false, true, SVD_EPS, SVD_MAX_ITER)
            .ok_or(Error::Decomposition("SVD did not converge"))?;
        let v_t = svd
            .v_t
            .ok_or(Error::Decomposition("SVD returned no right singular vectors"))?;

        // nalgebra does not promise any ordering of singular values.
        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&a, &b| {
            svd.singular_values[b]
                .total_cmp(&svd.singular_values[a])
                .then(a.cmp(&b))
        });

        let denom = (n - 1) as f64;
        let variances: Vec<f64> = order
            .iter()
            .map(|&i| svd.singular_values[i].powi(2) / denom)
            .collect();
        let total: f64 = variances.iter().sum();

        if !(total > 0.0 && total.is_finite()) {
            return Err(Error::Decomposition("non-positive total variance"));
        }
        let ratios: Vec<f64> = variances.iter().map(|v| v / total).collect();
        let keep = retained_count(&ratios, variance_cut);

        let model = Self {
            mean,
            scale,
            components: order[..keep]
                .iter()
                .map(|&i| oriented(v_t.row(i).iter().copied().collect()))
                .collect(),
            explained_variance: variances[..keep].to_vec(),
            explained_variance_ratio: ratios[..keep].to_vec(),
        };
        debug!(
            rows = n,
            dim = d,
            retained = model.n_components(),
            cumulative = model.cumulative_variance_ratio(),
            "whitened PCA fitted"
        );
        let pcs = model.transform(features)?;
        Ok((pcs, model))
    }

    /// Project rows with the fitted model.
    pub fn transform(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let d = self.mean.len();
        let mut standardised = vec![0.0f64; d];
        features
            .iter()
            .map(|row| {
                if row.len() != d {
                    return Err(Error::DimensionMismatch {
                        expected: d,
                        found: row.len(),
                    });
                }
                for j in 0..d {
                    standardised[j] = (row[j] - self.mean[j]) / self.scale[j];
                }
                Ok(self
                    .components
                    .iter()
                    .zip(&self.explained_variance)
                    .map(|(axis, var)| dot(axis, &standardised) * var.sqrt())
                    .collect())
            })
            .collect()
    }

    /// Number of retained components.
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Retained components (rows).
    pub fn components(&self) -> &[Vec<f64>] {
        &self.components
    }

    /// Variance along each retained component.
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    /// Fraction of total variance along each retained component.
    pub fn explained_variance_ratio(&self) -> &[f64] {
        &self.explained_variance_ratio
    }

    /// Sum of [`Self::explained_variance_ratio`].
    pub fn cumulative_variance_ratio(&self) -> f64 {
        self.explained_variance_ratio.iter().sum()
    }
}

/// Shorthand for [`WhitenedPca::fit_transform`].
pub fn whiten(features: &[Vec<f64>], variance_cut: f64) -> Result<(Vec<Vec<f64>>, WhitenedPca)> {
    WhitenedPca::fit_transform(features, variance_cut)
}

/// Column means and population standard deviations (1 for constant columns).
fn column_stats(features: &[Vec<f64>], d: usize) -> (Vec<f64>, Vec<f64>) {
    let n = features.len() as f64;
    let mut mean = vec![0.0f64; d];
    for row in features {
        for (m, x) in mean.iter_mut().zip(row) {
            *m += x;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);

    let mut var = vec![0.0f64; d];
    for row in features {
        for j in 0..d {
            let c = row[j] - mean[j];
            var[j] += c * c;
        }
    }
    let mut scale = vec![1.0f64; d];
    for j in 0..d {
        let sd = (var[j] / n).sqrt();
        // Rounding in the mean leaves a tiny spread on constant columns.
        if sd.is_finite() && sd > 10.0 * f64::EPSILON * mean[j].abs().max(1.0) {
            scale[j] = sd;
        } else {
            // Centre on an actual value so the column standardises to exact zeros.
            mean[j] = features[0][j];
        }
    }
    (mean, scale)
}

/// Fewest leading components whose cumulative ratio reaches `cut`.
fn retained_count(ratios: &[f64], cut: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, r) in ratios.iter().enumerate() {
        cumulative += r;
        // Tolerate rounding in the running sum.
        if cumulative >= cut - 1e-12 {
            return i + 1;
        }
    }
    ratios.len()
}

fn oriented(mut axis: Vec<f64>) -> Vec<f64> {
    let pivot = axis
        .iter()
        .copied()
        .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        axis.iter_mut().for_each(|x| *x = -*x);
    }
    axis
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlated(n: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                vec![t, 2.0 * t + 0.01 * (i % 3) as f64, (7.0 * t).sin(), 1.0]
            })
            .collect()
    }

    #[test]
    fn reaches_variance_cut() {
        let data = correlated(40);
        for cut in [0.5, 0.9, 0.99, 1.0] {
            let (pcs, model) = whiten(&data, cut).unwrap();
            assert!(model.cumulative_variance_ratio() >= cut - 1e-9);
            assert_eq!(pcs.len(), 40);
            assert!(pcs.iter().all(|r| r.len() == model.n_components()));
        }
    }

    #[test]
    fn fewest_components_are_kept() {
        let (_, model) = whiten(&correlated(40), 0.5).unwrap();
        assert_eq!(model.n_components(), 1);
    }

    #[test]
    fn repeated_fit_is_identical() {
        let data = correlated(25);
        let (a, ma) = whiten(&data, 0.95).unwrap();
        let (b, mb) = whiten(&data, 0.95).unwrap();
        assert_eq!(a, b);
        assert_eq!(ma, mb);
    }

    #[test]
    fn whitened_column_variance_is_squared_eigenvalue() {
        // Column i of the output has sample variance explained_variance[i]^2.
        let data = correlated(30);
        let (pcs, model) = whiten(&data, 0.99).unwrap();
        for (c, ev) in model.explained_variance().iter().enumerate() {
            let mean: f64 = pcs.iter().map(|r| r[c]).sum::<f64>() / 30.0;
            assert!(mean.abs() < 1e-9);
            let var: f64 = pcs.iter().map(|r| (r[c] - mean).powi(2)).sum::<f64>() / 29.0;
            assert!((var - ev * ev).abs() < 1e-8 * (1.0 + ev * ev), "{var} vs {}", ev * ev);
        }
    }

    #[test]
    fn component_signs_are_canonical() {
        let (_, model) = whiten(&correlated(30), 1.0).unwrap();
        for axis in model.components() {
            let pivot = axis
                .iter()
                .copied()
                .fold(0.0f64, |b, x| if x.abs() > b.abs() { x } else { b });
            assert!(pivot >= 0.0);
        }
    }

    #[test]
    fn fewer_rows_than_columns_caps_components() {
        let data = vec![
            vec![1.0, 0.0, 3.0, 4.0, 5.0],
            vec![0.0, 1.0, 2.0, 1.0, 0.0],
            vec![2.0, 2.0, 0.0, 1.0, 1.0],
        ];
        let (pcs, model) = whiten(&data, 1.0).unwrap();
        assert!(model.n_components() <= 3);
        assert_eq!(pcs.len(), 3);
    }

    #[test]
    fn constant_input_yields_null_axis() {
        let data = vec![vec![1.0, 2.0]; 5];
        let (pcs, model) = whiten(&data, 0.9).unwrap();
        assert_eq!(model.n_components(), 1);
        assert!(pcs.iter().all(|r| r == &vec![0.0]));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(whiten(&[], 0.9), Err(Error::EmptyInput)));
        assert!(whiten(&[vec![1.0]], 0.9).is_err());
        assert!(whiten(&correlated(5), 0.0).is_err());
        assert!(matches!(
            whiten(&[vec![1.0, 2.0], vec![1.0]], 0.9),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn rejects_non_finite_values() {
        for bad in [f64::NAN, f64::INFINITY] {
            let first_row = [vec![bad, 1.0], vec![2.0, 3.0], vec![0.5, 1.0]];
            let later_row = [vec![1.0, 2.0], vec![2.0, 3.0], vec![0.5, bad]];
            for data in [&first_row, &later_row] {
                assert!(matches!(
                    whiten(data, 0.9),
                    Err(Error::InvalidParameter { name: "data", .. })
                ));
            }
        }
    }

    #[test]
    fn transform_matches_training_output() {
        let data = correlated(20);
        let (pcs, model) = whiten(&data, 0.95).unwrap();
        assert_eq!(model.transform(&data[3..4]).unwrap()[0], pcs[3]);
    }
}
