//! Atomic structures: sites with an element and a Cartesian position, plus an
//! optional periodic lattice.
//!
//! Structures are immutable inputs to the sampling pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Periodic lattice given by its three row vectors (Å).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// Row `i` is lattice vector `a_i`.
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// Create a lattice from its three row vectors.
    pub fn new(matrix: [[f64; 3]; 3]) -> Self {
        Self { matrix }
    }

    /// Cubic lattice with edge length `a`.
    pub fn cubic(a: f64) -> Self {
        Self::new([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]])
    }

    /// Cell volume, `|det(matrix)|`.
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        let det = a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0]);
        det.abs()
    }

    /// Convert fractional coordinates to Cartesian.
    pub fn to_cartesian(&self, frac: [f64; 3]) -> [f64; 3] {
        let m = &self.matrix;
        let mut out = [0.0; 3];
        for (axis, o) in out.iter_mut().enumerate() {
            *o = frac[0] * m[0][axis] + frac[1] * m[1][axis] + frac[2] * m[2][axis];
        }
        out
    }
}

/// One atomic site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Element symbol, e.g. `"Li"`.
    pub species: String,
    /// Cartesian position (Å).
    pub coords: [f64; 3],
}

/// An atomic configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// Periodic lattice; `None` for molecules and clusters.
    pub lattice: Option<Lattice>,
    /// Atomic sites.
    pub sites: Vec<Site>,
}

impl Structure {
    /// Build a periodic structure from species and fractional coordinates.
    pub fn periodic<S: Into<String>>(
        lattice: Lattice,
        species: impl IntoIterator<Item = S>,
        frac_coords: &[[f64; 3]],
    ) -> Result<Self> {
        let species: Vec<String> = species.into_iter().map(Into::into).collect();
        if species.len() != frac_coords.len() {
            return Err(Error::DimensionMismatch {
                expected: species.len(),
                found: frac_coords.len(),
            });
        }
        let sites = species
            .into_iter()
            .zip(frac_coords)
            .map(|(species, &frac)| Site {
                species,
                coords: lattice.to_cartesian(frac),
            })
            .collect();
        Ok(Self {
            lattice: Some(lattice),
            sites,
        })
    }

    /// Build a non-periodic structure from species and Cartesian coordinates.
    pub fn molecule<S: Into<String>>(
        species: impl IntoIterator<Item = S>,
        coords: &[[f64; 3]],
    ) -> Result<Self> {
        let species: Vec<String> = species.into_iter().map(Into::into).collect();
        if species.len() != coords.len() {
            return Err(Error::DimensionMismatch {
                expected: species.len(),
                found: coords.len(),
            });
        }
        let sites = species
            .into_iter()
            .zip(coords)
            .map(|(species, &coords)| Site { species, coords })
            .collect();
        Ok(Self {
            lattice: None,
            sites,
        })
    }

    /// Number of sites.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// True if the structure has no sites.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// True if a lattice is attached.
    pub fn is_periodic(&self) -> bool {
        self.lattice.is_some()
    }

    /// Cell volume for periodic structures.
    pub fn volume(&self) -> Option<f64> {
        self.lattice.as_ref().map(Lattice::volume)
    }

    /// Distinct element symbols, lexicographically ordered.
    pub fn species_set(&self) -> BTreeSet<String> {
        self.sites.iter().map(|s| s.species.clone()).collect()
    }
}
