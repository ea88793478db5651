//! Averaged local power-spectrum descriptor for non-periodic clusters.
//!
//! Each atom's neighbourhood density within `r_cut` is expanded on Gaussian
//! radial functions and spherical harmonics. The rotationally invariant power
//! spectrum
//!
//! ```text
//! p[a b n n' l] = Σ_m c[a n l m] c[b n' l m]
//! ```
//!
//! is evaluated through the addition theorem, which removes the explicit `m` sum:
//!
//! ```text
//! p[a b n n' l] = Σ_{j ∈ a} Σ_{j' ∈ b} g_n(r_j) g_n'(r_j') (2l+1)/(4π) P_l(cos θ_jj')
//! ```
//!
//! The per-atom spectra are averaged into one vector per structure.
//!
//! Layout: for each species pair `(a, b)` with `a <= b` (lexicographic), each
//! radial pair (`n <= n'` when `a == b`, all pairs otherwise), each `l` in `0..=l_max`.

use std::collections::BTreeSet;
use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::structure::Structure;

/// Descriptor hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerSpectrumParams {
    /// Neighbour cutoff radius (Å).
    pub r_cut: f64,
    /// Number of radial basis functions.
    pub n_max: usize,
    /// Maximum angular channel.
    pub l_max: usize,
}

impl Default for PowerSpectrumParams {
    fn default() -> Self {
        Self {
            r_cut: 5.0,
            n_max: 8,
            l_max: 6,
        }
    }
}

/// A power-spectrum descriptor configured for a fixed species set.
#[derive(Debug, Clone)]
pub struct PowerSpectrum {
    params: PowerSpectrumParams,
    species: Vec<String>,
    /// Offset of each `(a, b)` block, indexed `a * n_species + b` for `a <= b`.
    block_offsets: Vec<usize>,
    dim: usize,
}

impl PowerSpectrum {
    /// Configure a descriptor for `species`.
    pub fn new(species: &BTreeSet<String>, params: PowerSpectrumParams) -> Result<Self> {
        if species.is_empty() {
            return Err(Error::EmptyInput);
        }
        if !(params.r_cut.is_finite() && params.r_cut > 0.0) {
            return Err(Error::InvalidParameter {
                name: "r_cut",
                message: "must be positive and finite",
            });
        }
        if params.n_max == 0 {
            return Err(Error::InvalidParameter {
                name: "n_max",
                message: "must be at least 1",
            });
        }

        let species: Vec<String> = species.iter().cloned().collect();
        let s = species.len();
        let n = params.n_max;
        let n_l = params.l_max + 1;
        let mut block_offsets = vec![usize::MAX; s * s];
        let mut dim = 0;
        for a in 0..s {
            for b in a..s {
                block_offsets[a * s + b] = dim;
                dim += if a == b { n * (n + 1) / 2 } else { n * n } * n_l;
            }
        }

        Ok(Self {
            params,
            species,
            block_offsets,
            dim,
        })
    }

    /// Species this descriptor covers, in layout order.
    pub fn species(&self) -> &[String] {
        &self.species
    }

    /// Output vector length.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Hyperparameters.
    pub fn params(&self) -> PowerSpectrumParams {
        self.params
    }

    /// Averaged per-atom power spectrum of `structure`.
    ///
    /// Periodic images are ignored: the structure is treated as a finite cluster.
    pub fn create(&self, structure: &Structure) -> Result<Vec<f64>> {
        if structure.is_empty() {
            return Err(Error::EmptyInput);
        }
        let kinds = structure
            .sites
            .iter()
            .map(|site| {
                self.species
                    .binary_search(&site.species)
                    .map_err(|_| Error::UnknownSpecies {
                        species: site.species.clone(),
                    })
            })
            .collect::<Result<Vec<usize>>>()?;

        let mut mean = vec![0.0f64; self.dim];
        let mut atom = vec![0.0f64; self.dim];
        for center in 0..structure.len() {
            atom.iter_mut().for_each(|x| *x = 0.0);
            self.atom_spectrum(structure, &kinds, center, &mut atom);
            for (m, a) in mean.iter_mut().zip(&atom) {
                *m += a;
            }
        }
        let n_atoms = structure.len() as f64;
        mean.iter_mut().for_each(|x| *x /= n_atoms);
        Ok(mean)
    }

    fn atom_spectrum(
        &self,
        structure: &Structure,
        kinds: &[usize],
        center: usize,
        out: &mut [f64],
    ) {
        let p = &self.params;
        let origin = structure.sites[center].coords;

        // (species, unit vector, radial basis values)
        let mut neighbours: Vec<(usize, [f64; 3], Vec<f64>)> = Vec::new();
        for (j, site) in structure.sites.iter().enumerate() {
            if j == center {
                continue;
            }
            let d = [
                site.coords[0] - origin[0],
                site.coords[1] - origin[1],
                site.coords[2] - origin[2],
            ];
            let r = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
            if r >= p.r_cut || r == 0.0 {
                continue;
            }
            let unit = [d[0] / r, d[1] / r, d[2] / r];
            neighbours.push((kinds[j], unit, self.radial(r)));
        }

        let s = self.species.len();
        let n = p.n_max;
        let n_l = p.l_max + 1;
        let mut legendre = vec![0.0f64; n_l];
        let prefactor: Vec<f64> = (0..n_l).map(|l| (2 * l + 1) as f64 / (4.0 * PI)).collect();

        for (ka, ua, ga) in &neighbours {
            for (kb, ub, gb) in &neighbours {
                // Each unordered species pair is stored once, with a <= b.
                if ka > kb {
                    continue;
                }
                let cos = (ua[0] * ub[0] + ua[1] * ub[1] + ua[2] * ub[2]).clamp(-1.0, 1.0);
                legendre_into(cos, &mut legendre);

                let offset = self.block_offsets[ka * s + kb];
                let mut idx = offset;
                for n1 in 0..n {
                    let n2_start = if ka == kb { n1 } else { 0 };
                    for n2 in n2_start..n {
                        let radial = ga[n1] * gb[n2];
                        for l in 0..n_l {
                            out[idx] += radial * prefactor[l] * legendre[l];
                            idx += 1;
                        }
                    }
                }
            }
        }
    }

    /// Gaussian radial basis with a smooth cosine cutoff.
    fn radial(&self, r: f64) -> Vec<f64> {
        let p = &self.params;
        let cutoff = 0.5 * ((PI * r / p.r_cut).cos() + 1.0);
        let sigma = p.r_cut / p.n_max as f64;
        let spacing = if p.n_max > 1 {
            p.r_cut / (p.n_max - 1) as f64
        } else {
            0.0
        };
        (0..p.n_max)
            .map(|i| {
                let dr = r - spacing * i as f64;
                (-dr * dr / (2.0 * sigma * sigma)).exp() * cutoff
            })
            .collect()
    }
}

/// Legendre polynomials `P_0..P_{len-1}` at `x` by Bonnet's recursion.
fn legendre_into(x: f64, out: &mut [f64]) {
    if out.is_empty() {
        return;
    }
    out[0] = 1.0;
    if out.len() > 1 {
        out[1] = x;
    }
    for l in 1..out.len().saturating_sub(1) {
        let lf = l as f64;
        out[l + 1] = ((2.0 * lf + 1.0) * x * out[l] - lf * out[l - 1]) / (lf + 1.0);
    }
}
