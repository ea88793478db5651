//! Deterministic `k` representatives per cluster.
//!
//! Selection rules, per cluster (members ordered closest-to-centroid first):
//! - `k == 1`: the first member.
//! - `k > 1`, size >= `k`: every `⌊size / k⌋`-th member from the first, truncated to `k`.
//! - `k > 1`, size < `k`: `k` draws with replacement from a seeded RNG (a warning is logged).
//!
//! The union of picks is returned sorted; duplicates from replacement draws are kept.

use std::collections::HashMap;

use rand::prelude::*;
use tracing::warn;

use crate::error::{Error, Result};

/// Result of a stratified pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickOutcome {
    /// Selected row indices, ascending.
    pub indices: Vec<usize>,
    /// Number of clusters smaller than `k` that were sampled with replacement.
    pub undersized_clusters: usize,
}

/// Picks `k` representatives per cluster.
#[derive(Debug, Clone)]
pub struct StratifiedPicker {
    k: usize,
    seed: u64,
}

impl StratifiedPicker {
    /// Picker selecting `k` rows per cluster. Default seed: 42.
    pub fn new(k: usize) -> Self {
        Self { k, seed: 42 }
    }

    /// Set the RNG seed used for undersized clusters.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Representatives per cluster.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Pick using row order within each label as centroid proximity.
    pub fn pick(&self, labels: &[usize]) -> Result<PickOutcome> {
        self.validate()?;
        self.pick_groups(group_by_label(labels))
    }

    /// Pick after ranking each cluster by `(distance, row index)`.
    pub fn pick_ranked(&self, labels: &[usize], distances: &[f64]) -> Result<PickOutcome> {
        self.validate()?;
        if labels.len() != distances.len() {
            return Err(Error::DimensionMismatch {
                expected: labels.len(),
                found: distances.len(),
            });
        }
        let mut groups = group_by_label(labels);
        for members in &mut groups {
            members.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]).then(a.cmp(&b)));
        }
        self.pick_groups(groups)
    }

    fn validate(&self) -> Result<()> {
        if self.k < 1 {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "must be at least 1",
            });
        }
        Ok(())
    }

    fn pick_groups(&self, groups: Vec<Vec<usize>>) -> Result<PickOutcome> {
        let k = self.k;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut picks = Vec::with_capacity(groups.len() * k);
        let mut undersized = 0;

        for members in groups {
            if k == 1 {
                picks.push(members[0]);
            } else if members.len() < k {
                warn!(
                    cluster_size = members.len(),
                    k, "cluster smaller than k; sampling with replacement"
                );
                undersized += 1;
                for _ in 0..k {
                    picks.push(members[rng.random_range(0..members.len())]);
                }
            } else {
                let step = members.len() / k;
                picks.extend(members.iter().step_by(step).take(k));
            }
        }

        picks.sort_unstable();
        Ok(PickOutcome {
            indices: picks,
            undersized_clusters: undersized,
        })
    }
}

/// Sorted picks; shorthand for `StratifiedPicker::new(k).with_seed(seed).pick(labels)`.
pub fn stratified_pick(labels: &[usize], k: usize, seed: u64) -> Result<Vec<usize>> {
    Ok(StratifiedPicker::new(k).with_seed(seed).pick(labels)?.indices)
}

/// Row indices grouped by label, groups in order of first appearance.
fn group_by_label(labels: &[usize]) -> Vec<Vec<usize>> {
    let mut slot: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (idx, &label) in labels.iter().enumerate() {
        let g = *slot.entry(label).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[g].push(idx);
    }
    groups
}
