//! BIRCH: Balanced Iterative Reducing and Clustering using Hierarchies.
//!
//! # The Algorithm (Zhang, Ramakrishnan, Livny, 1996)
//!
//! BIRCH summarises the data in a height-balanced CF-tree in a single pass, then
//! clusters the tree's leaf summaries.
//!
//! ## Clustering Feature
//!
//! A CF is the triple `(n, LS, SS)`: point count, linear sum and sum of squared
//! norms. CFs are additive, and give the centroid `LS / n` and the radius
//! `sqrt(SS / n - ||LS / n||²)` without revisiting points.
//!
//! ## Algorithm Steps
//!
//! 1. For each point, descend from the root to the leaf entry with the closest
//!    centroid.
//! 2. Absorb the point into that entry if the merged radius stays within
//!    `threshold`; otherwise open a new leaf entry.
//! 3. A node holding more than `branching_factor` entries splits in two around
//!    its farthest pair of entries; the split propagates upward and may grow a
//!    new root.
//! 4. Global step: the leaf entry centroids (subclusters) are merged with Ward
//!    agglomerative clustering down to `n_clusters`.
//! 5. Each point takes the label of its nearest subcluster centroid.
//!
//! If the tree holds fewer subclusters than `n_clusters`, every subcluster is
//! its own cluster and fewer clusters are returned than requested.
//!
//! ## Output
//!
//! Besides labels, [`BirchFit`] carries each point's Euclidean distance to the
//! centroid of its final cluster, so consumers can rank members by proximity
//! without relying on row order.
//!
//! ## References
//!
//! Zhang, T., Ramakrishnan, R., Livny, M. (1996). "BIRCH: An Efficient Data
//! Clustering Method for Very Large Databases." SIGMOD '96.

use tracing::{debug, warn};

use super::traits::Clustering;
use super::util::{self, squared_euclidean};
use crate::error::{Error, Result};

/// Clustering feature `(n, LS, SS)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringFeature {
    /// Number of points summarised.
    pub n: usize,
    /// Linear sum of the points.
    pub ls: Vec<f64>,
    /// Sum of squared norms of the points.
    pub ss: f64,
}

impl ClusteringFeature {
    /// CF of a single point.
    pub fn from_point(point: &[f64]) -> Self {
        Self {
            n: 1,
            ls: point.to_vec(),
            ss: point.iter().map(|x| x * x).sum(),
        }
    }

    /// `LS / n`.
    pub fn centroid(&self) -> Vec<f64> {
        let n = self.n.max(1) as f64;
        self.ls.iter().map(|x| x / n).collect()
    }

    /// Root-mean-square distance of the summarised points to the centroid.
    pub fn radius(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let n = self.n as f64;
        let norm: f64 = self.ls.iter().map(|x| (x / n) * (x / n)).sum();
        (self.ss / n - norm).max(0.0).sqrt()
    }

    /// Radius of `self ∪ other`, without allocating.
    pub fn merged_radius(&self, other: &ClusteringFeature) -> f64 {
        let n = (self.n + other.n) as f64;
        let norm: f64 = self
            .ls
            .iter()
            .zip(&other.ls)
            .map(|(a, b)| {
                let c = (a + b) / n;
                c * c
            })
            .sum();
        ((self.ss + other.ss) / n - norm).max(0.0).sqrt()
    }

    /// Add `other` into `self`.
    pub fn merge(&mut self, other: &ClusteringFeature) {
        self.n += other.n;
        for (a, b) in self.ls.iter_mut().zip(&other.ls) {
            *a += b;
        }
        self.ss += other.ss;
    }
}

#[derive(Debug, Clone)]
struct Entry {
    cf: ClusteringFeature,
    /// Child node index; `None` for leaf entries (subclusters).
    child: Option<usize>,
}

#[derive(Debug, Clone)]
struct Node {
    entries: Vec<Entry>,
}

/// CF-tree stored as an arena of nodes.
#[derive(Debug)]
struct CfTree {
    nodes: Vec<Node>,
    root: usize,
    threshold: f64,
    branching_factor: usize,
}

impl CfTree {
    fn new(threshold: f64, branching_factor: usize) -> Self {
        Self {
            nodes: vec![Node {
                entries: Vec::new(),
            }],
            root: 0,
            threshold,
            branching_factor,
        }
    }

    fn insert_point(&mut self, point: &[f64]) {
        let cf = ClusteringFeature::from_point(point);
        if self.insert(self.root, &cf) {
            let (a, b) = self.split(self.root);
            self.root = self.nodes.len();
            self.nodes.push(Node {
                entries: vec![a, b],
            });
        }
    }

    /// Insert `cf` below `node`; returns true if `node` now overflows.
    fn insert(&mut self, node: usize, cf: &ClusteringFeature) -> bool {
        if self.nodes[node].entries.is_empty() {
            self.nodes[node].entries.push(Entry {
                cf: cf.clone(),
                child: None,
            });
            return false;
        }

        let closest = closest_entry(&self.nodes[node].entries, &cf.ls);
        match self.nodes[node].entries[closest].child {
            Some(child) => {
                if self.insert(child, cf) {
                    let (a, b) = self.split(child);
                    let entries = &mut self.nodes[node].entries;
                    entries[closest] = a;
                    entries.push(b);
                } else {
                    self.nodes[node].entries[closest].cf.merge(cf);
                }
            }
            None => {
                let entry = &mut self.nodes[node].entries[closest];
                if entry.cf.merged_radius(cf) <= self.threshold {
                    entry.cf.merge(cf);
                    return false;
                }
                self.nodes[node].entries.push(Entry {
                    cf: cf.clone(),
                    child: None,
                });
            }
        }
        self.nodes[node].entries.len() > self.branching_factor
    }

    /// Split `node` around its farthest pair of entries.
    ///
    /// One half stays at `node`, the other moves to a new node. Returns the two
    /// parent entries.
    fn split(&mut self, node: usize) -> (Entry, Entry) {
        let entries = std::mem::take(&mut self.nodes[node].entries);
        let centroids: Vec<Vec<f64>> = entries.iter().map(|e| e.cf.centroid()).collect();

        let (mut seed_a, mut seed_b, mut far) = (0, 1.min(entries.len() - 1), -1.0);
        for i in 0..centroids.len() {
            for j in (i + 1)..centroids.len() {
                let d = squared_euclidean(&centroids[i], &centroids[j]);
                if d > far {
                    (seed_a, seed_b, far) = (i, j, d);
                }
            }
        }

        let mut left = Vec::new();
        let mut right = Vec::new();
        for (i, entry) in entries.into_iter().enumerate() {
            let to_left = if i == seed_a {
                true
            } else if i == seed_b {
                false
            } else {
                squared_euclidean(&centroids[i], &centroids[seed_a])
                    <= squared_euclidean(&centroids[i], &centroids[seed_b])
            };
            if to_left {
                left.push(entry);
            } else {
                right.push(entry);
            }
        }

        let left_cf = summarise(&left);
        let right_cf = summarise(&right);
        self.nodes[node].entries = left;
        let sibling = self.nodes.len();
        self.nodes.push(Node { entries: right });

        (
            Entry {
                cf: left_cf,
                child: Some(node),
            },
            Entry {
                cf: right_cf,
                child: Some(sibling),
            },
        )
    }

    /// Leaf entries in depth-first order.
    fn subclusters(&self) -> Vec<&ClusteringFeature> {
        let mut out = Vec::new();
        self.collect_leaves(self.root, &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, node: usize, out: &mut Vec<&'a ClusteringFeature>) {
        for entry in &self.nodes[node].entries {
            match entry.child {
                Some(child) => self.collect_leaves(child, out),
                None => out.push(&entry.cf),
            }
        }
    }
}

fn summarise(entries: &[Entry]) -> ClusteringFeature {
    let mut iter = entries.iter();
    let mut total = iter
        .next()
        .map(|e| e.cf.clone())
        .unwrap_or(ClusteringFeature {
            n: 0,
            ls: Vec::new(),
            ss: 0.0,
        });
    for e in iter {
        total.merge(&e.cf);
    }
    total
}

/// Entry whose centroid is closest to the point with linear sum `ls` (n = 1).
fn closest_entry(entries: &[Entry], point: &[f64]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, e) in entries.iter().enumerate() {
        let n = e.cf.n as f64;
        let d: f64 = e
            .cf
            .ls
            .iter()
            .zip(point)
            .map(|(s, x)| {
                let diff = s / n - x;
                diff * diff
            })
            .sum();
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// BIRCH clustering algorithm.
#[derive(Debug, Clone)]
pub struct Birch {
    n_clusters: usize,
    threshold: f64,
    branching_factor: usize,
}

/// Result of a BIRCH fit.
#[derive(Debug, Clone, PartialEq)]
pub struct BirchFit {
    /// Cluster label per input row, in `0..n_clusters_formed` (first-appearance order).
    pub labels: Vec<usize>,
    /// Euclidean distance from each row to the centroid of its cluster.
    pub distances: Vec<f64>,
    /// Leaf subcluster centroids of the CF-tree.
    pub subcluster_centers: Vec<Vec<f64>>,
    /// Number of distinct labels.
    pub n_clusters_formed: usize,
}

impl Birch {
    /// Create a BIRCH clusterer targeting `n_clusters` final clusters.
    ///
    /// Defaults: `threshold = 0.5`, `branching_factor = 50`.
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            threshold: 0.5,
            branching_factor: 50,
        }
    }

    /// Set the subcluster radius threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the maximum number of entries per node.
    pub fn with_branching_factor(mut self, branching_factor: usize) -> Self {
        self.branching_factor = branching_factor;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_clusters < 1 {
            return Err(Error::InvalidParameter {
                name: "n_clusters",
                message: "must be at least 1",
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

    /// Fit on `data` and return labels, distances and subclusters.
    pub fn fit(&self, data: &[Vec<f64>]) -> Result<BirchFit> {
        self.validate()?;
        let d = util::validate_rows(data)?;

        let mut tree = CfTree::new(self.threshold, self.branching_factor);
        for point in data {
            tree.insert_point(point);
        }
        let centers: Vec<Vec<f64>> = tree.subclusters().iter().map(|cf| cf.centroid()).collect();

        let subcluster_labels = if centers.len() > self.n_clusters {
            ward(&centers, self.n_clusters)
        } else {
            if centers.len() < self.n_clusters {
                warn!(
                    subclusters = centers.len(),
                    requested = self.n_clusters,
                    "fewer subclusters than requested clusters; decrease the threshold to resolve more"
                );
            }
            (0..centers.len()).collect()
        };

        // Label rows by nearest subcluster, then compact labels by first appearance.
        let mut remap: Vec<Option<usize>> = vec![None; centers.len()];
        let mut next = 0;
        let labels: Vec<usize> = data
            .iter()
            .map(|p| {
                let group = subcluster_labels[util::nearest(&centers, p)];
                *remap[group].get_or_insert_with(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        let n_formed = next;

        let mut sums = vec![vec![0.0f64; d]; n_formed];
        let mut counts = vec![0usize; n_formed];
        for (p, &l) in data.iter().zip(&labels) {
            counts[l] += 1;
            for (s, x) in sums[l].iter_mut().zip(p) {
                *s += x;
            }
        }
        let means: Vec<Vec<f64>> = sums
            .into_iter()
            .zip(&counts)
            .map(|(s, &c)| s.into_iter().map(|x| x / c as f64).collect())
            .collect();
        let distances = data
            .iter()
            .zip(&labels)
            .map(|(p, &l)| squared_euclidean(p, &means[l]).sqrt())
            .collect();

        debug!(
            rows = data.len(),
            subclusters = centers.len(),
            requested = self.n_clusters,
            formed = n_formed,
            "BIRCH fitted"
        );

        Ok(BirchFit {
            labels,
            distances,
            subcluster_centers: centers,
            n_clusters_formed: n_formed,
        })
    }
}

impl Clustering for Birch {
    fn fit_ranked(&self, data: &[Vec<f64>]) -> Result<(Vec<usize>, Vec<f64>)> {
        let fit = self.fit(data)?;
        Ok((fit.labels, fit.distances))
    }

    fn n_clusters(&self) -> usize {
        self.n_clusters
    }
}

/// Cluster `pcs` with BIRCH; shorthand for [`Birch::fit`].
pub fn birch_cluster(
    pcs: &[Vec<f64>],
    n_clusters: usize,
    threshold: f64,
    branching_factor: usize,
) -> Result<BirchFit> {
    Birch::new(n_clusters)
        .with_threshold(threshold)
        .with_branching_factor(branching_factor)
        .fit(pcs)
}

/// Ward agglomerative clustering of `points` (unit weights) into `k` groups.
///
/// Returns a group id per point; ids are representative point indices, not compact.
fn ward(points: &[Vec<f64>], k: usize) -> Vec<usize> {
    let m = points.len();
    let mut centroid: Vec<Vec<f64>> = points.to_vec();
    let mut size = vec![1usize; m];
    let mut active = vec![true; m];
    let mut group: Vec<usize> = (0..m).collect();

    let cost = |centroid: &[Vec<f64>], size: &[usize], a: usize, b: usize| {
        let (na, nb) = (size[a] as f64, size[b] as f64);
        na * nb / (na + nb) * squared_euclidean(&centroid[a], &centroid[b])
    };
    let nearest_active =
        |centroid: &[Vec<f64>], size: &[usize], active: &[bool], a: usize| -> (usize, f64) {
            let mut best = (usize::MAX, f64::INFINITY);
            for b in 0..m {
                if b != a && active[b] {
                    let c = cost(centroid, size, a, b);
                    if c < best.1 {
                        best = (b, c);
                    }
                }
            }
            best
        };

    let mut nn: Vec<(usize, f64)> = (0..m)
        .map(|a| nearest_active(&centroid, &size, &active, a))
        .collect();

    let mut remaining = m;
    while remaining > k {
        let mut a = usize::MAX;
        let mut best = f64::INFINITY;
        for i in 0..m {
            if active[i] && nn[i].1 < best {
                best = nn[i].1;
                a = i;
            }
        }
        if a == usize::MAX {
            break;
        }
        let (keep, gone) = if a < nn[a].0 { (a, nn[a].0) } else { (nn[a].0, a) };

        let (nk, ng) = (size[keep] as f64, size[gone] as f64);
        let merged: Vec<f64> = centroid[keep]
            .iter()
            .zip(&centroid[gone])
            .map(|(x, y)| (x * nk + y * ng) / (nk + ng))
            .collect();
        centroid[keep] = merged;
        size[keep] += size[gone];
        active[gone] = false;
        for g in group.iter_mut() {
            if *g == gone {
                *g = keep;
            }
        }
        remaining -= 1;

        for i in 0..m {
            if !active[i] || i == keep {
                continue;
            }
            if nn[i].0 == keep || nn[i].0 == gone {
                nn[i] = nearest_active(&centroid, &size, &active, i);
            } else {
                let c = cost(&centroid, &size, i, keep);
                if c < nn[i].1 {
                    nn[i] = (keep, c);
                }
            }
        }
        nn[keep] = nearest_active(&centroid, &size, &active, keep);
    }
    group
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `groups` tight blobs of `per_group` points spaced 10 apart on a line.
    fn blobs(groups: usize, per_group: usize) -> Vec<Vec<f64>> {
        let mut data = Vec::new();
        for g in 0..groups {
            for i in 0..per_group {
                data.push(vec![10.0 * g as f64 + 0.01 * i as f64, 0.01 * (i % 2) as f64]);
            }
        }
        data
    }

    #[test]
    fn cf_statistics() {
        let mut cf = ClusteringFeature::from_point(&[0.0, 0.0]);
        cf.merge(&ClusteringFeature::from_point(&[2.0, 0.0]));
        assert_eq!(cf.n, 2);
        assert_eq!(cf.centroid(), vec![1.0, 0.0]);
        assert!((cf.radius() - 1.0).abs() < 1e-12);

        let single = ClusteringFeature::from_point(&[0.0, 0.0]);
        let r = single.merged_radius(&ClusteringFeature::from_point(&[2.0, 0.0]));
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn separates_well_separated_groups() {
        let data = blobs(4, 5);
        let fit = birch_cluster(&data, 4, 0.5, 50).unwrap();
        assert_eq!(fit.n_clusters_formed, 4);
        for g in 0..4 {
            let first = fit.labels[g * 5];
            assert!(fit.labels[g * 5..(g + 1) * 5].iter().all(|&l| l == first));
        }
        // First-appearance labels.
        assert_eq!(fit.labels[0], 0);
        assert_eq!(fit.labels[5], 1);
    }

    #[test]
    fn ward_merges_subclusters_down_to_request() {
        // Tiny threshold: every point is its own subcluster.
        let data = blobs(3, 4);
        let fit = birch_cluster(&data, 3, 1e-6, 50).unwrap();
        assert_eq!(fit.subcluster_centers.len(), 12);
        assert_eq!(fit.n_clusters_formed, 3);
        assert_eq!(fit.labels, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn fewer_subclusters_than_requested_is_tolerated() {
        let data = blobs(2, 5);
        let fit = birch_cluster(&data, 10, 1.0, 50).unwrap();
        assert_eq!(fit.n_clusters_formed, 2);
    }

    #[test]
    fn splits_keep_every_point() {
        // Small branching factor forces many splits and a deep tree.
        let data: Vec<Vec<f64>> = (0..200)
            .map(|i| vec![(i as f64 * 0.37).sin() * 5.0, (i as f64 * 0.11).cos() * 5.0])
            .collect();
        let birch = Birch::new(8).with_threshold(0.3).with_branching_factor(3);
        let mut tree = CfTree::new(0.3, 3);
        for p in &data {
            tree.insert_point(p);
        }
        let total: usize = tree.subclusters().iter().map(|cf| cf.n).sum();
        assert_eq!(total, 200);
        let root_n: usize = tree.nodes[tree.root].entries.iter().map(|e| e.cf.n).sum();
        assert_eq!(root_n, 200);

        let fit = birch.fit(&data).unwrap();
        assert_eq!(fit.labels.len(), 200);
        assert!((1..=8).contains(&fit.n_clusters_formed));
    }

    #[test]
    fn distances_are_to_cluster_centroid() {
        let data = vec![vec![0.0], vec![2.0], vec![100.0], vec![104.0]];
        let fit = birch_cluster(&data, 2, 5.0, 50).unwrap();
        assert_eq!(fit.labels, vec![0, 0, 1, 1]);
        let expected = [1.0, 1.0, 2.0, 2.0];
        for (d, e) in fit.distances.iter().zip(expected) {
            assert!((d - e).abs() < 1e-12);
        }
    }

    #[test]
    fn deterministic() {
        let data = blobs(5, 7);
        let a = birch_cluster(&data, 5, 0.05, 4).unwrap();
        let b = birch_cluster(&data, 5, 0.05, 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn clustering_trait() {
        let birch: Box<dyn Clustering> = Box::new(Birch::new(2).with_threshold(0.5));
        assert_eq!(birch.n_clusters(), 2);
        let labels = birch.fit_predict(&blobs(2, 3)).unwrap();
        assert_eq!(labels, vec![0, 0, 0, 1, 1, 1]);
        let (_, distances) = birch.fit_ranked(&blobs(2, 3)).unwrap();
        assert_eq!(distances.len(), 6);
    }

    #[test]
    fn invalid_params() {
        let data = blobs(1, 2);
        assert!(Birch::new(0).fit(&data).is_err());
        assert!(Birch::new(1).with_threshold(0.0).fit(&data).is_err());
        assert!(Birch::new(1).with_threshold(f64::INFINITY).fit(&data).is_err());
        assert!(Birch::new(1).with_branching_factor(1).fit(&data).is_err());
        assert!(matches!(Birch::new(1).fit(&[]), Err(Error::EmptyInput)));
    }
}
