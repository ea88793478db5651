use crate::error::Result;

/// Hard clustering that also ranks members within their cluster.
///
/// Labels are compact (`0..formed`) and distances are Euclidean, measured from each
/// point to the centroid of the cluster it was assigned to. The stratified picker
/// consumes both.
pub trait Clustering {
    /// Fit and return `(labels, distances)`, one entry per input point.
    fn fit_ranked(&self, data: &[Vec<f64>]) -> Result<(Vec<usize>, Vec<f64>)>;

    /// Fit and return only the labels.
    fn fit_predict(&self, data: &[Vec<f64>]) -> Result<Vec<usize>> {
        Ok(self.fit_ranked(data)?.0)
    }

    /// The requested number of clusters; fewer may form.
    fn n_clusters(&self) -> usize;
}
