use super::lloyd::{Budget, RunOutcome};
use super::{ColumnTrackingKMeans, SimpleKMeans, TrackingKMeans};
use crate::error::Result;
use crate::ops::{BregmanCenter, BregmanPoint, PointOps};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Common interface for hard clustering algorithms (one label per point).
pub trait Clustering {
    /// Fit the model (if needed) and return one cluster label per input point.
    fn fit_predict(&self, data: &[Vec<f64>]) -> Result<Vec<usize>>;

    /// The configured number of clusters.
    ///
    /// The fitted model may hold fewer: clusters that end up empty are dropped.
    fn n_clusters(&self) -> usize;
}

/// A Lloyd's-iteration engine refining several runs at once.
pub trait MultiKMeansClusterer: Debug + Send + Sync {
    /// Refine `centers` (one set per run) on `points`.
    ///
    /// Returns one outcome per run, in input order. Runs that do not settle
    /// within the budget are returned as they stand.
    fn cluster(
        &self,
        ops: &PointOps,
        points: &[BregmanPoint],
        centers: Vec<Vec<BregmanCenter>>,
    ) -> Result<Vec<RunOutcome>>;

    /// Short name, used in logs.
    fn name(&self) -> &'static str;
}

/// Identifiers for the engine variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClustererKind {
    /// [`SimpleKMeans`].
    Simple,
    /// [`TrackingKMeans`].
    Tracking,
    /// [`ColumnTrackingKMeans`].
    #[default]
    ColumnTracking,
}

impl ClustererKind {
    /// Build the engine this identifier names.
    pub fn build(self, budget: Budget) -> Box<dyn MultiKMeansClusterer> {
        match self {
            ClustererKind::Simple => Box::new(SimpleKMeans::new(budget)),
            ClustererKind::Tracking => Box::new(TrackingKMeans::new(budget)),
            ClustererKind::ColumnTracking => Box::new(ColumnTrackingKMeans::new(budget)),
        }
    }
}
