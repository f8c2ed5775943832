//! Tracking engine with a column per run.
//!
//! Same pruning as [`super::TrackingKMeans`], but assignments are stored
//! `columns[run][point]`. Each run's column is processed as its own parallel
//! job, which suits many simultaneous runs: a run's bookkeeping is contiguous
//! and settled runs cost nothing.

use super::lloyd::{self, Assigner, Budget, RunOutcome, Snapshot};
use super::tracking::{reassign, Assignment};
use super::traits::MultiKMeansClusterer;
use super::util::PARTITION_SIZE;
use crate::centroid::Centroid;
use crate::error::Result;
use crate::ops::{BregmanCenter, BregmanPoint, PointOps};
use rayon::prelude::*;

/// Lloyd's iteration with per-(point, run) assignment caching in columns.
#[derive(Clone, Debug, Default)]
pub struct ColumnTrackingKMeans {
    budget: Budget,
}

impl ColumnTrackingKMeans {
    /// Create a clusterer with the given budget.
    pub fn new(budget: Budget) -> Self {
        Self { budget }
    }

    /// Set maximum iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.budget.max_iterations = max_iterations;
        self
    }
}

#[derive(Default)]
struct ColumnTracker {
    columns: Vec<Vec<Option<Assignment>>>,
}

impl ColumnTracker {
    fn assign_run(
        ops: &PointOps,
        points: &[BregmanPoint],
        slots: &[Option<BregmanCenter>],
        replaced: &[bool],
        column: &mut [Option<Assignment>],
    ) -> Vec<Centroid> {
        let partials: Vec<Vec<Centroid>> = points
            .par_chunks(PARTITION_SIZE)
            .zip(column.par_chunks_mut(PARTITION_SIZE))
            .map(|(part, cells)| {
                let mut sums: Vec<Centroid> = (0..slots.len()).map(|_| ops.make_centroid()).collect();
                for (p, cell) in part.iter().zip(cells.iter_mut()) {
                    *cell = reassign(ops, p, slots, replaced, *cell);
                    if let Some(a) = cell {
                        sums[a.cluster].add(p);
                    }
                }
                sums
            })
            .collect();

        let mut iter = partials.into_iter();
        let mut total = iter.next().unwrap_or_default();
        for partial in iter {
            for (acc, part) in total.iter_mut().zip(partial.iter()) {
                acc.merge(part);
            }
        }
        total
    }
}

impl Assigner for ColumnTracker {
    fn assign(
        &mut self,
        ops: &PointOps,
        points: &[BregmanPoint],
        snapshot: &Snapshot,
    ) -> Vec<Vec<Centroid>> {
        let runs = snapshot.slots.len();
        if self.columns.len() != runs {
            self.columns = vec![vec![None; points.len()]; runs];
        }

        self.columns
            .par_iter_mut()
            .enumerate()
            .map(|(r, column)| {
                if !snapshot.active[r] {
                    return Vec::new();
                }
                Self::assign_run(
                    ops,
                    points,
                    &snapshot.slots[r],
                    &snapshot.replaced[r],
                    column,
                )
            })
            .collect()
    }
}

impl MultiKMeansClusterer for ColumnTrackingKMeans {
    fn cluster(
        &self,
        ops: &PointOps,
        points: &[BregmanPoint],
        centers: Vec<Vec<BregmanCenter>>,
    ) -> Result<Vec<RunOutcome>> {
        let mut tracker = ColumnTracker::default();
        lloyd::run(self.name(), ops, points, centers, self.budget, &mut tracker)
    }

    fn name(&self) -> &'static str {
        "column-tracking"
    }
}
