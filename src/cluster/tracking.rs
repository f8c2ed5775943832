//! Engine that remembers each point's last assignment.
//!
//! After an iteration, a point's closest center can only change to a center
//! that was replaced. If the point's own center did not get farther away,
//! every unchanged center is still at least as far as before, so only the
//! replaced centers need checking. Otherwise the point falls back to a full
//! scan. Results are identical to [`super::SimpleKMeans`].

use super::lloyd::{self, empty_sums, merge_partials, Assigner, Budget, RunOutcome, Snapshot};
use super::traits::MultiKMeansClusterer;
use super::util::PARTITION_SIZE;
use crate::centroid::Centroid;
use crate::error::Result;
use crate::ops::{BregmanCenter, BregmanPoint, PointOps};
use rayon::prelude::*;

/// A point's cluster and its distance to that cluster's center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Assignment {
    pub(crate) cluster: usize,
    pub(crate) distance: f64,
}

/// Closest center for `point`, reusing `prev` to skip centers that cannot win.
pub(crate) fn reassign(
    ops: &PointOps,
    point: &BregmanPoint,
    slots: &[Option<BregmanCenter>],
    replaced: &[bool],
    prev: Option<Assignment>,
) -> Option<Assignment> {
    let full_scan = || {
        ops.find_closest_slot(slots, point)
            .map(|(cluster, distance)| Assignment { cluster, distance })
    };

    let Some(prev) = prev else {
        return full_scan();
    };
    let Some(own) = slots.get(prev.cluster).and_then(Option::as_ref) else {
        return full_scan();
    };
    let own_distance = if replaced[prev.cluster] {
        ops.distance(point, own)
    } else {
        prev.distance
    };
    if own_distance > prev.distance {
        return full_scan();
    }

    let mut best: Option<Assignment> = None;
    for (j, slot) in slots.iter().enumerate() {
        let Some(center) = slot else {
            continue;
        };
        let d = if j == prev.cluster {
            own_distance
        } else if replaced[j] {
            ops.distance(point, center)
        } else {
            continue;
        };
        if best.map_or(true, |b| d < b.distance) {
            best = Some(Assignment {
                cluster: j,
                distance: d,
            });
        }
    }
    best
}

/// Lloyd's iteration with per-point assignment caching.
///
/// Keeps one row per point holding its assignment in every run.
#[derive(Clone, Debug, Default)]
pub struct TrackingKMeans {
    budget: Budget,
}

impl TrackingKMeans {
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
struct RowTracker {
    // rows[point][run]
    rows: Vec<Vec<Option<Assignment>>>,
}

impl Assigner for RowTracker {
    fn assign(
        &mut self,
        ops: &PointOps,
        points: &[BregmanPoint],
        snapshot: &Snapshot,
    ) -> Vec<Vec<Centroid>> {
        let runs = snapshot.slots.len();
        if self.rows.len() != points.len() {
            self.rows = vec![vec![None; runs]; points.len()];
        }

        let partials: Vec<Vec<Vec<Centroid>>> = points
            .par_chunks(PARTITION_SIZE)
            .zip(self.rows.par_chunks_mut(PARTITION_SIZE))
            .map(|(part, rows)| {
                let mut sums = empty_sums(ops, snapshot);
                for (p, row) in part.iter().zip(rows.iter_mut()) {
                    for (r, cached) in row.iter_mut().enumerate() {
                        if !snapshot.active[r] {
                            continue;
                        }
                        *cached =
                            reassign(ops, p, &snapshot.slots[r], &snapshot.replaced[r], *cached);
                        if let Some(a) = cached {
                            sums[r][a.cluster].add(p);
                        }
                    }
                }
                sums
            })
            .collect();
        merge_partials(partials)
    }
}

impl MultiKMeansClusterer for TrackingKMeans {
    fn cluster(
        &self,
        ops: &PointOps,
        points: &[BregmanPoint],
        centers: Vec<Vec<BregmanCenter>>,
    ) -> Result<Vec<RunOutcome>> {
        let mut tracker = RowTracker::default();
        lloyd::run(self.name(), ops, points, centers, self.budget, &mut tracker)
    }

    fn name(&self) -> &'static str {
        "tracking"
    }
}
