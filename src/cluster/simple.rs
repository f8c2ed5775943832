//! Baseline engine: every point is compared with every center, every iteration.

use super::lloyd::{self, empty_sums, merge_partials, Assigner, Budget, RunOutcome, Snapshot};
use super::traits::MultiKMeansClusterer;
use super::util::PARTITION_SIZE;
use crate::centroid::Centroid;
use crate::error::Result;
use crate::ops::{BregmanCenter, BregmanPoint, PointOps};
use rayon::prelude::*;

/// Lloyd's iteration with a full reassignment each round.
///
/// Always correct and the reference the pruning variants are checked against.
#[derive(Clone, Debug, Default)]
pub struct SimpleKMeans {
    budget: Budget,
}

impl SimpleKMeans {
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

struct FullScan;

impl Assigner for FullScan {
    fn assign(
        &mut self,
        ops: &PointOps,
        points: &[BregmanPoint],
        snapshot: &Snapshot,
    ) -> Vec<Vec<Centroid>> {
        let partials: Vec<Vec<Vec<Centroid>>> = points
            .par_chunks(PARTITION_SIZE)
            .map(|part| {
                let mut sums = empty_sums(ops, snapshot);
                for (r, slots) in snapshot.slots.iter().enumerate() {
                    if !snapshot.active[r] {
                        continue;
                    }
                    for p in part {
                        if let Some((j, _)) = ops.find_closest_slot(slots, p) {
                            sums[r][j].add(p);
                        }
                    }
                }
                sums
            })
            .collect();
        merge_partials(partials)
    }
}

impl MultiKMeansClusterer for SimpleKMeans {
    fn cluster(
        &self,
        ops: &PointOps,
        points: &[BregmanPoint],
        centers: Vec<Vec<BregmanCenter>>,
    ) -> Result<Vec<RunOutcome>> {
        lloyd::run(self.name(), ops, points, centers, self.budget, &mut FullScan)
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::lloyd::RunStatus;

    fn points(ops: &PointOps, coords: &[[f64; 2]]) -> Vec<BregmanPoint> {
        coords
            .iter()
            .map(|c| ops.vector_to_point(c.to_vec().into(), 1.0))
            .collect()
    }

    #[test]
    fn converges_to_group_means() {
        let ops = PointOps::default();
        let data = points(
            &ops,
            &[[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [10.0, 10.0], [11.0, 11.0]],
        );
        let init = vec![vec![
            ops.point_to_center(&data[0]),
            ops.point_to_center(&data[4]),
        ]];

        let out = SimpleKMeans::default().cluster(&ops, &data, init).unwrap();
        assert_eq!(out.len(), 1);
        let run = &out[0];
        assert_eq!(run.status, RunStatus::Converged);
        assert_eq!(run.centers.len(), 2);
        assert_eq!(run.centers[0].inhomogeneous().to_dense(), vec![0.5, 0.5]);
        assert_eq!(run.centers[1].inhomogeneous().to_dense(), vec![10.5, 10.5]);
        // 4 * 0.5 + 2 * 0.5
        assert!((run.distortion - 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_clusters_are_dropped() {
        let ops = PointOps::default();
        let data = points(&ops, &[[0.0, 0.0], [0.0, 1.0], [5.0, 5.0], [5.0, 6.0]]);
        let far = ops.vector_to_point(vec![100.0, 100.0].into(), 1.0);
        let init = vec![vec![
            ops.point_to_center(&data[0]),
            ops.point_to_center(&far),
            ops.point_to_center(&data[2]),
        ]];

        let out = SimpleKMeans::default().cluster(&ops, &data, init).unwrap();
        assert_eq!(out[0].centers.len(), 2);
        assert_eq!(out[0].status, RunStatus::Converged);
    }

    #[test]
    fn budget_exhaustion_returns_current_centers() {
        let ops = PointOps::default();
        let data: Vec<BregmanPoint> = (0..50)
            .map(|i| ops.vector_to_point(vec![i as f64, (i * i % 7) as f64].into(), 1.0))
            .collect();
        let init = vec![vec![
            ops.point_to_center(&data[0]),
            ops.point_to_center(&data[1]),
            ops.point_to_center(&data[2]),
        ]];

        let out = SimpleKMeans::default()
            .with_max_iterations(1)
            .cluster(&ops, &data, init)
            .unwrap();
        assert_eq!(out[0].status, RunStatus::Exhausted);
        assert_eq!(out[0].iterations, 1);
        assert!(!out[0].centers.is_empty());
        assert!(out[0].distortion.is_finite());
    }

    #[test]
    fn rejects_bad_input() {
        let ops = PointOps::default();
        let data = points(&ops, &[[0.0, 0.0]]);
        let c = ops.point_to_center(&data[0]);
        let engine = SimpleKMeans::default();

        assert!(engine.cluster(&ops, &[], vec![vec![c.clone()]]).is_err());
        assert!(engine.cluster(&ops, &data, vec![]).is_err());
        assert!(engine.cluster(&ops, &data, vec![vec![]]).is_err());

        let wrong = ops.point_to_center(&ops.vector_to_point(vec![1.0].into(), 1.0));
        assert!(engine.cluster(&ops, &data, vec![vec![wrong]]).is_err());
    }
}
