use super::{validate, Initializer, KMeansPlusPlus};
use crate::cluster::util::{child_rngs, child_seeds, PARTITION_SIZE};
use crate::cluster::{Budget, MultiKMeansClusterer, SimpleKMeans};
use crate::error::Result;
use crate::ops::{BregmanCenter, BregmanPoint, PointOps};
use crate::vector::WeightedVector;
use rand::prelude::*;
use rayon::prelude::*;
use tracing::{debug, warn};

/// K-Means‖ ("k-means parallel") seeding.
///
/// # Algorithm (Bahmani et al., 2012)
///
/// For each run:
///
/// 1. Start from one point drawn uniformly among points with usable weight.
/// 2. For `initialization_steps` rounds, compute each point's cost (its
///    divergence to the nearest candidate so far) and keep every point
///    independently with probability `min(1, ℓ·w·cost / total_cost)`, where
///    `ℓ = oversampling × k`. Each round is one parallel pass.
/// 3. Weight every candidate by the total weight of the points closest to it.
/// 4. Reduce the weighted candidates (typically `O(k log n)` of them) to `k`
///    centers with K-Means++ and then Lloyd's iteration, both on the candidate
///    set only.
///
/// All runs share the passes over the data.
#[derive(Clone, Debug)]
pub struct KMeansParallel {
    initialization_steps: usize,
    oversampling: f64,
    per_round: usize,
    budget: Budget,
}

impl Default for KMeansParallel {
    fn default() -> Self {
        Self {
            initialization_steps: 5,
            oversampling: 2.0,
            per_round: 1,
            budget: Budget::default(),
        }
    }
}

impl KMeansParallel {
    /// Five rounds, oversampling factor 2.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of oversampling rounds.
    pub fn with_initialization_steps(mut self, steps: usize) -> Self {
        self.initialization_steps = steps;
        self
    }

    /// Set the oversampling factor relative to `k`.
    pub fn with_oversampling(mut self, oversampling: f64) -> Self {
        self.oversampling = oversampling;
        self
    }

    /// Set the K-Means++ picks per round used in the reduction.
    pub fn with_per_round(mut self, per_round: usize) -> Self {
        self.per_round = per_round;
        self
    }

    /// Budget for the Lloyd's refinement of the candidate set.
    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    /// Oversampled candidate indices per run.
    ///
    /// Only points with weight above the threshold are ever sampled. Runs
    /// get an empty list when there are none.
    fn candidates(
        &self,
        ops: &PointOps,
        points: &[BregmanPoint],
        k: usize,
        runs: usize,
        master: &mut StdRng,
    ) -> Vec<Vec<usize>> {
        let n = points.len();
        let threshold = ops.weight_threshold();
        let usable: Vec<usize> = (0..n).filter(|&i| points[i].weight() > threshold).collect();
        if usable.is_empty() {
            return vec![Vec::new(); runs];
        }

        let mut candidates: Vec<Vec<usize>> = child_rngs(master, runs)
            .iter_mut()
            .map(|rng| vec![usable[rng.random_range(0..usable.len())]])
            .collect();
        let mut fresh: Vec<Vec<BregmanCenter>> = candidates
            .iter()
            .map(|c| vec![ops.point_to_center(&points[c[0]])])
            .collect();
        // costs[point][run]: divergence to the nearest candidate so far.
        let mut costs: Vec<Vec<f64>> = vec![vec![f64::INFINITY; runs]; n];
        let ell = self.oversampling * k as f64;
        let partitions = n.div_ceil(PARTITION_SIZE);

        for step in 0..self.initialization_steps {
            costs
                .par_iter_mut()
                .zip(points.par_iter())
                .for_each(|(row, p)| {
                    for (cost, centers) in row.iter_mut().zip(fresh.iter()) {
                        for c in centers {
                            let d = ops.distance(p, c);
                            if d < *cost {
                                *cost = d;
                            }
                        }
                    }
                });

            let totals = run_totals(points, &costs, runs, threshold);
            // seeds[partition * runs + run]
            let seeds = child_seeds(master, partitions * runs);

            let selected: Vec<(usize, usize)> = points
                .par_chunks(PARTITION_SIZE)
                .enumerate()
                .map(|(chunk, part)| {
                    let base = chunk * PARTITION_SIZE;
                    let mut rngs: Vec<StdRng> = seeds[chunk * runs..(chunk + 1) * runs]
                        .iter()
                        .map(|&s| StdRng::seed_from_u64(s))
                        .collect();
                    let mut picks: Vec<(usize, usize)> = Vec::new();
                    for (offset, p) in part.iter().enumerate() {
                        let i = base + offset;
                        for (r, rng) in rngs.iter_mut().enumerate() {
                            if !(totals[r] > 0.0) {
                                continue;
                            }
                            let score = cost_score(p, costs[i][r], threshold);
                            let prob = (ell * score / totals[r]).min(1.0);
                            if prob > 0.0 && rng.random::<f64>() < prob {
                                picks.push((r, i));
                            }
                        }
                    }
                    picks
                })
                .collect::<Vec<_>>()
                .into_iter()
                .flatten()
                .collect();

            let mut added: Vec<Vec<usize>> = vec![Vec::new(); runs];
            for (r, i) in selected {
                added[r].push(i);
            }
            let new_count: usize = added.iter().map(Vec::len).sum();
            debug!(step, new = new_count, "k-means|| oversampling round");

            fresh = added
                .iter()
                .map(|idx| idx.iter().map(|&i| ops.point_to_center(&points[i])).collect())
                .collect();
            for (run, idx) in candidates.iter_mut().zip(added) {
                run.extend(idx);
            }
            if new_count == 0 {
                break;
            }
        }
        candidates
    }

    /// Reduce one run's weighted candidates to at most `k` centers.
    fn reduce(
        &self,
        ops: &PointOps,
        candidates: &[BregmanCenter],
        weights: &[f64],
        k: usize,
        seed: u64,
    ) -> Result<Vec<BregmanCenter>> {
        let seeds = KMeansPlusPlus::new()
            .with_per_round(self.per_round)
            .good_centers(ops, seed, candidates, weights, k, 0)?;
        if seeds.is_empty() {
            return Ok(seeds);
        }

        let weighted: Vec<BregmanPoint> = candidates
            .iter()
            .zip(weights.iter())
            .map(|(c, &w)| ops.to_point(&WeightedVector::from_inhomogeneous(c.inhomogeneous(), w)))
            .collect();
        let mut outcomes = SimpleKMeans::new(self.budget).cluster(ops, &weighted, vec![seeds])?;
        Ok(outcomes.pop().map(|o| o.centers).unwrap_or_default())
    }
}

/// Selection weight `w·cost`; points at or below the weight threshold score 0.
fn cost_score(p: &BregmanPoint, cost: f64, threshold: f64) -> f64 {
    if p.weight() > threshold {
        p.weight() * cost
    } else {
        0.0
    }
}

/// `Σ w·cost` per run, summed partition by partition.
fn run_totals(points: &[BregmanPoint], costs: &[Vec<f64>], runs: usize, threshold: f64) -> Vec<f64> {
    let partials: Vec<Vec<f64>> = points
        .par_chunks(PARTITION_SIZE)
        .zip(costs.par_chunks(PARTITION_SIZE))
        .map(|(part, rows)| {
            let mut sums = vec![0.0; runs];
            for (p, row) in part.iter().zip(rows.iter()) {
                for (s, &c) in sums.iter_mut().zip(row.iter()) {
                    *s += cost_score(p, c, threshold);
                }
            }
            sums
        })
        .collect();
    let mut totals = vec![0.0; runs];
    for partial in partials {
        for (t, s) in totals.iter_mut().zip(partial) {
            *t += s;
        }
    }
    totals
}

/// Total weight of the points closest to each candidate, per run.
fn candidate_weights(
    ops: &PointOps,
    points: &[BregmanPoint],
    candidates: &[Vec<BregmanCenter>],
) -> Vec<Vec<f64>> {
    let empty = || -> Vec<Vec<f64>> { candidates.iter().map(|c| vec![0.0; c.len()]).collect() };
    let partials: Vec<Vec<Vec<f64>>> = points
        .par_chunks(PARTITION_SIZE)
        .map(|part| {
            let mut weights = empty();
            for p in part {
                for (run, centers) in weights.iter_mut().zip(candidates.iter()) {
                    if let Some((j, _)) = ops.find_closest(centers, p) {
                        run[j] += p.weight();
                    }
                }
            }
            weights
        })
        .collect();

    let mut totals = empty();
    for partial in partials {
        for (t, s) in totals.iter_mut().zip(partial) {
            for (a, b) in t.iter_mut().zip(s) {
                *a += b;
            }
        }
    }
    totals
}

impl Initializer for KMeansParallel {
    fn init(
        &self,
        ops: &PointOps,
        points: &[BregmanPoint],
        k: usize,
        runs: usize,
        seed: u64,
    ) -> Result<Vec<Vec<BregmanCenter>>> {
        validate(points, k, runs)?;

        let mut master = StdRng::seed_from_u64(seed);
        let picked = self.candidates(ops, points, k, runs, &mut master);
        let candidates: Vec<Vec<BregmanCenter>> = picked
            .iter()
            .map(|idx| idx.iter().map(|&i| ops.point_to_center(&points[i])).collect())
            .collect();
        let weights = candidate_weights(ops, points, &candidates);
        let reduce_seeds = child_seeds(&mut master, runs);

        let centers: Vec<Vec<BregmanCenter>> = candidates
            .par_iter()
            .zip(weights.par_iter())
            .zip(reduce_seeds.par_iter())
            .map(|((cands, w), &s)| {
                if cands.is_empty() {
                    return Ok(Vec::new());
                }
                self.reduce(ops, cands, w, k, s)
            })
            .collect::<Result<_>>()?;

        for (r, (c, cands)) in centers.iter().zip(candidates.iter()).enumerate() {
            if c.len() < k {
                warn!(run = r, requested = k, found = c.len(), "fewer distinct centers than requested");
            } else {
                debug!(run = r, candidates = cands.len(), "k-means|| seeding done");
            }
        }
        Ok(centers)
    }

    fn name(&self) -> &'static str {
        "k-means||"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ops: &PointOps, groups: &[f64], per_group: usize) -> Vec<BregmanPoint> {
        groups
            .iter()
            .flat_map(|&g| (0..per_group).map(move |i| g + i as f64 * 0.01))
            .map(|x| ops.vector_to_point(vec![x].into(), 1.0))
            .collect()
    }

    #[test]
    fn finds_one_center_per_group() {
        let ops = PointOps::default();
        let points = line(&ops, &[0.0, 100.0, 200.0], 30);
        let runs = KMeansParallel::new().init(&ops, &points, 3, 2, 17).unwrap();
        assert_eq!(runs.len(), 2);
        for centers in runs {
            assert_eq!(centers.len(), 3);
            let mut xs: Vec<f64> = centers.iter().map(|c| c.inhomogeneous().to_dense()[0]).collect();
            xs.sort_by(f64::total_cmp);
            for (x, g) in xs.iter().zip([0.145, 100.145, 200.145]) {
                assert!((x - g).abs() < 1.0, "center {x} far from group {g}");
            }
        }
    }

    #[test]
    fn duplicate_points_yield_fewer_centers() {
        let ops = PointOps::default();
        let points: Vec<BregmanPoint> = (0..20)
            .map(|i| ops.vector_to_point(vec![if i % 2 == 0 { 1.0 } else { 5.0 }].into(), 1.0))
            .collect();
        let runs = KMeansParallel::new().init(&ops, &points, 4, 1, 3).unwrap();
        assert_eq!(runs[0].len(), 2);
    }

    #[test]
    fn zero_weight_points_are_never_sampled() {
        let ops = PointOps::default();
        let mut points: Vec<BregmanPoint> = (0..600)
            .map(|i| ops.vector_to_point(vec![1000.0 + i as f64].into(), 0.0))
            .collect();
        points.push(ops.vector_to_point(vec![3.0].into(), 1.0));

        for seed in 0..10 {
            let runs = KMeansParallel::new().init(&ops, &points, 2, 2, seed).unwrap();
            for centers in runs {
                assert_eq!(centers.len(), 1);
                assert_eq!(centers[0].inhomogeneous().to_dense(), vec![3.0]);
                assert!(centers[0].weight() > 0.0);
            }
        }
    }

    #[test]
    fn all_zero_weights_give_no_centers() {
        let ops = PointOps::default();
        let points: Vec<BregmanPoint> = (0..5)
            .map(|i| ops.vector_to_point(vec![i as f64].into(), 0.0))
            .collect();
        let runs = KMeansParallel::new().init(&ops, &points, 2, 3, 0).unwrap();
        assert_eq!(runs, vec![Vec::new(); 3]);
    }

    #[test]
    fn candidate_weights_sum_to_total_weight() {
        let ops = PointOps::default();
        let points = line(&ops, &[0.0, 10.0], 10);
        let cands = vec![vec![
            ops.point_to_center(&points[0]),
            ops.point_to_center(&points[15]),
        ]];
        let w = candidate_weights(&ops, &points, &cands);
        assert_eq!(w[0], vec![10.0, 10.0]);
    }
}
