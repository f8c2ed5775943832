use super::{validate, Initializer};
use crate::cluster::util::child_seeds;
use crate::error::{Error, Result};
use crate::ops::{BregmanCenter, BregmanPoint, PointOps};
use rand::prelude::*;
use rayon::prelude::*;
use tracing::{debug, warn};

/// K-Means++ seeding over a weighted candidate pool.
///
/// Each round draws candidates with probability proportional to
/// `weight × distance to the nearest chosen center`, then updates distances.
/// Seeding stops early when every remaining candidate has zero selection
/// weight, e.g. when all candidates coincide with chosen centers; the result
/// then has fewer than `k` centers.
#[derive(Clone, Debug)]
pub struct KMeansPlusPlus {
    per_round: usize,
}

impl Default for KMeansPlusPlus {
    fn default() -> Self {
        Self { per_round: 1 }
    }
}

impl KMeansPlusPlus {
    /// One pick per round.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of picks drawn before distances are updated.
    pub fn with_per_round(mut self, per_round: usize) -> Self {
        self.per_round = per_round;
        self
    }

    /// Select up to `k` centers from `candidates`.
    ///
    /// The first `num_preselected` candidates are taken as already chosen.
    /// With none preselected, the first center is drawn by `weights` alone.
    pub fn good_centers(
        &self,
        ops: &PointOps,
        seed: u64,
        candidates: &[BregmanCenter],
        weights: &[f64],
        k: usize,
        num_preselected: usize,
    ) -> Result<Vec<BregmanCenter>> {
        if candidates.is_empty() {
            return Err(Error::EmptyInput);
        }
        if k == 0 {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "must be at least 1",
            });
        }
        if self.per_round == 0 {
            return Err(Error::InvalidParameter {
                name: "per_round",
                message: "must be at least 1",
            });
        }
        if weights.len() != candidates.len() {
            return Err(Error::DimensionMismatch {
                expected: candidates.len(),
                found: weights.len(),
            });
        }
        if num_preselected > candidates.len() {
            return Err(Error::InvalidParameter {
                name: "num_preselected",
                message: "exceeds the number of candidates",
            });
        }

        let n = candidates.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let points: Vec<BregmanPoint> = candidates
            .par_iter()
            .map(|c| ops.center_to_point(c))
            .collect();
        let mut distances = vec![f64::INFINITY; n];
        let mut chosen: Vec<usize> = (0..num_preselected).collect();
        update_distances(ops, &points, &mut distances, candidates, &chosen);

        if chosen.is_empty() {
            let cumulative = cumulative_scores(weights.iter().map(|&w| w.max(0.0)), n);
            match pick_weighted(&mut rng, &cumulative) {
                Some(first) => {
                    chosen.push(first);
                    update_distances(ops, &points, &mut distances, candidates, &chosen);
                }
                None => {
                    warn!("no candidate has positive weight");
                    return Ok(Vec::new());
                }
            }
        }

        while chosen.len() < k {
            let cumulative = cumulative_scores(
                weights.iter().zip(distances.iter()).map(|(&w, &d)| {
                    if w > 0.0 && d > 0.0 {
                        w * d
                    } else {
                        0.0
                    }
                }),
                n,
            );

            let wanted = self.per_round.min(k - chosen.len());
            let mut picked: Vec<usize> = Vec::with_capacity(wanted);
            for _ in 0..wanted {
                match pick_weighted(&mut rng, &cumulative) {
                    Some(i) if !picked.contains(&i) => picked.push(i),
                    Some(_) => {}
                    None => break,
                }
            }
            if picked.is_empty() {
                debug!(chosen = chosen.len(), k, "candidate pool exhausted");
                break;
            }
            update_distances(ops, &points, &mut distances, candidates, &picked);
            chosen.extend(picked);
        }

        Ok(chosen.into_iter().map(|i| candidates[i].clone()).collect())
    }
}

impl Initializer for KMeansPlusPlus {
    fn init(
        &self,
        ops: &PointOps,
        points: &[BregmanPoint],
        k: usize,
        runs: usize,
        seed: u64,
    ) -> Result<Vec<Vec<BregmanCenter>>> {
        validate(points, k, runs)?;
        let candidates: Vec<BregmanCenter> =
            points.par_iter().map(|p| ops.point_to_center(p)).collect();
        let weights: Vec<f64> = points.iter().map(BregmanPoint::weight).collect();
        let mut master = StdRng::seed_from_u64(seed);
        child_seeds(&mut master, runs)
            .into_iter()
            .map(|s| self.good_centers(ops, s, &candidates, &weights, k, 0))
            .collect()
    }

    fn name(&self) -> &'static str {
        "k-means++"
    }
}

/// Lower each distance to the nearest of the `added` candidates.
fn update_distances(
    ops: &PointOps,
    points: &[BregmanPoint],
    distances: &mut [f64],
    candidates: &[BregmanCenter],
    added: &[usize],
) {
    if added.is_empty() {
        return;
    }
    distances
        .par_iter_mut()
        .zip(points.par_iter())
        .for_each(|(d, p)| {
            for &j in added {
                let nd = ops.distance(p, &candidates[j]);
                if nd < *d {
                    *d = nd;
                }
            }
        });
}

/// Running sums of `scores`, each capped so the total stays finite.
fn cumulative_scores(scores: impl Iterator<Item = f64>, n: usize) -> Vec<f64> {
    let cap = f64::MAX / (n.max(1) as f64);
    let mut total = 0.0;
    scores
        .map(|s| {
            total += if s.is_nan() { 0.0 } else { s.min(cap) };
            total
        })
        .collect()
}

/// Index of the first cumulative weight strictly greater than a uniform draw
/// in `[0, total)`. `None` when the total is not positive.
pub(crate) fn pick_weighted(rng: &mut impl Rng, cumulative: &[f64]) -> Option<usize> {
    let total = *cumulative.last()?;
    if !(total > 0.0) {
        return None;
    }
    let r = rng.random::<f64>() * total;
    let idx = cumulative.partition_point(|&c| c <= r);
    if idx < cumulative.len() {
        Some(idx)
    } else {
        // `r` rounded up to `total`: take the first index that reaches it.
        Some(cumulative.partition_point(|&c| c < total))
    }
}
