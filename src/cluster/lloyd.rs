//! Lloyd's iteration over several independent runs.
//!
//! Every variant shares this driver; they differ only in how points are
//! assigned (see [`Assigner`]). Per iteration:
//!
//! 1. publish an immutable snapshot of every run's centers;
//! 2. assign points and accumulate per partition, merging partials in order;
//! 3. recompute centers: drop clusters left without weight, replace centers
//!    whose mean changed, and settle runs where nothing moved.
//!
//! Center slots keep their index for the whole run. A dropped cluster leaves
//! an empty slot rather than shifting later clusters down, so cached
//! assignments stay meaningful.

use crate::centroid::Centroid;
use crate::error::{Error, Result};
use crate::ops::{BregmanCenter, BregmanPoint, PointOps};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// Centers moved or clusters emptied in the last iteration.
    Active,
    /// A full iteration changed nothing beyond the distance threshold.
    Converged,
    /// The iteration or time budget ran out first.
    Exhausted,
}

/// Final state of one run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// Surviving centers, in slot order.
    pub centers: Vec<BregmanCenter>,
    /// Weighted sum of distances from each point to its closest center.
    pub distortion: f64,
    /// Recompute steps applied to this run.
    pub iterations: usize,
    /// Why the run stopped.
    pub status: RunStatus,
}

/// The run with the lowest distortion.
pub fn best_run(outcomes: &[RunOutcome]) -> Option<&RunOutcome> {
    outcomes
        .iter()
        .min_by(|a, b| a.distortion.total_cmp(&b.distortion))
}

/// Limits on how long the engine iterates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Optional wall-clock limit, checked between iterations.
    pub time_limit: Option<Duration>,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            time_limit: None,
        }
    }
}

impl Budget {
    /// Budget of `max_iterations` iterations and no time limit.
    pub fn iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            time_limit: None,
        }
    }
}

/// Centers visible to every worker during one iteration.
#[derive(Debug)]
pub(crate) struct Snapshot {
    /// `slots[run][cluster]`; `None` marks a dropped cluster.
    pub(crate) slots: Vec<Vec<Option<BregmanCenter>>>,
    /// `replaced[run][cluster]`: the center changed in the previous recompute.
    pub(crate) replaced: Vec<Vec<bool>>,
    /// Runs to assign this iteration.
    pub(crate) active: Vec<bool>,
}

/// Assigns points to centers and accumulates the clusters.
pub(crate) trait Assigner {
    /// Return `sums[run][cluster]` for every run (inactive runs may be left empty).
    fn assign(
        &mut self,
        ops: &PointOps,
        points: &[BregmanPoint],
        snapshot: &Snapshot,
    ) -> Vec<Vec<Centroid>>;
}

struct RunState {
    slots: Vec<Option<BregmanCenter>>,
    replaced: Vec<bool>,
    status: RunStatus,
    iterations: usize,
}

impl RunState {
    fn new(centers: Vec<BregmanCenter>) -> Self {
        let k = centers.len();
        Self {
            slots: centers.into_iter().map(Some).collect(),
            replaced: vec![true; k],
            status: RunStatus::Active,
            iterations: 0,
        }
    }
}

/// Check inputs before any work starts.
pub(crate) fn validate(points: &[BregmanPoint], centers: &[Vec<BregmanCenter>]) -> Result<()> {
    let first = points.first().ok_or(Error::EmptyInput)?;
    if centers.is_empty() {
        return Err(Error::InvalidParameter {
            name: "runs",
            message: "must be at least 1",
        });
    }
    if centers.iter().any(|run| run.is_empty()) {
        return Err(Error::InvalidParameter {
            name: "centers",
            message: "every run needs at least one initial center",
        });
    }
    let d = first.dim();
    for found in points
        .iter()
        .map(BregmanPoint::dim)
        .chain(centers.iter().flatten().map(BregmanCenter::dim))
    {
        if found != d {
            return Err(Error::DimensionMismatch { expected: d, found });
        }
    }
    Ok(())
}

/// Fresh `sums[run][cluster]` accumulators for the active runs.
pub(crate) fn empty_sums(ops: &PointOps, snapshot: &Snapshot) -> Vec<Vec<Centroid>> {
    snapshot
        .slots
        .iter()
        .zip(snapshot.active.iter())
        .map(|(slots, &active)| {
            if active {
                (0..slots.len()).map(|_| ops.make_centroid()).collect()
            } else {
                Vec::new()
            }
        })
        .collect()
}

/// Merge per-partition partial sums, in partition order.
pub(crate) fn merge_partials(partials: Vec<Vec<Vec<Centroid>>>) -> Vec<Vec<Centroid>> {
    let mut iter = partials.into_iter();
    let Some(mut total) = iter.next() else {
        return Vec::new();
    };
    for partial in iter {
        for (run_total, run_partial) in total.iter_mut().zip(partial.iter()) {
            for (acc, part) in run_total.iter_mut().zip(run_partial.iter()) {
                acc.merge(part);
            }
        }
    }
    total
}

/// What a recompute step changed.
struct Recompute {
    moved: usize,
    dropped: usize,
}

fn recompute(ops: &PointOps, state: &mut RunState, sums: &[Centroid]) -> Recompute {
    let mut change = Recompute {
        moved: 0,
        dropped: 0,
    };
    for (j, slot) in state.slots.iter_mut().enumerate() {
        state.replaced[j] = false;
        let Some(old) = slot.as_ref() else {
            continue;
        };
        let acc = &sums[j];
        if acc.weight() <= ops.weight_threshold() {
            *slot = None;
            change.dropped += 1;
            continue;
        }
        let new = ops.to_center(&acc.to_weighted_vector());
        if new == *old {
            continue;
        }
        if ops.center_moved(&ops.center_to_point(&new), old) {
            change.moved += 1;
        }
        *slot = Some(new);
        state.replaced[j] = true;
    }
    change
}

/// Run Lloyd's iteration from `initial` (one center set per run).
pub(crate) fn run<A: Assigner>(
    variant: &'static str,
    ops: &PointOps,
    points: &[BregmanPoint],
    initial: Vec<Vec<BregmanCenter>>,
    budget: Budget,
    assigner: &mut A,
) -> Result<Vec<RunOutcome>> {
    validate(points, &initial)?;
    if budget.max_iterations == 0 {
        return Err(Error::InvalidParameter {
            name: "max_iterations",
            message: "must be at least 1",
        });
    }

    let mut states: Vec<RunState> = initial.into_iter().map(RunState::new).collect();
    let start = Instant::now();
    let mut iteration = 0usize;

    debug!(
        variant,
        divergence = ops.divergence().name(),
        points = points.len(),
        runs = states.len(),
        "starting lloyd iterations"
    );

    loop {
        let active: Vec<bool> = states
            .iter()
            .map(|s| s.status == RunStatus::Active)
            .collect();
        let n_active = active.iter().filter(|&&a| a).count();
        if n_active == 0 {
            break;
        }

        let out_of_time = budget.time_limit.is_some_and(|t| start.elapsed() >= t);
        if iteration >= budget.max_iterations || out_of_time {
            warn!(
                variant,
                iteration,
                unsettled = n_active,
                out_of_time,
                "budget exhausted before convergence"
            );
            for s in states.iter_mut().filter(|s| s.status == RunStatus::Active) {
                s.status = RunStatus::Exhausted;
            }
            break;
        }
        iteration += 1;

        // Published once, read by every worker, replaced next iteration.
        let snapshot = Arc::new(Snapshot {
            slots: states.iter().map(|s| s.slots.clone()).collect(),
            replaced: states.iter().map(|s| s.replaced.clone()).collect(),
            active,
        });
        let sums = assigner.assign(ops, points, &snapshot);

        let (mut moved, mut dropped) = (0, 0);
        for (r, state) in states.iter_mut().enumerate() {
            if !snapshot.active[r] {
                continue;
            }
            let change = recompute(ops, state, &sums[r]);
            state.iterations += 1;
            if change.moved == 0 && change.dropped == 0 {
                state.status = RunStatus::Converged;
            }
            moved += change.moved;
            dropped += change.dropped;
        }
        debug!(variant, iteration, active = n_active, moved, dropped, "lloyd iteration");
    }

    let outcomes: Vec<RunOutcome> = states
        .into_iter()
        .map(|s| {
            let centers: Vec<BregmanCenter> = s.slots.into_iter().flatten().collect();
            let distortion = ops.distortion(&centers, points);
            RunOutcome {
                centers,
                distortion,
                iterations: s.iterations,
                status: s.status,
            }
        })
        .collect();

    for (r, o) in outcomes.iter().enumerate() {
        info!(
            variant,
            run = r,
            clusters = o.centers.len(),
            distortion = o.distortion,
            iterations = o.iterations,
            status = ?o.status,
            "run finished"
        );
    }
    Ok(outcomes)
}
