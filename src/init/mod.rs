//! Initial center selection.
//!
//! Lloyd's iteration only finds a local optimum, so where it starts matters.
//!
//! - [`RandomInit`]: `k` distinct points, uniformly at random.
//! - [`KMeansPlusPlus`]: sequential D²-style sampling (Arthur & Vassilvitskii,
//!   2007), here with the divergence in place of squared distance. Provides an
//!   `O(log k)` approximation in expectation, but needs `k` passes.
//! - [`KMeansParallel`]: K-Means‖ (Bahmani et al., 2012). Oversamples
//!   candidates in a few parallel rounds, then reduces them to `k` centers
//!   with K-Means++ and Lloyd's iteration on the small weighted candidate set.
//!
//! All seeders serve several runs at once and may return fewer than `k`
//! centers for a run when the data has fewer distinct points.

mod kmeans_parallel;
mod kmeans_pp;

pub use kmeans_parallel::KMeansParallel;
pub use kmeans_pp::KMeansPlusPlus;

use crate::cluster::util::child_rngs;
use crate::cluster::Budget;
use crate::error::{Error, Result};
use crate::ops::{BregmanCenter, BregmanPoint, PointOps};
use rand::prelude::*;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Produces initial centers for several runs.
pub trait Initializer: Debug + Send + Sync {
    /// Up to `k` centers for each of `runs` runs.
    fn init(
        &self,
        ops: &PointOps,
        points: &[BregmanPoint],
        k: usize,
        runs: usize,
        seed: u64,
    ) -> Result<Vec<Vec<BregmanCenter>>>;

    /// Short name, used in logs.
    fn name(&self) -> &'static str;
}

/// Identifiers for the seeding strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitializerKind {
    /// [`RandomInit`].
    Random,
    /// [`KMeansPlusPlus`] over the whole dataset.
    KMeansPlusPlus,
    /// [`KMeansParallel`] with default settings.
    #[default]
    KMeansParallel,
}

impl InitializerKind {
    /// Build the seeder this identifier names. `budget` bounds any local refinement.
    pub fn build(self, budget: Budget) -> Box<dyn Initializer> {
        match self {
            InitializerKind::Random => Box::new(RandomInit),
            InitializerKind::KMeansPlusPlus => Box::new(KMeansPlusPlus::new()),
            InitializerKind::KMeansParallel => Box::new(KMeansParallel::new().with_budget(budget)),
        }
    }
}

/// Check the arguments shared by every seeder.
pub(crate) fn validate(points: &[BregmanPoint], k: usize, runs: usize) -> Result<()> {
    if points.is_empty() {
        return Err(Error::EmptyInput);
    }
    if k == 0 {
        return Err(Error::InvalidParameter {
            name: "k",
            message: "must be at least 1",
        });
    }
    if runs == 0 {
        return Err(Error::InvalidParameter {
            name: "runs",
            message: "must be at least 1",
        });
    }
    Ok(())
}

/// `k` distinct points per run, chosen uniformly among points with usable weight.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomInit;

impl Initializer for RandomInit {
    fn init(
        &self,
        ops: &PointOps,
        points: &[BregmanPoint],
        k: usize,
        runs: usize,
        seed: u64,
    ) -> Result<Vec<Vec<BregmanCenter>>> {
        validate(points, k, runs)?;
        let usable: Vec<usize> = (0..points.len())
            .filter(|&i| points[i].weight() > ops.weight_threshold())
            .collect();

        let mut master = StdRng::seed_from_u64(seed);
        let amount = k.min(usable.len());
        Ok(child_rngs(&mut master, runs)
            .iter_mut()
            .map(|rng| {
                index::sample(rng, usable.len(), amount)
                    .into_iter()
                    .map(|i| ops.point_to_center(&points[usable[i]]))
                    .collect()
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
