//! Bregman divergences.
//!
//! A Bregman divergence is generated by a strictly convex function `F`:
//!
//! ```text
//! D(x, y) = F(x) - F(y) - <∇F(y), x - y>
//! ```
//!
//! Squared Euclidean distance is the case `F(x) = ||x||²`. Other generators
//! give the (generalized) Kullback-Leibler divergence, Itakura-Saito, logistic
//! loss and so on. For every Bregman divergence the mean of a cluster is the
//! point minimizing total divergence to its members, which is what makes
//! Lloyd's algorithm work unchanged.
//!
//! This module only knows about `F` and `∇F`. Turning them into a fast
//! point-to-center distance is the job of [`crate::ops::PointOps`].
//!
//! ## Homogeneous coordinates
//!
//! Cluster sums are kept as `(h, w)` with `h = Σ wᵢ xᵢ`. The homogeneous
//! variants evaluate the generator and its gradient at the mean `h / w`
//! without the caller dividing first; divergences with a closed form avoid
//! the intermediate vector.

mod generators;
mod log;

pub use generators::{
    GeneralizedI, ItakuraSaito, KullbackLeibler, LogisticLoss, SimplexKullbackLeibler,
    SquaredEuclidean, SymmetrizedKlEmbedding,
};
pub use log::LogPolicy;

use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// A convex generator and its gradient.
///
/// Inputs must lie in the divergence's natural domain. Nothing is clamped:
/// out-of-domain coordinates produce `NaN` or infinities.
pub trait BregmanDivergence: Debug + Send + Sync {
    /// `F(v)`.
    fn convex(&self, v: &Vector, log: LogPolicy) -> f64;

    /// `∇F(v)`. Sparse inputs give a gradient over the same stored indices.
    fn gradient(&self, v: &Vector, log: LogPolicy) -> Vector;

    /// `F(h / w)`.
    fn convex_homogeneous(&self, h: &Vector, w: f64, log: LogPolicy) -> f64 {
        if w <= 0.0 {
            return 0.0;
        }
        self.convex(&h.scaled(1.0 / w), log)
    }

    /// `∇F(h / w)`.
    fn gradient_homogeneous(&self, h: &Vector, w: f64, log: LogPolicy) -> Vector {
        if w <= 0.0 {
            return h.map_stored(|_| 0.0);
        }
        self.gradient(&h.scaled(1.0 / w), log)
    }

    /// Short human-readable name, used in logs.
    fn name(&self) -> &'static str;
}

/// Identifiers for the supported divergences.
///
/// Resolved once, at configuration time, into a concrete [`BregmanDivergence`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DivergenceKind {
    /// `F(x) = ||x||²`.
    #[default]
    SquaredEuclidean,
    /// Generalized KL on the positive orthant: `F(x) = Σ x ln x - x`.
    KullbackLeibler,
    /// KL restricted to the probability simplex: `F(x) = Σ x ln x`.
    SimplexKullbackLeibler,
    /// Generalized I-divergence on counts, logs taken in count space.
    GeneralizedI,
    /// Logistic loss on `(0, 1)`: `F(x) = Σ x ln x + (1-x) ln(1-x)`.
    LogisticLoss,
    /// Itakura-Saito on the positive orthant: `F(x) = -Σ ln x`.
    ItakuraSaito,
    /// Symmetrized KL, approximated by squared Euclidean distance after the
    /// embedding `x ↦ (x, ln x)`.
    SymmetrizedKullbackLeibler,
}

impl DivergenceKind {
    /// Build the divergence this identifier names.
    pub fn divergence(self) -> Arc<dyn BregmanDivergence> {
        match self {
            DivergenceKind::SquaredEuclidean | DivergenceKind::SymmetrizedKullbackLeibler => {
                Arc::new(SquaredEuclidean)
            }
            DivergenceKind::KullbackLeibler => Arc::new(KullbackLeibler),
            DivergenceKind::SimplexKullbackLeibler => Arc::new(SimplexKullbackLeibler),
            DivergenceKind::GeneralizedI => Arc::new(GeneralizedI),
            DivergenceKind::LogisticLoss => Arc::new(LogisticLoss),
            DivergenceKind::ItakuraSaito => Arc::new(ItakuraSaito),
        }
    }

    /// The logarithm policy this divergence uses unless told otherwise.
    pub fn default_log(self) -> LogPolicy {
        match self {
            DivergenceKind::GeneralizedI => LogPolicy::Discrete,
            _ => LogPolicy::Natural,
        }
    }

    /// Embedding applied to raw input vectors before they become points.
    pub fn embedding(self) -> Option<SymmetrizedKlEmbedding> {
        match self {
            DivergenceKind::SymmetrizedKullbackLeibler => Some(SymmetrizedKlEmbedding),
            _ => None,
        }
    }
}
