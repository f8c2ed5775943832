//! Points, centers, and the distance between them.
//!
//! # Factored distance
//!
//! For a point `x` and a center with mean `c`,
//!
//! ```text
//! D(x, c) = F(x) - F(c) - <∇F(c), x - c>
//!         = F(x) + (<∇F(c), c> - F(c)) - <∇F(c), x>
//! ```
//!
//! `F(x)` is cached on the [`BregmanPoint`], and `∇F(c)` together with
//! `<∇F(c), c> - F(c)` on the [`BregmanCenter`]. The assignment loop, which
//! runs points × centers times per iteration, is then one dot product and
//! two additions regardless of the divergence.

use crate::centroid::{Centroid, CentroidKind};
use crate::cluster::util::partitioned_sum;
use crate::divergence::{BregmanDivergence, DivergenceKind, LogPolicy, SymmetrizedKlEmbedding};
use crate::vector::{Vector, WeightedVector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default weight at or below which points and centers are degenerate.
pub const DEFAULT_WEIGHT_THRESHOLD: f64 = 1e-8;

/// Default distance above which a recomputed center counts as moved.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 1e-8;

/// A weighted input point with its generator value cached.
#[derive(Clone, Debug, PartialEq)]
pub struct BregmanPoint {
    coords: Vector,
    weight: f64,
    f: f64,
}

impl BregmanPoint {
    /// Inhomogeneous coordinates.
    pub fn coords(&self) -> &Vector {
        &self.coords
    }

    /// Weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// `F(coords)`.
    pub fn f(&self) -> f64 {
        self.f
    }

    /// Dimension.
    pub fn dim(&self) -> usize {
        self.coords.len()
    }
}

/// A cluster center with the statistics the distance needs.
#[derive(Clone, Debug, PartialEq)]
pub struct BregmanCenter {
    homogeneous: Vector,
    weight: f64,
    dot_grad_minus_f: f64,
    gradient: Vector,
}

impl BregmanCenter {
    /// Homogeneous coordinates (sum of member coordinates times weights).
    pub fn homogeneous(&self) -> &Vector {
        &self.homogeneous
    }

    /// Total weight of the members.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// `<h, ∇F(h/w)> / w - F(h/w)`.
    pub fn dot_grad_minus_f(&self) -> f64 {
        self.dot_grad_minus_f
    }

    /// `∇F(h/w)`.
    pub fn gradient(&self) -> &Vector {
        &self.gradient
    }

    /// The center's mean.
    pub fn inhomogeneous(&self) -> Vector {
        self.to_weighted_vector().inhomogeneous()
    }

    /// Coordinates and weight, without the cached statistics.
    pub fn to_weighted_vector(&self) -> WeightedVector {
        WeightedVector::from_homogeneous(self.homogeneous.clone(), self.weight)
    }

    /// Dimension.
    pub fn dim(&self) -> usize {
        self.homogeneous.len()
    }
}

/// Adjustments that keep KL-type divergences usable on sparse or count data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Smoothing {
    /// Exact distance.
    #[default]
    None,
    /// Add `Σ x[i]` over dimensions the point has but the center lacks.
    ///
    /// Points and centers are stored over their non-zero coordinates only,
    /// so a zero center coordinate never reaches the gradient. Approximates
    /// Laplace-smoothed KL without densifying centers.
    SparsePenalty,
    /// Compute center statistics from `(h + 1, w + 1)`: one pseudo-count per
    /// dimension. Stored center coordinates stay unsmoothed.
    PseudoCount,
}

/// A divergence bound to point and center representations.
///
/// Holds three independent strategies: the divergence (with its logarithm
/// policy), the centroid accumulator kind, and the smoothing policy.
#[derive(Clone, Debug)]
pub struct PointOps {
    kind: Option<DivergenceKind>,
    divergence: Arc<dyn BregmanDivergence>,
    log: LogPolicy,
    centroid: CentroidKind,
    smoothing: Smoothing,
    embedding: Option<SymmetrizedKlEmbedding>,
    weight_threshold: f64,
    distance_threshold: f64,
}

impl PointOps {
    /// Dense, unsmoothed operations for the named divergence.
    pub fn new(kind: DivergenceKind) -> Self {
        Self {
            kind: Some(kind),
            divergence: kind.divergence(),
            log: kind.default_log(),
            centroid: CentroidKind::Dense,
            smoothing: Smoothing::None,
            embedding: kind.embedding(),
            weight_threshold: DEFAULT_WEIGHT_THRESHOLD,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
        }
    }

    /// Operations over a caller-supplied divergence.
    pub fn with_divergence(divergence: Arc<dyn BregmanDivergence>) -> Self {
        Self {
            kind: None,
            divergence,
            ..Self::new(DivergenceKind::SquaredEuclidean)
        }
    }

    /// Sparse KL with the smoothing penalty and pruned sparse accumulators.
    pub fn sparse_kl(max_entries: usize) -> Self {
        Self::new(DivergenceKind::KullbackLeibler)
            .with_centroid(CentroidKind::Sparse { max_entries })
            .with_smoothing(Smoothing::SparsePenalty)
    }

    /// KL over integer counts: discrete logarithms and pseudo-count smoothing.
    pub fn discrete_kl() -> Self {
        Self::new(DivergenceKind::KullbackLeibler)
            .with_log(LogPolicy::Discrete)
            .with_smoothing(Smoothing::PseudoCount)
    }

    /// Set the logarithm policy.
    pub fn with_log(mut self, log: LogPolicy) -> Self {
        self.log = log;
        self
    }

    /// Set the accumulator kind.
    pub fn with_centroid(mut self, centroid: CentroidKind) -> Self {
        self.centroid = centroid;
        self
    }

    /// Set the smoothing policy.
    pub fn with_smoothing(mut self, smoothing: Smoothing) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Set the degenerate-weight threshold.
    pub fn with_weight_threshold(mut self, threshold: f64) -> Self {
        self.weight_threshold = threshold;
        self
    }

    /// Set the movement threshold used for convergence.
    pub fn with_distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = threshold;
        self
    }

    /// The underlying divergence.
    pub fn divergence(&self) -> &dyn BregmanDivergence {
        self.divergence.as_ref()
    }

    /// The built-in divergence these operations were made from; `None` for a
    /// caller-supplied one.
    pub fn kind(&self) -> Option<DivergenceKind> {
        self.kind
    }

    /// Logarithm policy.
    pub fn log(&self) -> LogPolicy {
        self.log
    }

    /// Accumulator kind.
    pub fn centroid_kind(&self) -> CentroidKind {
        self.centroid
    }

    /// Smoothing policy.
    pub fn smoothing(&self) -> Smoothing {
        self.smoothing
    }

    /// Weight at or below which points and centers are degenerate.
    pub fn weight_threshold(&self) -> f64 {
        self.weight_threshold
    }

    /// Distance above which a center has moved.
    pub fn distance_threshold(&self) -> f64 {
        self.distance_threshold
    }

    /// Divergence from `point` to `center`.
    ///
    /// `+∞` for a degenerate center, `0` for a degenerate point, and never
    /// negative: round-off in the factored form is clamped to zero.
    #[inline]
    pub fn distance(&self, point: &BregmanPoint, center: &BregmanCenter) -> f64 {
        if center.weight <= self.weight_threshold {
            return f64::INFINITY;
        }
        if point.weight <= self.weight_threshold {
            return 0.0;
        }
        let mut d = point.f + center.dot_grad_minus_f - center.gradient.dot(&point.coords);
        if self.smoothing == Smoothing::SparsePenalty {
            d += point.coords.sum_outside_support(&center.gradient);
        }
        if d < 0.0 {
            0.0
        } else {
            d
        }
    }

    /// Whether `center` is farther than the distance threshold from `point`.
    pub fn center_moved(&self, point: &BregmanPoint, center: &BregmanCenter) -> bool {
        self.distance(point, center) > self.distance_threshold
    }

    /// Turn a raw observation into a point, applying the divergence's embedding if any.
    pub fn vector_to_point(&self, raw: Vector, weight: f64) -> BregmanPoint {
        let coords = match &self.embedding {
            Some(e) => e.embed(&raw, self.log),
            None => raw,
        };
        self.make_point(coords, weight)
    }

    /// Turn a weighted vector already in point space into a point.
    pub fn to_point(&self, v: &WeightedVector) -> BregmanPoint {
        self.make_point(v.inhomogeneous(), v.weight())
    }

    /// Turn a weighted vector (for example an accumulated centroid) into a center.
    pub fn to_center(&self, v: &WeightedVector) -> BregmanCenter {
        let w = v.weight();
        let h = match self.smoothing {
            Smoothing::SparsePenalty => v.homogeneous().to_nonzero_sparse(),
            Smoothing::None | Smoothing::PseudoCount => v.homogeneous().clone(),
        };
        let (gradient, dot_grad_minus_f) = match self.smoothing {
            Smoothing::PseudoCount => {
                let smoothed = Vector::Dense(h.to_dense().into_iter().map(|x| x + 1.0).collect());
                self.center_statistics(&smoothed, w + 1.0)
            }
            Smoothing::None | Smoothing::SparsePenalty => self.center_statistics(&h, w),
        };
        BregmanCenter {
            homogeneous: h,
            weight: w,
            dot_grad_minus_f,
            gradient,
        }
    }

    /// A center located at a single point.
    pub fn point_to_center(&self, point: &BregmanPoint) -> BregmanCenter {
        self.to_center(&WeightedVector::from_inhomogeneous(
            point.coords.clone(),
            point.weight,
        ))
    }

    /// A point located at a center's mean, carrying the center's weight.
    pub fn center_to_point(&self, center: &BregmanCenter) -> BregmanPoint {
        self.make_point(center.inhomogeneous(), center.weight)
    }

    /// A fresh accumulator of the configured kind.
    pub fn make_centroid(&self) -> Centroid {
        self.centroid.make()
    }

    /// Index of and distance to the closest center. Ties go to the lowest index.
    pub fn find_closest(
        &self,
        centers: &[BregmanCenter],
        point: &BregmanPoint,
    ) -> Option<(usize, f64)> {
        self.closest_among(centers.iter().enumerate(), point)
    }

    /// Like [`PointOps::find_closest`], skipping absent slots.
    pub fn find_closest_slot(
        &self,
        slots: &[Option<BregmanCenter>],
        point: &BregmanPoint,
    ) -> Option<(usize, f64)> {
        self.closest_among(
            slots
                .iter()
                .enumerate()
                .filter_map(|(i, c)| c.as_ref().map(|c| (i, c))),
            point,
        )
    }

    /// Weighted sum of each point's distance to its closest center.
    pub fn distortion(&self, centers: &[BregmanCenter], points: &[BregmanPoint]) -> f64 {
        partitioned_sum(points, |p| {
            self.find_closest(centers, p)
                .map_or(0.0, |(_, d)| d * p.weight)
        })
    }

    fn closest_among<'a>(
        &self,
        centers: impl Iterator<Item = (usize, &'a BregmanCenter)>,
        point: &BregmanPoint,
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in centers {
            let d = self.distance(point, c);
            match best {
                Some((_, best_d)) if !(d < best_d) => {}
                _ => best = Some((i, d)),
            }
        }
        best
    }

    fn make_point(&self, coords: Vector, weight: f64) -> BregmanPoint {
        let coords = match self.smoothing {
            Smoothing::SparsePenalty => coords.to_nonzero_sparse(),
            Smoothing::None | Smoothing::PseudoCount => coords,
        };
        let f = self.divergence.convex(&coords, self.log);
        BregmanPoint { coords, weight, f }
    }

    fn center_statistics(&self, h: &Vector, w: f64) -> (Vector, f64) {
        let gradient = self.divergence.gradient_homogeneous(h, w, self.log);
        if w <= 0.0 {
            return (gradient, 0.0);
        }
        let f = self.divergence.convex_homogeneous(h, w, self.log);
        let dot = h.dot(&gradient) / w - f;
        (gradient, dot)
    }
}

impl Default for PointOps {
    fn default() -> Self {
        Self::new(DivergenceKind::SquaredEuclidean)
    }
}
