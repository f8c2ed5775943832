use super::{BregmanDivergence, LogPolicy};
use crate::vector::{SparseVector, Vector};

/// `F(x) = ||x||²`, `∇F(x) = 2x`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SquaredEuclidean;

impl BregmanDivergence for SquaredEuclidean {
    fn convex(&self, v: &Vector, _log: LogPolicy) -> f64 {
        v.iter_stored().map(|(_, x)| x * x).sum()
    }

    fn gradient(&self, v: &Vector, _log: LogPolicy) -> Vector {
        v.scaled(2.0)
    }

    fn convex_homogeneous(&self, h: &Vector, w: f64, _log: LogPolicy) -> f64 {
        if w <= 0.0 {
            return 0.0;
        }
        h.iter_stored().map(|(_, x)| x * x).sum::<f64>() / (w * w)
    }

    fn gradient_homogeneous(&self, h: &Vector, w: f64, _log: LogPolicy) -> Vector {
        if w <= 0.0 {
            return h.map_stored(|_| 0.0);
        }
        h.scaled(2.0 / w)
    }

    fn name(&self) -> &'static str {
        "squared-euclidean"
    }
}

/// Generalized Kullback-Leibler: `F(x) = Σ x ln x - x`, `∇F(x) = ln x`.
///
/// Domain is the non-negative orthant. Unlike the simplex variant, inputs
/// need not sum to one.
#[derive(Clone, Copy, Debug, Default)]
pub struct KullbackLeibler;

impl BregmanDivergence for KullbackLeibler {
    fn convex(&self, v: &Vector, log: LogPolicy) -> f64 {
        v.iter_stored().map(|(_, x)| log.x_ln_x(x) - x).sum()
    }

    fn gradient(&self, v: &Vector, log: LogPolicy) -> Vector {
        v.map_stored(|x| log.ln(x))
    }

    fn name(&self) -> &'static str {
        "kullback-leibler"
    }
}

/// Kullback-Leibler on the probability simplex: `F(x) = Σ x ln x`,
/// `∇F(x) = 1 + ln x`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimplexKullbackLeibler;

impl BregmanDivergence for SimplexKullbackLeibler {
    fn convex(&self, v: &Vector, log: LogPolicy) -> f64 {
        v.iter_stored().map(|(_, x)| log.x_ln_x(x)).sum()
    }

    fn gradient(&self, v: &Vector, log: LogPolicy) -> Vector {
        v.map_stored(|x| 1.0 + log.ln(x))
    }

    fn name(&self) -> &'static str {
        "simplex-kullback-leibler"
    }
}

/// Generalized I-divergence over counts.
///
/// Same generator as [`KullbackLeibler`], but the homogeneous forms take
/// logarithms of the accumulated counts and of the total weight separately,
/// `ln(h / w) = ln h - ln w`, so a discrete log policy sees integers.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeneralizedI;

impl BregmanDivergence for GeneralizedI {
    fn convex(&self, v: &Vector, log: LogPolicy) -> f64 {
        v.iter_stored().map(|(_, x)| log.x_ln_x(x) - x).sum()
    }

    fn gradient(&self, v: &Vector, log: LogPolicy) -> Vector {
        v.map_stored(|x| log.ln(x))
    }

    fn convex_homogeneous(&self, h: &Vector, w: f64, log: LogPolicy) -> f64 {
        if w <= 0.0 {
            return 0.0;
        }
        let ln_w = log.ln(w);
        let (mut h_ln_h, mut total) = (0.0, 0.0);
        for (_, x) in h.iter_stored() {
            h_ln_h += log.x_ln_x(x);
            total += x;
        }
        (h_ln_h - total * ln_w - total) / w
    }

    fn gradient_homogeneous(&self, h: &Vector, w: f64, log: LogPolicy) -> Vector {
        if w <= 0.0 {
            return h.map_stored(|_| 0.0);
        }
        let ln_w = log.ln(w);
        h.map_stored(|x| log.ln(x) - ln_w)
    }

    fn name(&self) -> &'static str {
        "generalized-i"
    }
}

/// Logistic loss: `F(x) = Σ x ln x + (1 - x) ln(1 - x)`,
/// `∇F(x) = ln x - ln(1 - x)`. Domain is `(0, 1)` per coordinate.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogisticLoss;

impl BregmanDivergence for LogisticLoss {
    fn convex(&self, v: &Vector, log: LogPolicy) -> f64 {
        v.iter_stored()
            .map(|(_, x)| log.x_ln_x(x) + log.x_ln_x(1.0 - x))
            .sum()
    }

    fn gradient(&self, v: &Vector, log: LogPolicy) -> Vector {
        v.map_stored(|x| log.ln(x) - log.ln(1.0 - x))
    }

    fn name(&self) -> &'static str {
        "logistic-loss"
    }
}

/// Itakura-Saito: `F(x) = -Σ ln x`, `∇F(x) = -1/x`. Domain is the positive orthant.
#[derive(Clone, Copy, Debug, Default)]
pub struct ItakuraSaito;

impl BregmanDivergence for ItakuraSaito {
    fn convex(&self, v: &Vector, log: LogPolicy) -> f64 {
        -v.iter_stored().map(|(_, x)| log.ln(x)).sum::<f64>()
    }

    fn gradient(&self, v: &Vector, _log: LogPolicy) -> Vector {
        v.map_stored(|x| -1.0 / x)
    }

    fn name(&self) -> &'static str {
        "itakura-saito"
    }
}

/// Embedding `x ↦ (x, ln x)` into twice the dimension.
///
/// Squared Euclidean distance between embedded points is
/// `||x - y||² + ||ln x - ln y||²`, which tracks the symmetrized KL divergence
/// `Σ (x - y)(ln x - ln y)` while letting ordinary k-means machinery run on
/// the embedded points.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymmetrizedKlEmbedding;

impl SymmetrizedKlEmbedding {
    /// Embed one vector. Zero entries of a sparse vector stay unstored.
    pub fn embed(&self, v: &Vector, log: LogPolicy) -> Vector {
        match v {
            Vector::Dense(values) => {
                let mut out = Vec::with_capacity(values.len() * 2);
                out.extend_from_slice(values);
                out.extend(values.iter().map(|&x| log.ln(x)));
                Vector::Dense(out)
            }
            Vector::Sparse(s) => {
                let dim = s.dim();
                let stored: Vec<(usize, f64)> = s
                    .indices()
                    .iter()
                    .copied()
                    .zip(s.values().iter().copied())
                    .filter(|&(_, x)| x != 0.0)
                    .collect();
                let mut indices: Vec<usize> = Vec::with_capacity(stored.len() * 2);
                let mut values: Vec<f64> = Vec::with_capacity(stored.len() * 2);
                for &(i, x) in &stored {
                    indices.push(i);
                    values.push(x);
                }
                for &(i, x) in &stored {
                    indices.push(dim + i);
                    values.push(log.ln(x));
                }
                Vector::Sparse(SparseVector::from_sorted(dim * 2, indices, values))
            }
        }
    }
}
