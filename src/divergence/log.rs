//! Logarithm policies injected into divergence generators.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Size of the lookup table used by [`LogPolicy::Discrete`].
const DISCRETE_TABLE_SIZE: usize = 1024;

static DISCRETE_TABLE: OnceLock<Vec<f64>> = OnceLock::new();

fn discrete_table() -> &'static [f64] {
    DISCRETE_TABLE.get_or_init(|| (0..DISCRETE_TABLE_SIZE).map(|n| (n as f64).ln()).collect())
}

/// How a divergence takes logarithms.
///
/// This is orthogonal to the divergence itself: the same generator can run
/// on raw reals, on smoothed reals, or on integer counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogPolicy {
    /// `ln(x)`.
    #[default]
    Natural,
    /// `ln(x + epsilon)`, finite at zero.
    Smoothed {
        /// Additive smoothing constant.
        epsilon: f64,
    },
    /// Table lookup for small non-negative integers, `ln(x)` otherwise.
    ///
    /// Intended for frequency counts, where the same few logarithms are
    /// taken over and over.
    Discrete,
}

impl LogPolicy {
    /// Logarithm of `x` under this policy.
    #[inline]
    pub fn ln(self, x: f64) -> f64 {
        match self {
            LogPolicy::Natural => x.ln(),
            LogPolicy::Smoothed { epsilon } => (x + epsilon).ln(),
            LogPolicy::Discrete => {
                if x >= 0.0 && x < DISCRETE_TABLE_SIZE as f64 && x.fract() == 0.0 {
                    discrete_table()[x as usize]
                } else {
                    x.ln()
                }
            }
        }
    }

    /// `x * ln(x)` with the convention `0 * ln(0) = 0`.
    #[inline]
    pub fn x_ln_x(self, x: f64) -> f64 {
        if x == 0.0 {
            0.0
        } else {
            x * self.ln(x)
        }
    }
}
