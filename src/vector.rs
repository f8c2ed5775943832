//! Dense and sparse coordinate vectors, and their weighted form.
//!
//! Clustering works in two coordinate conventions:
//!
//! - **inhomogeneous**: coordinates as observed (a point, or a cluster mean);
//! - **homogeneous**: coordinates pre-multiplied by the weight, so that
//!   accumulating a cluster is a plain sum of vectors and weights.
//!
//! [`WeightedVector`] stores the homogeneous form and exposes both views.

use crate::error::{Error, Result};

/// Weights at or below this are treated as zero when dividing out.
const DEGENERATE_WEIGHT: f64 = f64::EPSILON;

/// A sparse vector: sorted, unique indices with their values.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseVector {
    dim: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseVector {
    /// Build from parallel index/value arrays.
    ///
    /// Indices must be strictly increasing and below `dim`.
    pub fn new(dim: usize, indices: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        if indices.len() != values.len() {
            return Err(Error::DimensionMismatch {
                expected: indices.len(),
                found: values.len(),
            });
        }
        if indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidParameter {
                name: "indices",
                message: "must be strictly increasing",
            });
        }
        if let Some(&last) = indices.last() {
            if last >= dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    found: last + 1,
                });
            }
        }
        Ok(Self {
            dim,
            indices,
            values,
        })
    }

    /// Build from unordered `(index, value)` pairs. Repeated indices are summed.
    pub fn from_pairs(dim: usize, pairs: impl IntoIterator<Item = (usize, f64)>) -> Result<Self> {
        let mut pairs: Vec<(usize, f64)> = pairs.into_iter().collect();
        pairs.sort_by_key(|&(i, _)| i);

        let mut indices: Vec<usize> = Vec::with_capacity(pairs.len());
        let mut values: Vec<f64> = Vec::with_capacity(pairs.len());
        for (i, v) in pairs {
            if indices.last() == Some(&i) {
                if let Some(last) = values.last_mut() {
                    *last += v;
                }
            } else {
                indices.push(i);
                values.push(v);
            }
        }
        Self::new(dim, indices, values)
    }

    // Trusted constructor for already-sorted data produced inside the crate.
    pub(crate) fn from_sorted(dim: usize, indices: Vec<usize>, values: Vec<f64>) -> Self {
        debug_assert_eq!(indices.len(), values.len());
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        Self {
            dim,
            indices,
            values,
        }
    }

    /// Declared dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Stored indices, ascending.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Stored values, aligned with [`SparseVector::indices`].
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Whether `index` is a stored entry.
    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }
}

/// A coordinate vector, dense or sparse.
#[derive(Clone, Debug, PartialEq)]
pub enum Vector {
    /// Every coordinate stored.
    Dense(Vec<f64>),
    /// Only non-zero coordinates stored.
    Sparse(SparseVector),
}

impl From<Vec<f64>> for Vector {
    fn from(values: Vec<f64>) -> Self {
        Vector::Dense(values)
    }
}

impl From<SparseVector> for Vector {
    fn from(v: SparseVector) -> Self {
        Vector::Sparse(v)
    }
}

impl Vector {
    /// All-zero dense vector.
    pub fn zeros(dim: usize) -> Self {
        Vector::Dense(vec![0.0; dim])
    }

    /// Dimension (not the number of stored entries).
    pub fn len(&self) -> usize {
        match self {
            Vector::Dense(v) => v.len(),
            Vector::Sparse(s) => s.dim,
        }
    }

    /// True for a zero-dimensional vector.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for the sparse representation.
    pub fn is_sparse(&self) -> bool {
        matches!(self, Vector::Sparse(_))
    }

    /// Iterate over stored `(index, value)` pairs.
    pub fn iter_stored(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (dense, sparse) = match self {
            Vector::Dense(v) => (Some(v.iter().copied().enumerate()), None),
            Vector::Sparse(s) => (
                None,
                Some(s.indices.iter().copied().zip(s.values.iter().copied())),
            ),
        };
        dense
            .into_iter()
            .flatten()
            .chain(sparse.into_iter().flatten())
    }

    /// Inner product. Dimensions are assumed equal.
    pub fn dot(&self, other: &Vector) -> f64 {
        debug_assert_eq!(self.len(), other.len());
        match (self, other) {
            (Vector::Dense(a), Vector::Dense(b)) => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
            (Vector::Sparse(s), Vector::Dense(d)) | (Vector::Dense(d), Vector::Sparse(s)) => s
                .indices
                .iter()
                .zip(s.values.iter())
                .map(|(&i, v)| v * d[i])
                .sum(),
            (Vector::Sparse(a), Vector::Sparse(b)) => {
                let (mut i, mut j) = (0, 0);
                let mut acc = 0.0;
                while i < a.indices.len() && j < b.indices.len() {
                    match a.indices[i].cmp(&b.indices[j]) {
                        std::cmp::Ordering::Less => i += 1,
                        std::cmp::Ordering::Greater => j += 1,
                        std::cmp::Ordering::Equal => {
                            acc += a.values[i] * b.values[j];
                            i += 1;
                            j += 1;
                        }
                    }
                }
                acc
            }
        }
    }

    /// Apply `f` to every stored value, keeping the representation.
    pub fn map_stored(&self, f: impl Fn(f64) -> f64) -> Vector {
        match self {
            Vector::Dense(v) => Vector::Dense(v.iter().map(|&x| f(x)).collect()),
            Vector::Sparse(s) => Vector::Sparse(SparseVector {
                dim: s.dim,
                indices: s.indices.clone(),
                values: s.values.iter().map(|&x| f(x)).collect(),
            }),
        }
    }

    /// Multiply every coordinate by `factor`.
    pub fn scaled(&self, factor: f64) -> Vector {
        self.map_stored(|x| x * factor)
    }

    /// Sum of all coordinates.
    pub fn sum(&self) -> f64 {
        match self {
            Vector::Dense(v) => v.iter().sum(),
            Vector::Sparse(s) => s.values.iter().sum(),
        }
    }

    /// Dense copy of the coordinates.
    pub fn to_dense(&self) -> Vec<f64> {
        match self {
            Vector::Dense(v) => v.clone(),
            Vector::Sparse(s) => {
                let mut out = vec![0.0; s.dim];
                for (&i, &v) in s.indices.iter().zip(s.values.iter()) {
                    out[i] = v;
                }
                out
            }
        }
    }

    /// `target += factor * self`.
    pub fn add_scaled_to(&self, target: &mut [f64], factor: f64) {
        debug_assert_eq!(self.len(), target.len());
        match self {
            Vector::Dense(v) => {
                for (t, x) in target.iter_mut().zip(v.iter()) {
                    *t += factor * x;
                }
            }
            Vector::Sparse(s) => {
                for (&i, &x) in s.indices.iter().zip(s.values.iter()) {
                    target[i] += factor * x;
                }
            }
        }
    }

    /// Sum of this vector's non-zero values at indices that `support` does not store.
    ///
    /// A dense `support` stores every index, so the result is then `0.0`.
    pub fn sum_outside_support(&self, support: &Vector) -> f64 {
        let Vector::Sparse(support) = support else {
            return 0.0;
        };
        self.iter_stored()
            .filter(|&(i, v)| v != 0.0 && !support.contains(i))
            .map(|(_, v)| v)
            .sum()
    }

    /// Sparse copy holding only the non-zero coordinates.
    pub fn to_nonzero_sparse(&self) -> Vector {
        let (indices, values): (Vec<usize>, Vec<f64>) =
            self.iter_stored().filter(|&(_, v)| v != 0.0).unzip();
        Vector::Sparse(SparseVector::from_sorted(self.len(), indices, values))
    }
}

/// A vector with a non-negative weight, stored in homogeneous coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedVector {
    homogeneous: Vector,
    weight: f64,
}

impl WeightedVector {
    /// Wrap coordinates that are already multiplied by `weight`.
    pub fn from_homogeneous(homogeneous: Vector, weight: f64) -> Self {
        Self {
            homogeneous,
            weight,
        }
    }

    /// Wrap observed coordinates, scaling them by `weight`.
    pub fn from_inhomogeneous(coordinates: Vector, weight: f64) -> Self {
        let homogeneous = if weight == 1.0 {
            coordinates
        } else {
            coordinates.scaled(weight)
        };
        Self {
            homogeneous,
            weight,
        }
    }

    /// Unit-weight vector.
    pub fn unit(coordinates: Vector) -> Self {
        Self::from_inhomogeneous(coordinates, 1.0)
    }

    /// The weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Coordinates multiplied by the weight.
    pub fn homogeneous(&self) -> &Vector {
        &self.homogeneous
    }

    /// Coordinates divided by the weight (the mean).
    ///
    /// A (near) zero weight has no mean; the stored coordinates are returned unchanged.
    pub fn inhomogeneous(&self) -> Vector {
        if self.weight <= DEGENERATE_WEIGHT || self.weight == 1.0 {
            self.homogeneous.clone()
        } else {
            self.homogeneous.scaled(1.0 / self.weight)
        }
    }

    /// Dimension of the coordinates.
    pub fn dim(&self) -> usize {
        self.homogeneous.len()
    }

    /// Split into homogeneous coordinates and weight.
    pub fn into_parts(self) -> (Vector, f64) {
        (self.homogeneous, self.weight)
    }
}
