//! Running cluster sums.
//!
//! Each worker owns its accumulators and folds its partition of points into
//! them; partial accumulators are then combined with [`Centroid::merge`].
//! For dense accumulators both operations are exact sums, so the combined
//! result does not depend on how the points were partitioned or in which
//! order partials are merged (up to floating-point rounding).

use crate::ops::BregmanPoint;
use crate::vector::{SparseVector, Vector, WeightedVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which accumulator a [`crate::ops::PointOps`] hands out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CentroidKind {
    /// One slot per dimension.
    #[default]
    Dense,
    /// Only touched dimensions are stored. When more than twice `max_entries`
    /// dimensions are held, all but the `max_entries` largest are dropped.
    Sparse {
        /// Entries kept after a prune.
        max_entries: usize,
    },
}

impl CentroidKind {
    /// A fresh, empty accumulator.
    pub fn make(self) -> Centroid {
        match self {
            CentroidKind::Dense => Centroid::Dense(DenseCentroid::default()),
            CentroidKind::Sparse { max_entries } => Centroid::Sparse(SparseCentroid {
                max_entries: max_entries.max(1),
                ..SparseCentroid::default()
            }),
        }
    }
}

/// Homogeneous sum and total weight of the points assigned to one cluster.
#[derive(Clone, Debug)]
pub enum Centroid {
    /// Dense running sum.
    Dense(DenseCentroid),
    /// Sparse running sum with pruning.
    Sparse(SparseCentroid),
}

/// Dense running sum. The sum vector is sized on first use.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DenseCentroid {
    sum: Vec<f64>,
    weight: f64,
}

/// Sparse running sum.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseCentroid {
    dim: usize,
    sum: BTreeMap<usize, f64>,
    weight: f64,
    max_entries: usize,
}

impl DenseCentroid {
    fn add_scaled(&mut self, v: &Vector, factor: f64) {
        if self.sum.is_empty() {
            self.sum = vec![0.0; v.len()];
        }
        v.add_scaled_to(&mut self.sum, factor);
    }

    fn merge(&mut self, other: &DenseCentroid) {
        if other.weight == 0.0 && other.sum.is_empty() {
            return;
        }
        if self.sum.is_empty() {
            self.sum = vec![0.0; other.sum.len()];
        }
        for (a, b) in self.sum.iter_mut().zip(other.sum.iter()) {
            *a += b;
        }
        self.weight += other.weight;
    }
}

impl SparseCentroid {
    fn add_scaled(&mut self, v: &Vector, factor: f64) {
        self.dim = self.dim.max(v.len());
        for (i, x) in v.iter_stored() {
            if x != 0.0 {
                *self.sum.entry(i).or_insert(0.0) += factor * x;
            }
        }
        self.prune();
    }

    fn merge(&mut self, other: &SparseCentroid) {
        self.dim = self.dim.max(other.dim);
        for (&i, &x) in &other.sum {
            *self.sum.entry(i).or_insert(0.0) += x;
        }
        self.weight += other.weight;
        self.prune();
    }

    fn prune(&mut self) {
        if self.sum.len() <= self.max_entries.saturating_mul(2) {
            return;
        }
        let keep = self.max_entries;
        if keep == 0 {
            self.sum.clear();
            return;
        }
        let mut magnitudes: Vec<f64> = self.sum.values().map(|v| v.abs()).collect();
        // Partition so the `keep` largest magnitudes come first.
        magnitudes.select_nth_unstable_by(keep - 1, |a, b| b.total_cmp(a));
        let cutoff = magnitudes[keep - 1];
        let above = magnitudes.iter().filter(|&&m| m > cutoff).count();

        // Entries tied at the cutoff fill the remaining slots in index order.
        let mut ties = keep - above;
        self.sum.retain(|_, v| {
            let m = v.abs();
            if m > cutoff {
                true
            } else if m == cutoff && ties > 0 {
                ties -= 1;
                true
            } else {
                false
            }
        });
    }
}

impl Centroid {
    /// Add a point's homogeneous coordinates and weight. Non-positive weights are ignored.
    pub fn add(&mut self, point: &BregmanPoint) {
        let w = point.weight();
        if w <= 0.0 {
            return;
        }
        match self {
            Centroid::Dense(c) => {
                c.add_scaled(point.coords(), w);
                c.weight += w;
            }
            Centroid::Sparse(c) => {
                c.add_scaled(point.coords(), w);
                c.weight += w;
            }
        }
    }

    /// Fold another accumulator into this one.
    pub fn merge(&mut self, other: &Centroid) {
        match (self, other) {
            (Centroid::Dense(a), Centroid::Dense(b)) => a.merge(b),
            (Centroid::Sparse(a), Centroid::Sparse(b)) => a.merge(b),
            (Centroid::Dense(a), Centroid::Sparse(b)) => {
                let wv = b.to_vector();
                a.add_scaled(&wv, 1.0);
                a.weight += b.weight;
            }
            (Centroid::Sparse(a), Centroid::Dense(b)) => {
                if !b.sum.is_empty() {
                    a.add_scaled(&Vector::Dense(b.sum.clone()), 1.0);
                }
                a.weight += b.weight;
            }
        }
    }

    /// Total accumulated weight.
    pub fn weight(&self) -> f64 {
        match self {
            Centroid::Dense(c) => c.weight,
            Centroid::Sparse(c) => c.weight,
        }
    }

    /// True when nothing with positive weight has been added.
    pub fn is_empty(&self) -> bool {
        self.weight() <= 0.0
    }

    /// The accumulated sum as a homogeneous weighted vector.
    pub fn to_weighted_vector(&self) -> WeightedVector {
        match self {
            Centroid::Dense(c) => {
                WeightedVector::from_homogeneous(Vector::Dense(c.sum.clone()), c.weight)
            }
            Centroid::Sparse(c) => WeightedVector::from_homogeneous(c.to_vector(), c.weight),
        }
    }
}

impl SparseCentroid {
    fn to_vector(&self) -> Vector {
        let indices: Vec<usize> = self.sum.keys().copied().collect();
        let values: Vec<f64> = self.sum.values().copied().collect();
        Vector::Sparse(SparseVector::from_sorted(self.dim, indices, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::divergence::DivergenceKind;
    use crate::ops::PointOps;

    fn point(ops: &PointOps, coords: Vec<f64>, w: f64) -> BregmanPoint {
        ops.vector_to_point(coords.into(), w)
    }

    #[test]
    fn add_accumulates_homogeneous_sum() {
        let ops = PointOps::new(DivergenceKind::SquaredEuclidean);
        let mut c = CentroidKind::Dense.make();
        c.add(&point(&ops, vec![1.0, 2.0], 2.0));
        c.add(&point(&ops, vec![3.0, 0.0], 1.0));
        let wv = c.to_weighted_vector();
        assert_eq!(wv.weight(), 3.0);
        assert_eq!(wv.homogeneous().to_dense(), vec![5.0, 4.0]);
    }

    #[test]
    fn zero_weight_is_ignored() {
        let ops = PointOps::new(DivergenceKind::SquaredEuclidean);
        let mut c = CentroidKind::Dense.make();
        c.add(&point(&ops, vec![1.0, 2.0], 0.0));
        assert!(c.is_empty());
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let ops = PointOps::new(DivergenceKind::SquaredEuclidean);
        let mut a = CentroidKind::Dense.make();
        a.add(&point(&ops, vec![1.0, 1.0], 1.0));
        let before = a.to_weighted_vector();
        a.merge(&CentroidKind::Dense.make());
        assert_eq!(a.to_weighted_vector(), before);

        let mut empty = CentroidKind::Dense.make();
        empty.merge(&a);
        assert_eq!(empty.to_weighted_vector(), before);
    }

    #[test]
    fn sparse_prunes_small_entries() {
        let ops = PointOps::new(DivergenceKind::SquaredEuclidean);
        let mut c = CentroidKind::Sparse { max_entries: 2 }.make();
        let v = SparseVector::from_pairs(10, vec![(0, 5.0), (1, 4.0), (2, 0.1), (3, 0.2), (4, 0.3)])
            .unwrap();
        c.add(&ops.vector_to_point(Vector::Sparse(v), 1.0));

        let wv = c.to_weighted_vector();
        let Vector::Sparse(s) = wv.homogeneous() else {
            panic!("expected sparse sum");
        };
        assert_eq!(s.indices(), &[0, 1]);
        assert_eq!(s.dim(), 10);
        assert_eq!(wv.weight(), 1.0);
    }

    #[test]
    fn sparse_and_dense_agree_without_pruning() {
        let ops = PointOps::new(DivergenceKind::SquaredEuclidean);
        let mut dense = CentroidKind::Dense.make();
        let mut sparse = CentroidKind::Sparse { max_entries: 100 }.make();
        for (coords, w) in [(vec![1.0, 0.0, 2.0], 1.0), (vec![0.0, 3.0, 1.0], 0.5)] {
            let p = point(&ops, coords, w);
            dense.add(&p);
            sparse.add(&p);
        }
        assert_eq!(
            dense.to_weighted_vector().homogeneous().to_dense(),
            sparse.to_weighted_vector().homogeneous().to_dense()
        );
    }
}
