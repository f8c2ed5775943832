//! Lloyd's iteration under Bregman divergences.
//!
//! ## The objective
//!
//! Given weighted points `xᵢ` and a divergence `D`, k-means minimizes the
//! distortion
//!
//! ```text
//! J = Σ_k Σ_{i ∈ C_k} wᵢ D(xᵢ, μ_k)
//! ```
//!
//! For any Bregman divergence the minimizing `μ_k` is the weighted mean of
//! the cluster, so the classic assign / recompute loop carries over as is.
//!
//! ## Runs
//!
//! The engines refine several independent center sets ("runs") in one pass
//! over the data, typically started from different seeds; the caller keeps the
//! run with the lowest distortion ([`best_run`]). A run may end with fewer
//! clusters than it started with: clusters that attract no weight are dropped,
//! never padded.
//!
//! ## Variants
//!
//! - [`SimpleKMeans`]: full reassignment every iteration.
//! - [`TrackingKMeans`]: caches each point's assignment and only checks
//!   centers that changed.
//! - [`ColumnTrackingKMeans`]: the same pruning, with per-run columns processed
//!   as separate parallel jobs.
//!
//! All three return the same centers and distortion for the same input.
//!
//! ## Usage
//!
//! ```rust
//! use bregman_kmeans::cluster::{MultiKMeansClusterer, SimpleKMeans};
//! use bregman_kmeans::PointOps;
//!
//! let ops = PointOps::default();
//! let points: Vec<_> = [[0.0, 0.0], [0.2, 0.0], [9.0, 9.0], [9.2, 9.0]]
//!     .iter()
//!     .map(|c| ops.vector_to_point(c.to_vec().into(), 1.0))
//!     .collect();
//! let seeds = vec![vec![ops.point_to_center(&points[0]), ops.point_to_center(&points[2])]];
//!
//! let runs = SimpleKMeans::default().cluster(&ops, &points, seeds).unwrap();
//! assert_eq!(runs[0].centers.len(), 2);
//! ```

mod column;
mod lloyd;
mod simple;
mod tracking;
mod traits;
pub(crate) mod util;

pub use column::ColumnTrackingKMeans;
pub use lloyd::{best_run, Budget, RunOutcome, RunStatus};
pub use simple::SimpleKMeans;
pub use tracking::TrackingKMeans;
pub use traits::{ClustererKind, Clustering, MultiKMeansClusterer};
