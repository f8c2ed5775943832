//! K-means clustering under Bregman divergences.
//!
//! `bregman-kmeans` runs Lloyd's iteration with any Bregman divergence
//! (squared Euclidean, KL and its variants, logistic loss, Itakura-Saito) on
//! dense or sparse weighted vectors.
//!
//! - [`divergence`]: convex generators and their gradients.
//! - [`ops`]: points and centers with cached statistics, and the distance
//!   between them.
//! - [`centroid`]: weighted-mean accumulators.
//! - [`cluster`]: multi-run Lloyd's iteration engines.
//! - [`init`]: random, K-Means++ and K-Means‖ seeding.
//! - [`Kmeans`]: the whole pipeline behind one builder.
//!
//! ```rust
//! use bregman_kmeans::{DivergenceKind, Kmeans};
//!
//! let data = vec![
//!     vec![0.7, 0.2, 0.1],
//!     vec![0.6, 0.3, 0.1],
//!     vec![0.1, 0.2, 0.7],
//!     vec![0.1, 0.3, 0.6],
//! ];
//! let model = Kmeans::new(2)
//!     .with_divergence(DivergenceKind::KullbackLeibler)
//!     .with_seed(42)
//!     .fit(&data)
//!     .unwrap();
//! assert!(model.n_clusters() <= 2);
//! ```

#![forbid(unsafe_code)]

pub mod centroid;
pub mod cluster;
pub mod divergence;
pub mod error;
pub mod init;
pub mod model;
pub mod ops;
pub mod vector;

pub use centroid::{Centroid, CentroidKind};
pub use cluster::{
    best_run, Budget, ClustererKind, Clustering, ColumnTrackingKMeans, MultiKMeansClusterer,
    RunOutcome, RunStatus, SimpleKMeans, TrackingKMeans,
};
pub use divergence::{BregmanDivergence, DivergenceKind, LogPolicy};
pub use error::{Error, Result};
pub use init::{Initializer, InitializerKind, KMeansParallel, KMeansPlusPlus, RandomInit};
pub use model::{KMeansModel, Kmeans, KmeansConfig};
pub use ops::{BregmanCenter, BregmanPoint, PointOps, Smoothing};
pub use vector::{SparseVector, Vector, WeightedVector};
