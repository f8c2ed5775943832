//! End-to-end fitting: seed, iterate, keep the best run.

use crate::centroid::CentroidKind;
use crate::cluster::util::make_rng;
use crate::cluster::{best_run, Budget, ClustererKind, Clustering, RunStatus};
use crate::divergence::{DivergenceKind, LogPolicy};
use crate::error::{Error, Result};
use crate::init::InitializerKind;
use crate::ops::{BregmanCenter, BregmanPoint, PointOps, Smoothing};
use crate::vector::Vector;
use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Serializable settings for [`Kmeans`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmeansConfig {
    /// Number of clusters requested.
    pub k: usize,
    /// Independent runs refined together; the best one is kept.
    pub runs: usize,
    /// Iteration cap for Lloyd's iteration.
    pub max_iterations: usize,
    /// Random seed; `None` draws one from the thread RNG.
    pub seed: Option<u64>,
    /// Distance function.
    pub divergence: DivergenceKind,
    /// Logarithm policy; `None` uses the divergence's default.
    pub log: Option<LogPolicy>,
    /// Accumulator kind.
    pub centroid: CentroidKind,
    /// Smoothing policy.
    pub smoothing: Smoothing,
    /// Seeding strategy.
    pub initializer: InitializerKind,
    /// Lloyd's iteration variant.
    pub clusterer: ClustererKind,
}

impl Default for KmeansConfig {
    fn default() -> Self {
        Self {
            k: 2,
            runs: 1,
            max_iterations: Budget::default().max_iterations,
            seed: None,
            divergence: DivergenceKind::default(),
            log: None,
            centroid: CentroidKind::default(),
            smoothing: Smoothing::default(),
            initializer: InitializerKind::default(),
            clusterer: ClustererKind::default(),
        }
    }
}

/// K-means under a Bregman divergence.
///
/// ```rust
/// use bregman_kmeans::{Clustering, Kmeans};
///
/// let data = vec![
///     vec![0.0, 0.0],
///     vec![0.1, 0.1],
///     vec![10.0, 10.0],
///     vec![10.1, 10.1],
/// ];
/// let labels = Kmeans::new(2).with_seed(42).fit_predict(&data).unwrap();
/// assert_eq!(labels[0], labels[1]);
/// assert_ne!(labels[0], labels[2]);
/// ```
#[derive(Clone, Debug)]
pub struct Kmeans {
    config: KmeansConfig,
    ops: PointOps,
}

impl Kmeans {
    /// Squared Euclidean k-means with `k` clusters.
    pub fn new(k: usize) -> Self {
        Self::from_config(KmeansConfig {
            k,
            ..KmeansConfig::default()
        })
    }

    /// Build from a full configuration.
    pub fn from_config(config: KmeansConfig) -> Self {
        let ops = ops_for(&config);
        Self { config, ops }
    }

    /// The current configuration.
    pub fn config(&self) -> &KmeansConfig {
        &self.config
    }

    /// Set the number of independent runs.
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.config.runs = runs;
        self
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iterations = max_iter;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Use one of the built-in divergences, with its default logarithm policy.
    pub fn with_divergence(mut self, divergence: DivergenceKind) -> Self {
        self.config.divergence = divergence;
        self.config.log = None;
        self.ops = ops_for(&self.config);
        self
    }

    /// Use fully configured point operations (sparse centroids, smoothing, ...).
    ///
    /// The configuration records the divergence kind, logarithm policy,
    /// accumulator and smoothing of `ops`. A caller-supplied divergence and
    /// custom thresholds have no configuration form: [`Kmeans::config`] then
    /// keeps its previous divergence kind and only the fitted model reflects them.
    pub fn with_point_ops(mut self, ops: PointOps) -> Self {
        if let Some(kind) = ops.kind() {
            self.config.divergence = kind;
            self.config.log = Some(ops.log());
        }
        self.config.centroid = ops.centroid_kind();
        self.config.smoothing = ops.smoothing();
        self.ops = ops;
        self
    }

    /// Set the seeding strategy.
    pub fn with_initializer(mut self, initializer: InitializerKind) -> Self {
        self.config.initializer = initializer;
        self
    }

    /// Set the Lloyd's iteration variant.
    pub fn with_clusterer(mut self, clusterer: ClustererKind) -> Self {
        self.config.clusterer = clusterer;
        self
    }

    /// Fit on unit-weight dense rows.
    pub fn fit(&self, data: &[Vec<f64>]) -> Result<KMeansModel> {
        self.fit_weighted(data, None)
    }

    /// Fit on dense rows, optionally weighted.
    pub fn fit_weighted(&self, data: &[Vec<f64>], weights: Option<&[f64]>) -> Result<KMeansModel> {
        let dim = check_rows(data)?;
        if let Some(w) = weights {
            if w.len() != data.len() {
                return Err(Error::DimensionMismatch {
                    expected: data.len(),
                    found: w.len(),
                });
            }
            if w.iter().any(|&x| !(x >= 0.0 && x.is_finite())) {
                return Err(Error::InvalidParameter {
                    name: "weights",
                    message: "must be finite and non-negative",
                });
            }
        }
        let points: Vec<BregmanPoint> = data
            .par_iter()
            .enumerate()
            .map(|(i, row)| {
                let w = weights.map_or(1.0, |w| w[i]);
                self.ops.vector_to_point(Vector::Dense(row.clone()), w)
            })
            .collect();
        let mut model = self.fit_points(&points)?;
        model.dim = Some(dim);
        Ok(model)
    }

    /// Fit on points already built with this model's point operations.
    pub fn fit_points(&self, points: &[BregmanPoint]) -> Result<KMeansModel> {
        let KmeansConfig {
            k,
            runs,
            max_iterations,
            seed,
            initializer,
            clusterer,
            ..
        } = self.config;
        if k == 0 {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "must be at least 1",
            });
        }
        if max_iterations == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iterations",
                message: "must be at least 1",
            });
        }

        let seed: u64 = make_rng(seed).random();
        let budget = Budget::iterations(max_iterations);
        let seeder = initializer.build(budget);
        let engine = clusterer.build(budget);

        let initial = seeder.init(&self.ops, points, k, runs, seed)?;
        if initial.len() != runs {
            return Err(Error::InvalidRunCount {
                expected: runs,
                found: initial.len(),
            });
        }
        let outcomes = engine.cluster(&self.ops, points, initial)?;
        let best = best_run(&outcomes).ok_or(Error::EmptyInput)?;

        info!(
            seeder = seeder.name(),
            engine = engine.name(),
            k,
            clusters = best.centers.len(),
            distortion = best.distortion,
            "k-means fit complete"
        );
        Ok(KMeansModel {
            ops: self.ops.clone(),
            centers: best.centers.clone(),
            distortion: best.distortion,
            iterations: best.iterations,
            status: best.status,
            dim: None,
        })
    }
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &[Vec<f64>]) -> Result<Vec<usize>> {
        self.fit(data)?.predict(data)
    }

    fn n_clusters(&self) -> usize {
        self.config.k
    }
}

/// A fitted set of centers with the operations that produced them.
#[derive(Clone, Debug)]
pub struct KMeansModel {
    ops: PointOps,
    centers: Vec<BregmanCenter>,
    distortion: f64,
    iterations: usize,
    status: RunStatus,
    dim: Option<usize>,
}

impl KMeansModel {
    /// Wrap existing centers, e.g. ones returned by an engine directly.
    pub fn new(ops: PointOps, centers: Vec<BregmanCenter>, distortion: f64) -> Self {
        Self {
            ops,
            centers,
            distortion,
            iterations: 0,
            status: RunStatus::Converged,
            dim: None,
        }
    }

    /// The surviving centers. May be fewer than the requested `k`.
    pub fn centers(&self) -> &[BregmanCenter] {
        &self.centers
    }

    /// Center coordinates, one dense row per center.
    pub fn centroids(&self) -> Vec<Vec<f64>> {
        self.centers
            .iter()
            .map(|c| c.inhomogeneous().to_dense())
            .collect()
    }

    /// Number of surviving clusters.
    pub fn n_clusters(&self) -> usize {
        self.centers.len()
    }

    /// Distortion on the training points.
    pub fn distortion(&self) -> f64 {
        self.distortion
    }

    /// Lloyd's iterations the kept run took.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// How the kept run ended.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// The point operations the model was fitted with.
    pub fn ops(&self) -> &PointOps {
        &self.ops
    }

    /// Index of the closest center to a prepared point.
    pub fn predict_point(&self, point: &BregmanPoint) -> Option<usize> {
        self.ops.find_closest(&self.centers, point).map(|(i, _)| i)
    }

    /// Index of the closest center to a raw unit-weight vector.
    pub fn predict_vector(&self, raw: &Vector) -> Result<usize> {
        if let Some(d) = self.dim {
            if raw.len() != d {
                return Err(Error::DimensionMismatch {
                    expected: d,
                    found: raw.len(),
                });
            }
        }
        let point = self.ops.vector_to_point(raw.clone(), 1.0);
        if let Some(center) = self.centers.first() {
            if point.dim() != center.dim() {
                return Err(Error::DimensionMismatch {
                    expected: center.dim(),
                    found: point.dim(),
                });
            }
        }
        self.predict_point(&point).ok_or(Error::InvalidParameter {
            name: "centers",
            message: "model has no centers",
        })
    }

    /// Labels for dense rows.
    pub fn predict(&self, data: &[Vec<f64>]) -> Result<Vec<usize>> {
        data.par_iter()
            .map(|row| self.predict_vector(&Vector::Dense(row.clone())))
            .collect()
    }
}

/// Point operations described by `config`.
fn ops_for(config: &KmeansConfig) -> PointOps {
    let ops = PointOps::new(config.divergence)
        .with_centroid(config.centroid)
        .with_smoothing(config.smoothing);
    match config.log {
        Some(log) => ops.with_log(log),
        None => ops,
    }
}

/// Common row length, or an error for empty or ragged input.
fn check_rows(data: &[Vec<f64>]) -> Result<usize> {
    let first = data.first().ok_or(Error::EmptyInput)?;
    let d = first.len();
    if d == 0 {
        return Err(Error::InvalidParameter {
            name: "data",
            message: "rows must have at least one dimension",
        });
    }
    for row in data {
        if row.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: row.len(),
            });
        }
    }
    Ok(d)
}
