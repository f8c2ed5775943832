use bregman_kmeans::cluster::{
    Budget, ColumnTrackingKMeans, MultiKMeansClusterer, RunOutcome, RunStatus, SimpleKMeans,
    TrackingKMeans,
};
use bregman_kmeans::init::{Initializer, KMeansParallel, RandomInit};
use bregman_kmeans::{
    BregmanPoint, CentroidKind, Clustering, DivergenceKind, InitializerKind, Kmeans, KmeansConfig,
    PointOps, Smoothing, SparseVector, WeightedVector,
};
use proptest::prelude::*;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::time::Duration;

fn to_points(ops: &PointOps, rows: &[Vec<f64>]) -> Vec<BregmanPoint> {
    rows.iter()
        .map(|r| ops.vector_to_point(r.clone().into(), 1.0))
        .collect()
}

fn engines() -> Vec<Box<dyn MultiKMeansClusterer>> {
    let budget = Budget::iterations(50);
    vec![
        Box::new(SimpleKMeans::new(budget)),
        Box::new(TrackingKMeans::new(budget)),
        Box::new(ColumnTrackingKMeans::new(budget)),
    ]
}

fn assert_same(reference: &[RunOutcome], other: &[RunOutcome], name: &str) {
    assert_eq!(reference.len(), other.len(), "{name}: run count");
    for (r, (a, b)) in reference.iter().zip(other.iter()).enumerate() {
        assert_eq!(a.centers, b.centers, "{name}: centers of run {r}");
        assert_eq!(a.distortion.to_bits(), b.distortion.to_bits(), "{name}: distortion of run {r}");
        assert_eq!(a.iterations, b.iterations, "{name}: iterations of run {r}");
        assert_eq!(a.status, b.status, "{name}: status of run {r}");
    }
}

fn blobs(means: &[[f64; 2]], per_blob: usize, sigma: f64, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, sigma).unwrap();
    means
        .iter()
        .flat_map(|m| {
            (0..per_blob)
                .map(|_| vec![m[0] + noise.sample(&mut rng), m[1] + noise.sample(&mut rng)])
                .collect::<Vec<_>>()
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_variants_match_simple(
        rows in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 2), 1..60),
        k in 1usize..6,
        runs in 1usize..4,
        seed in any::<u64>(),
    ) {
        let ops = PointOps::default();
        let points = to_points(&ops, &rows);
        let initial = RandomInit.init(&ops, &points, k, runs, seed).unwrap();

        let outcomes: Vec<Vec<RunOutcome>> = engines()
            .iter()
            .map(|e| e.cluster(&ops, &points, initial.clone()).unwrap())
            .collect();
        assert_same(&outcomes[0], &outcomes[1], "tracking");
        assert_same(&outcomes[0], &outcomes[2], "column-tracking");
    }

    #[test]
    fn prop_variants_match_simple_under_kl(
        rows in prop::collection::vec(prop::collection::vec(0.05f64..5.0, 3), 1..40),
        k in 1usize..5,
        seed in any::<u64>(),
    ) {
        let ops = PointOps::new(DivergenceKind::KullbackLeibler);
        let points = to_points(&ops, &rows);
        let initial = RandomInit.init(&ops, &points, k, 2, seed).unwrap();

        let outcomes: Vec<Vec<RunOutcome>> = engines()
            .iter()
            .map(|e| e.cluster(&ops, &points, initial.clone()).unwrap())
            .collect();
        assert_same(&outcomes[0], &outcomes[1], "tracking");
        assert_same(&outcomes[0], &outcomes[2], "column-tracking");
    }

    #[test]
    fn prop_variants_match_simple_under_sparse_kl(
        rows in prop::collection::vec(
            prop::collection::vec((0usize..6, 0.1f64..5.0), 1..5),
            1..40,
        ),
        k in 1usize..5,
        seed in any::<u64>(),
    ) {
        // Two kept entries per center, so accumulators prune.
        let ops = PointOps::sparse_kl(2);
        let points: Vec<BregmanPoint> = rows
            .iter()
            .map(|pairs| {
                let v = SparseVector::from_pairs(6, pairs.iter().copied()).unwrap();
                ops.vector_to_point(v.into(), 1.0)
            })
            .collect();
        let initial = RandomInit.init(&ops, &points, k, 2, seed).unwrap();

        let outcomes: Vec<Vec<RunOutcome>> = engines()
            .iter()
            .map(|e| e.cluster(&ops, &points, initial.clone()).unwrap())
            .collect();
        for run in &outcomes[0] {
            prop_assert!(run.distortion.is_finite());
        }
        assert_same(&outcomes[0], &outcomes[1], "tracking");
        assert_same(&outcomes[0], &outcomes[2], "column-tracking");
    }

    #[test]
    fn prop_variants_match_simple_under_discrete_kl(
        rows in prop::collection::vec(prop::collection::vec(1u32..20, 4), 1..40),
        k in 1usize..5,
        seed in any::<u64>(),
    ) {
        let ops = PointOps::discrete_kl();
        let rows: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| r.iter().map(|&c| f64::from(c)).collect())
            .collect();
        let points = to_points(&ops, &rows);
        let initial = RandomInit.init(&ops, &points, k, 2, seed).unwrap();

        let outcomes: Vec<Vec<RunOutcome>> = engines()
            .iter()
            .map(|e| e.cluster(&ops, &points, initial.clone()).unwrap())
            .collect();
        assert_same(&outcomes[0], &outcomes[1], "tracking");
        assert_same(&outcomes[0], &outcomes[2], "column-tracking");
    }

    #[test]
    fn prop_distance_is_non_negative(
        x in prop::collection::vec(0.01f64..0.99, 4),
        y in prop::collection::vec(0.01f64..0.99, 4),
        w in 0.1f64..10.0,
    ) {
        for kind in [
            DivergenceKind::SquaredEuclidean,
            DivergenceKind::KullbackLeibler,
            DivergenceKind::SimplexKullbackLeibler,
            DivergenceKind::GeneralizedI,
            DivergenceKind::LogisticLoss,
            DivergenceKind::ItakuraSaito,
            DivergenceKind::SymmetrizedKullbackLeibler,
        ] {
            let ops = PointOps::new(kind);
            let p = ops.vector_to_point(x.clone().into(), 1.0);
            let c = ops.point_to_center(&ops.vector_to_point(y.clone().into(), w));
            let d = ops.distance(&p, &c);
            prop_assert!(d >= 0.0, "{:?}: {}", kind, d);
            prop_assert!(ops.distance(&p, &ops.point_to_center(&p)) < 1e-9);
        }
    }

    #[test]
    fn prop_degenerate_weights(
        x in prop::collection::vec(-5.0f64..5.0, 3),
        y in prop::collection::vec(-5.0f64..5.0, 3),
        tiny in 0.0f64..1e-9,
    ) {
        let ops = PointOps::default();
        let p = ops.vector_to_point(x.clone().into(), 1.0);
        let light_center = ops.to_center(&WeightedVector::from_homogeneous(y.clone().into(), tiny));
        prop_assert_eq!(ops.distance(&p, &light_center), f64::INFINITY);

        let light_point = ops.vector_to_point(x.into(), tiny);
        let c = ops.point_to_center(&ops.vector_to_point(y.into(), 1.0));
        prop_assert_eq!(ops.distance(&light_point, &c), 0.0);
    }

    #[test]
    fn prop_merge_commutes_and_associates(
        a in prop::collection::vec((prop::collection::vec(-10.0f64..10.0, 3), 0.1f64..5.0), 0..10),
        b in prop::collection::vec((prop::collection::vec(-10.0f64..10.0, 3), 0.1f64..5.0), 0..10),
        c in prop::collection::vec((prop::collection::vec(-10.0f64..10.0, 3), 0.1f64..5.0), 1..10),
    ) {
        let ops = PointOps::default();
        let acc = |pts: &[(Vec<f64>, f64)]| {
            let mut sum = ops.make_centroid();
            for (x, w) in pts {
                sum.add(&ops.vector_to_point(x.clone().into(), *w));
            }
            sum
        };
        let (sa, sb, sc) = (acc(&a), acc(&b), acc(&c));

        let mut ab = sa.clone();
        ab.merge(&sb);
        let mut ba = sb.clone();
        ba.merge(&sa);
        prop_assert_eq!(ab.to_weighted_vector(), ba.to_weighted_vector());

        let mut left = ab.clone();
        left.merge(&sc);
        let mut bc = sb.clone();
        bc.merge(&sc);
        let mut right = sa.clone();
        right.merge(&bc);
        let (l, r) = (left.to_weighted_vector(), right.to_weighted_vector());
        prop_assert!((l.weight() - r.weight()).abs() < 1e-9);
        for (x, y) in l.homogeneous().to_dense().iter().zip(r.homogeneous().to_dense()) {
            prop_assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn prop_kmeans_all_assigned(
        data in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 2), 1..20),
        k in 1usize..5,
    ) {
        let model = Kmeans::new(k).with_seed(42).fit(&data).unwrap();
        let labels = model.predict(&data).unwrap();
        prop_assert_eq!(labels.len(), data.len());
        prop_assert!(model.n_clusters() <= k);
        for &l in &labels {
            prop_assert!(l < model.n_clusters());
        }
    }
}

#[test]
fn variants_match_across_partitions() {
    let rows = blobs(&[[0.0, 0.0], [4.0, 1.0], [1.0, 5.0], [6.0, 6.0]], 400, 1.5, 8);
    let ops = PointOps::default();
    let points = to_points(&ops, &rows);
    let initial = RandomInit.init(&ops, &points, 6, 3, 21).unwrap();

    let outcomes: Vec<Vec<RunOutcome>> = engines()
        .iter()
        .map(|e| e.cluster(&ops, &points, initial.clone()).unwrap())
        .collect();
    assert_same(&outcomes[0], &outcomes[1], "tracking");
    assert_same(&outcomes[0], &outcomes[2], "column-tracking");
}

#[test]
fn surplus_clusters_shrink_to_the_natural_count() {
    let rows: Vec<Vec<f64>> = (0..40)
        .map(|i| if i < 20 { vec![0.0, 0.0] } else { vec![10.0, 10.0] })
        .collect();
    let ops = PointOps::default();
    let points = to_points(&ops, &rows);
    let center = |x: f64, y: f64| ops.point_to_center(&ops.vector_to_point(vec![x, y].into(), 1.0));
    let initial = vec![vec![
        center(0.0, 0.0),
        center(10.0, 10.0),
        center(100.0, 100.0),
        center(-50.0, 80.0),
        center(60.0, -70.0),
    ]];

    for engine in engines() {
        let out = engine.cluster(&ops, &points, initial.clone()).unwrap();
        assert_eq!(out[0].centers.len(), 2, "{}", engine.name());
        assert_eq!(out[0].distortion, 0.0);
        assert_eq!(out[0].status, RunStatus::Converged);
    }

    let model = Kmeans::new(5)
        .with_initializer(InitializerKind::KMeansPlusPlus)
        .with_seed(5)
        .fit(&rows)
        .unwrap();
    assert_eq!(model.n_clusters(), 2);
}

#[test]
fn kmeans_parallel_recovers_three_blobs() {
    let means = [[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]];
    let rows = blobs(&means, 100, 0.5, 2024);
    let ops = PointOps::default();
    let points = to_points(&ops, &rows);

    let seeded = KMeansParallel::new().init(&ops, &points, 3, 1, 77).unwrap();
    assert_eq!(seeded[0].len(), 3);
    let random = RandomInit.init(&ops, &points, 3, 20, 77).unwrap();

    let out = SimpleKMeans::default()
        .cluster(&ops, &points, seeded.clone())
        .unwrap();
    let centers: Vec<Vec<f64>> = out[0]
        .centers
        .iter()
        .map(|c| c.inhomogeneous().to_dense())
        .collect();
    for m in means {
        let nearest = centers
            .iter()
            .map(|c| ((c[0] - m[0]).powi(2) + (c[1] - m[1]).powi(2)).sqrt())
            .fold(f64::INFINITY, f64::min);
        assert!(nearest < 0.3, "no center near {m:?}: {centers:?}");
    }
    let seeded_cost = ops.distortion(&seeded[0], &points);
    let random_cost = random
        .iter()
        .map(|centers| ops.distortion(centers, &points))
        .sum::<f64>()
        / random.len() as f64;
    assert!(
        seeded_cost < 0.5 * random_cost,
        "seeded {seeded_cost} vs random mean {random_cost}"
    );
    assert!(
        seeded_cost <= 1.5 * out[0].distortion,
        "seeded {seeded_cost} vs refined {}",
        out[0].distortion
    );
}

#[test]
fn kmeans_parallel_ignores_zero_weight_points() {
    let ops = PointOps::default();
    let mut points = to_points(&ops, &blobs(&[[0.0, 0.0], [50.0, 0.0]], 100, 0.5, 13));
    points.extend((0..800).map(|i| ops.vector_to_point(vec![1000.0 + i as f64, 0.0].into(), 0.0)));

    for seed in 0..20 {
        let seeded = KMeansParallel::new().init(&ops, &points, 2, 1, seed).unwrap();
        let centers: Vec<Vec<f64>> = seeded[0]
            .iter()
            .map(|c| c.inhomogeneous().to_dense())
            .collect();
        assert_eq!(centers.len(), 2, "seed {seed}: {centers:?}");
        for m in [0.0, 50.0] {
            assert!(
                centers.iter().any(|c| (c[0] - m).abs() < 1.0 && c[1].abs() < 1.0),
                "seed {seed}: no center near {m}: {centers:?}"
            );
        }
        assert!(ops.distortion(&seeded[0], &points).is_finite());
    }

    let rows: Vec<Vec<f64>> = points.iter().map(|p| p.coords().to_dense()).collect();
    let weights: Vec<f64> = points.iter().map(|p| p.weight()).collect();
    let model = Kmeans::new(2)
        .with_seed(3)
        .fit_weighted(&rows, Some(&weights))
        .unwrap();
    assert_eq!(model.n_clusters(), 2);
    assert!(model.distortion().is_finite());
}

#[test]
fn zero_time_limit_exhausts_without_iterating() {
    let rows = blobs(&[[0.0, 0.0], [8.0, 8.0]], 50, 1.0, 3);
    let ops = PointOps::default();
    let points = to_points(&ops, &rows);
    let initial = RandomInit.init(&ops, &points, 2, 3, 9).unwrap();
    let budget = Budget {
        max_iterations: 30,
        time_limit: Some(Duration::ZERO),
    };
    let limited: Vec<Box<dyn MultiKMeansClusterer>> = vec![
        Box::new(SimpleKMeans::new(budget)),
        Box::new(TrackingKMeans::new(budget)),
        Box::new(ColumnTrackingKMeans::new(budget)),
    ];

    for engine in limited {
        let out = engine.cluster(&ops, &points, initial.clone()).unwrap();
        assert_eq!(out.len(), 3, "{}", engine.name());
        for run in &out {
            assert_eq!(run.status, RunStatus::Exhausted, "{}", engine.name());
            assert!(!run.centers.is_empty(), "{}", engine.name());
            assert!(run.distortion.is_finite(), "{}", engine.name());
        }
    }
}

#[test]
fn sparse_kl_builder_handles_dense_rows_with_zeros() {
    let rows = vec![
        vec![1.0, 0.0, 0.0],
        vec![0.9, 0.1, 0.0],
        vec![0.0, 0.0, 1.0],
        vec![0.0, 0.1, 0.9],
    ];
    let model = Kmeans::new(2)
        .with_point_ops(PointOps::sparse_kl(8))
        .with_seed(17)
        .fit(&rows)
        .unwrap();
    assert!(model.distortion().is_finite());
    assert_eq!(model.n_clusters(), 2);
    let labels = model.predict(&rows).unwrap();
    assert_eq!(labels[0], labels[1]);
    assert_eq!(labels[2], labels[3]);
    assert_ne!(labels[0], labels[2]);
}

#[test]
fn config_parses_from_json() {
    let json = r#"{
        "k": 4,
        "runs": 3,
        "seed": 11,
        "divergence": "kullback-leibler",
        "initializer": "k-means-plus-plus",
        "clusterer": "simple"
    }"#;
    let config: KmeansConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.k, 4);
    assert_eq!(config.runs, 3);
    assert_eq!(config.seed, Some(11));
    assert_eq!(config.divergence, DivergenceKind::KullbackLeibler);
    assert_eq!(config.initializer, InitializerKind::KMeansPlusPlus);
    assert_eq!(config.max_iterations, KmeansConfig::default().max_iterations);

    let km = Kmeans::from_config(config);
    assert_eq!(km.n_clusters(), 4);

    let back: KmeansConfig = serde_json::from_str(&serde_json::to_string(km.config()).unwrap()).unwrap();
    assert_eq!(&back, km.config());
}

#[test]
fn point_ops_config_survives_json() {
    let km = Kmeans::new(3).with_point_ops(PointOps::sparse_kl(8));
    assert_eq!(km.config().divergence, DivergenceKind::KullbackLeibler);
    assert_eq!(km.config().centroid, CentroidKind::Sparse { max_entries: 8 });
    assert_eq!(km.config().smoothing, Smoothing::SparsePenalty);

    let json = serde_json::to_string(km.config()).unwrap();
    let back: KmeansConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(&back, km.config());

    let rows = vec![vec![1.0, 0.0], vec![0.9, 0.0], vec![0.0, 1.0], vec![0.0, 0.9]];
    let a = km.clone().with_seed(1).fit(&rows).unwrap();
    let b = Kmeans::from_config(back).with_seed(1).fit(&rows).unwrap();
    assert_eq!(a.centers(), b.centers());
}
