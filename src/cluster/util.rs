use rand::prelude::*;
use rayon::prelude::*;

/// Points per data partition.
///
/// Partitions are the unit of parallel work, and partial results are always
/// combined in partition order, so results do not depend on thread scheduling.
pub(crate) const PARTITION_SIZE: usize = 512;

/// Sum `f` over `items`, partition by partition.
pub(crate) fn partitioned_sum<T: Sync>(items: &[T], f: impl Fn(&T) -> f64 + Sync) -> f64 {
    items
        .par_chunks(PARTITION_SIZE)
        .map(|part| part.iter().map(&f).sum::<f64>())
        .collect::<Vec<f64>>()
        .into_iter()
        .sum()
}

/// Seeded RNG, or one seeded from the thread RNG when no seed is given.
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::seed_from_u64(rand::rng().random()),
    }
}

/// Seeds for `count` independent child generators, drawn from `master`.
///
/// Parallel sections give each unit of work (a run, or a run's share of one
/// partition) its own generator, so draws do not depend on scheduling.
pub(crate) fn child_seeds(master: &mut StdRng, count: usize) -> Vec<u64> {
    (0..count).map(|_| master.random()).collect()
}

/// `count` child generators seeded from `master`.
pub(crate) fn child_rngs(master: &mut StdRng, count: usize) -> Vec<StdRng> {
    child_seeds(master, count)
        .into_iter()
        .map(StdRng::seed_from_u64)
        .collect()
}
