//! The benchmark drivers: sequential reference on PE 0, then the same work distributed
//! over every PE with scatter, local compute, reduce (and optionally gather).

use crate::bench_env::BenchEnv;
use crate::comm::{Pe, ReduceOp};
use crate::env_var::Config;
use crate::error::{try_alloc, BenchError, BenchResult};
use crate::generator::{base_seed, fill_counts, InputPair, ValueRange};
use crate::ops::{array_ops_timed, sum_counts, OpTimes, ResultSet};
use crate::partition::BlockedPartition;
use crate::report::{OpsReport, ResultRow, SingleRunReport, SumReport};

use std::time::Instant;
use tracing::*;

/// The coordinating PE.
pub const ROOT: usize = 0;

/// Rows of the gathered result kept for the single run report.
const REPORT_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct BenchSettings {
    pub array_size: usize,
    pub iterations: usize,
    pub base_seed: u64,
    pub verify: bool,
    pub range: ValueRange,
}

impl BenchSettings {
    pub fn new(array_size: usize) -> BenchSettings {
        BenchSettings {
            array_size,
            iterations: 1,
            base_seed: base_seed(None),
            verify: false,
            range: ValueRange::default(),
        }
    }

    pub fn from_config(config: &Config, array_size: usize) -> BenchSettings {
        BenchSettings {
            array_size,
            iterations: config.iterations,
            base_seed: base_seed(config.seed),
            verify: config.verify,
            range: ValueRange::default(),
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> BenchSettings {
        self.iterations = iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> BenchSettings {
        self.base_seed = seed;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> BenchSettings {
        self.verify = verify;
        self
    }

    pub fn with_range(mut self, range: ValueRange) -> BenchSettings {
        self.range = range;
        self
    }

    fn iteration_seed(&self, iter: usize) -> u64 {
        self.base_seed.wrapping_add(iter as u64)
    }
}

/// What the root learns from one distributed step.
#[derive(Debug, Clone, Default)]
pub struct DistributedOutcome {
    /// Per operation maximum across every PE, root only.
    pub worst: Option<OpTimes>,
    /// The full result in original index order, root only and only when gathering.
    pub gathered: Option<ResultSet>,
}

/// One distributed step: scatter both operands from [ROOT], run the timed operations on the
/// local block, reduce the per operation maximum to [ROOT] and optionally gather the results.
///
/// `input` is only read on [ROOT].
pub fn distribute_ops(
    pe: &Pe,
    input: Option<&InputPair>,
    partition: &BlockedPartition,
    gather: bool,
) -> BenchResult<DistributedOutcome> {
    let local_a = pe.scatter(ROOT, input.map(|pair| &pair.a[..]), partition)?;
    let local_b = pe.scatter(ROOT, input.map(|pair| &pair.b[..]), partition)?;

    let mut local_out = ResultSet::try_new(partition.local_len(), pe.my_pe())?;
    let times = array_ops_timed(&local_a, &local_b, &mut local_out);
    trace!("[{:?}] local times {:?}", pe.my_pe(), times);

    let worst = pe
        .reduce_slice(ROOT, &times.as_array(), ReduceOp::Max)?
        .map(|vals| OpTimes::from_array([vals[0], vals[1], vals[2], vals[3]]));

    let gathered = if gather {
        gather_results(pe, &local_out, partition)?
    } else {
        None
    };
    Ok(DistributedOutcome { worst, gathered })
}

fn gather_results(
    pe: &Pe,
    local: &ResultSet,
    partition: &BlockedPartition,
) -> BenchResult<Option<ResultSet>> {
    let add = pe.gather(ROOT, &local.add, partition)?;
    let sub = pe.gather(ROOT, &local.sub, partition)?;
    let mul = pe.gather(ROOT, &local.mul, partition)?;
    let div = pe.gather(ROOT, &local.div, partition)?;
    Ok(match (add, sub, mul, div) {
        (Some(add), Some(sub), Some(mul), Some(div)) => Some(ResultSet { add, sub, mul, div }),
        _ => None,
    })
}

fn check_iterations(settings: &BenchSettings) -> BenchResult<()> {
    if settings.iterations == 0 {
        return Err(BenchError::Config(
            "iteration count must be at least 1".to_owned(),
        ));
    }
    Ok(())
}

/// The full four operation benchmark, averaged over `settings.iterations` runs.
///
/// Every PE must call this; the report is returned on [ROOT] only.
#[tracing::instrument(skip_all)]
pub fn run_ops_benchmark(pe: &Pe, settings: &BenchSettings) -> BenchResult<Option<OpsReport>> {
    let partition = BlockedPartition::new(settings.array_size, pe.num_pes())?;
    check_iterations(settings)?;
    let n = settings.array_size;

    // warm-up fill, as the input buffers are touched for the first time here
    let mut input = if pe.is_root() {
        Some(InputPair::generate(
            n,
            settings.base_seed,
            settings.range,
            ROOT,
        )?)
    } else {
        None
    };

    let mut sequential = OpTimes::default();
    let mut parallel = OpTimes::default();
    let mut wall = 0.0;
    let mut mismatches = 0;

    for iter in 0..settings.iterations {
        let mut expected = None;
        if let Some(input) = input.as_mut() {
            input.refill(settings.iteration_seed(iter), settings.range);
            let mut seq_out = ResultSet::try_new(n, ROOT)?;
            sequential += array_ops_timed(&input.a, &input.b, &mut seq_out);
            expected = Some(seq_out);
        }

        pe.barrier()?;
        let start = Instant::now();
        let outcome = distribute_ops(pe, input.as_ref(), &partition, settings.verify)?;
        pe.barrier()?;
        let elapsed = start.elapsed().as_secs_f64();

        if let Some(worst) = outcome.worst {
            parallel += worst;
            wall += elapsed;
        }
        if let (Some(expected), Some(got)) = (expected.as_ref(), outcome.gathered.as_ref()) {
            mismatches += expected.mismatches(got);
        }
        trace!("[{:?}] iteration {:?} done", pe.my_pe(), iter);
    }

    if !pe.is_root() {
        return Ok(None);
    }
    let scale = 1.0 / settings.iterations as f64;
    debug!(
        "[{:?}] benchmark finished, {:?} mismatching indices",
        pe.my_pe(),
        mismatches
    );
    Ok(Some(OpsReport {
        array_size: n,
        num_pes: pe.num_pes(),
        iterations: settings.iterations,
        sequential: sequential.scale(scale),
        parallel: parallel.scale(scale),
        distributed_wall: wall * scale,
        verified: if settings.verify {
            Some(mismatches == 0)
        } else {
            None
        },
    }))
}

/// A single sequential run and a single distributed run whose results are gathered back.
#[tracing::instrument(skip_all)]
pub fn run_ops_once(pe: &Pe, settings: &BenchSettings) -> BenchResult<Option<SingleRunReport>> {
    let partition = BlockedPartition::new(settings.array_size, pe.num_pes())?;
    let n = settings.array_size;

    let mut sequential = None;
    let mut expected = None;
    let input = if pe.is_root() {
        let input = InputPair::generate(n, settings.base_seed, settings.range, ROOT)?;
        let mut seq_out = ResultSet::try_new(n, ROOT)?;
        sequential = Some(array_ops_timed(&input.a, &input.b, &mut seq_out));
        expected = Some(seq_out);
        Some(input)
    } else {
        None
    };

    pe.barrier()?;
    let outcome = distribute_ops(pe, input.as_ref(), &partition, true)?;
    pe.barrier()?;

    match (sequential, outcome.worst, outcome.gathered, expected) {
        (Some(sequential), Some(parallel), Some(gathered), Some(expected)) => {
            let first_rows = (0..n.min(REPORT_ROWS))
                .map(|i| ResultRow {
                    index: i,
                    add: gathered.add[i],
                    sub: gathered.sub[i],
                    mul: gathered.mul[i],
                    div: gathered.div[i],
                })
                .collect();
            Ok(Some(SingleRunReport {
                array_size: n,
                num_pes: pe.num_pes(),
                sequential,
                parallel,
                first_rows,
                verified: expected.mismatches(&gathered) == 0,
            }))
        }
        _ => Ok(None),
    }
}

/// Sum reduction: sequential sum on [ROOT], then scatter, local sums and a sum reduce,
/// timed on [ROOT] between barriers.
#[tracing::instrument(skip_all)]
pub fn run_sum(pe: &Pe, settings: &BenchSettings) -> BenchResult<Option<SumReport>> {
    let partition = BlockedPartition::new(settings.array_size, pe.num_pes())?;
    let n = settings.array_size;

    let mut sequential = None;
    let values = if pe.is_root() {
        let mut values: Vec<i32> = try_alloc(n, ROOT)?;
        fill_counts(&mut values, settings.base_seed);
        let start = Instant::now();
        let sum = sum_counts(&values);
        sequential = Some((sum, start.elapsed().as_secs_f64()));
        Some(values)
    } else {
        None
    };

    pe.barrier()?;
    let start = Instant::now();
    let local = pe.scatter(ROOT, values.as_deref(), &partition)?;
    let local_sum = sum_counts(&local);
    let total = pe.reduce(ROOT, local_sum, ReduceOp::Sum)?;
    pe.barrier()?;
    let elapsed = start.elapsed().as_secs_f64();

    match (sequential, total) {
        (Some((sequential_sum, sequential_time)), Some(parallel_sum)) => Ok(Some(SumReport {
            array_size: n,
            num_pes: pe.num_pes(),
            sequential_sum,
            parallel_sum,
            sequential_time,
            parallel_time: elapsed,
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::array_ops;
    use crate::world::WorldBuilder;

    fn world(num_pes: usize) -> crate::world::World {
        WorldBuilder::new()
            .with_num_pes(num_pes)
            .with_deadlock_timeout(30.0)
            .build()
            .unwrap()
    }

    fn root<T>(mut results: Vec<Option<T>>) -> T {
        assert!(results[1..].iter().all(|r| r.is_none()));
        results.swap_remove(0).expect("root produces the report")
    }

    #[test]
    fn distributed_matches_sequential() {
        for (n, pes) in [(8, 2), (12, 3), (64, 4), (60, 5), (16, 1)] {
            for range in [ValueRange::NonZeroInt, ValueRange::Percent] {
                let input = InputPair::generate(n, 1234, range, 0).unwrap();
                let mut expected = ResultSet::try_new(n, 0).unwrap();
                array_ops(&input.a, &input.b, &mut expected);

                let part = BlockedPartition::new(n, pes).unwrap();
                let outcomes = world(pes)
                    .launch(|pe| {
                        let input = if pe.is_root() { Some(&input) } else { None };
                        distribute_ops(pe, input, &part, true)
                    })
                    .unwrap();
                let gathered = outcomes[0].gathered.as_ref().unwrap();
                assert_eq!(expected.mismatches(gathered), 0, "n={} pes={}", n, pes);
                assert!(outcomes[0].worst.is_some());
                assert!(outcomes[1..]
                    .iter()
                    .all(|o| o.worst.is_none() && o.gathered.is_none()));
            }
        }
    }

    #[test]
    fn zero_divisors_gather_as_zero() {
        let input = InputPair {
            a: vec![4.0, 5.0, 6.0, 7.0],
            b: vec![2.0, 0.0, 0.0, 7.0],
        };
        let part = BlockedPartition::new(4, 2).unwrap();
        let outcomes = world(2)
            .launch(|pe| {
                let input = if pe.is_root() { Some(&input) } else { None };
                distribute_ops(pe, input, &part, true)
            })
            .unwrap();
        let gathered = outcomes[0].gathered.as_ref().unwrap();
        assert_eq!(gathered.div, vec![2.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn benchmark_report_with_verification() {
        let settings = BenchSettings::new(48)
            .with_iterations(4)
            .with_seed(99)
            .with_verify(true);
        let report = root(
            world(4)
                .launch(|pe| run_ops_benchmark(pe, &settings))
                .unwrap(),
        );
        assert_eq!(report.array_size, 48);
        assert_eq!(report.num_pes, 4);
        assert_eq!(report.iterations, 4);
        assert_eq!(report.verified, Some(true));
        assert!(report.sequential.as_array().iter().all(|t| *t >= 0.0));
        assert!(report.parallel.as_array().iter().all(|t| *t >= 0.0));
        assert!(report.distributed_wall >= 0.0);
    }

    #[test]
    fn indivisible_size_fails_every_pe() {
        let settings = BenchSettings::new(10).with_iterations(2);
        let err = world(3)
            .launch(|pe| run_ops_benchmark(pe, &settings))
            .unwrap_err();
        assert!(matches!(
            err,
            BenchError::Indivisible {
                array_size: 10,
                num_pes: 3
            }
        ));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn zero_iterations_rejected() {
        let settings = BenchSettings::new(8).with_iterations(0);
        assert!(matches!(
            world(2).launch(|pe| run_ops_benchmark(pe, &settings)),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn empty_arrays_do_not_crash() {
        let settings = BenchSettings::new(0).with_iterations(2).with_verify(true);
        let report = root(
            world(3)
                .launch(|pe| run_ops_benchmark(pe, &settings))
                .unwrap(),
        );
        assert_eq!(report.array_size, 0);
        assert_eq!(report.verified, Some(true));

        let once = root(world(3).launch(|pe| run_ops_once(pe, &settings)).unwrap());
        assert!(once.first_rows.is_empty());
        assert!(once.verified);

        let sum = root(world(3).launch(|pe| run_sum(pe, &settings)).unwrap());
        assert_eq!(sum.sequential_sum, 0);
        assert_eq!(sum.parallel_sum, 0);
    }

    #[test]
    fn single_run_keeps_first_rows() {
        let settings = BenchSettings::new(32).with_seed(5);
        let report = root(world(4).launch(|pe| run_ops_once(pe, &settings)).unwrap());
        assert!(report.verified);
        assert_eq!(report.first_rows.len(), 5);

        let input = InputPair::generate(32, 5, ValueRange::NonZeroInt, 0).unwrap();
        for row in &report.first_rows {
            let i = row.index;
            assert_eq!(row.add, input.a[i] + input.b[i]);
            assert_eq!(row.div, input.a[i] / input.b[i]);
        }
    }

    #[test]
    fn same_seed_same_results() {
        let settings = BenchSettings::new(40).with_seed(777);
        let first = root(world(4).launch(|pe| run_ops_once(pe, &settings)).unwrap());
        let second = root(world(2).launch(|pe| run_ops_once(pe, &settings)).unwrap());
        assert_eq!(first.first_rows, second.first_rows);
    }

    #[test]
    fn sums_agree() {
        let settings = BenchSettings::new(1000).with_seed(3);
        let report = root(world(4).launch(|pe| run_sum(pe, &settings)).unwrap());
        let mut values = vec![0i32; 1000];
        fill_counts(&mut values, 3);
        let expected: i64 = values.iter().map(|&v| v as i64).sum();
        assert_eq!(report.sequential_sum, expected);
        assert_eq!(report.parallel_sum, expected);
        assert_eq!(report.num_pes, 4);
    }
}
