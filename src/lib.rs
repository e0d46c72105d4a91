//! Arrayops compares sequential and distributed execution of elementwise array arithmetic.
//!
//! A run is launched on a fixed set of processing elements (PEs), PE 0 being the coordinator.
//! PE 0 generates the input, times the sequential computation, then distributes the input
//! in contiguous blocks; every PE computes its block and the per operation timings are
//! reduced (maximum) back to PE 0, which prints the report.
//!
//! PEs only interact through collective operations, which every PE must call in the same
//! order:
//! - [Pe::scatter] - PE `k` receives indices `[k * local, (k + 1) * local)` of the root's buffer
//! - [Pe::gather] - the root reassembles every block in original index order
//! - [Pe::reduce]/[Pe::reduce_slice] - combine values on the root with a [ReduceOp]
//! - [Pe::barrier] - full rendezvous
//!
//! Any error on any PE aborts the whole run; there is no partial result.
//!
//! # Environment Variables
//! - `ARRAY_SIZE` - total element count (must be divisible by the number of PEs)
//! - `ARRAYOPS_NUM_PES` - number of PEs, default: available parallelism
//! - `ARRAYOPS_ITERATIONS` - benchmark repetitions, default: 100
//! - `ARRAYOPS_SEED` - explicit base seed, default: wall clock seconds
//! - `ARRAYOPS_VERIFY` - gather and compare the distributed results every iteration
//! - `ARRAYOPS_DEADLOCK_TIMEOUT` - seconds before a blocked PE warns, default: 600.0
//! - `ARRAYOPS_PIN_THREADS` - pin PE threads to cores
//!
//! # Example
//!```no_run
//! use arrayops::*;
//!
//! let world = WorldBuilder::new().with_num_pes(4).build()?;
//! let settings = BenchSettings::new(1_000_000).with_iterations(10);
//! let reports = world.launch(|pe| run_ops_benchmark(pe, &settings))?;
//! if let Some(report) = &reports[0] {
//!     print!("{}", report);
//! }
//! # Ok::<(), BenchError>(())
//!```

#[doc(hidden)]
pub extern crate tracing;

mod barrier;
pub mod bench;
mod bench_env;
pub mod comm;
pub mod env_var;
pub mod error;
pub mod generator;
pub mod ops;
pub mod partition;
pub mod report;
pub mod world;

pub use crate::bench::{
    distribute_ops, run_ops_benchmark, run_ops_once, run_sum, BenchSettings, DistributedOutcome,
    ROOT,
};
pub use crate::bench_env::BenchEnv;
pub use crate::comm::{Pe, ReduceOp, Reducible};
pub use crate::env_var::{config, Config};
pub use crate::error::{BenchError, BenchResult, CommStatus};
pub use crate::generator::{InputPair, ValueRange};
pub use crate::ops::{array_ops, array_ops_timed, Op, OpTimes, ResultSet};
pub use crate::partition::BlockedPartition;
pub use crate::report::{OpsReport, ResultRow, SingleRunReport, Speedup, SumReport};
pub use crate::world::{World, WorldBuilder};

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber used by the binaries. `RUST_LOG` overrides the default `warn` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init();
}
