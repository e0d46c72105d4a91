//! One sequential and one distributed run of add/sub/mul/div, results gathered back to PE 0.
//!
//! ARRAY_SIZE=1000000 ARRAYOPS_NUM_PES=4 cargo run --release --bin array_ops

use anyhow::Context;
use arrayops::env_var::{self, DEFAULT_RUN_SIZE};
use arrayops::{run_ops_once, BenchError, BenchSettings, WorldBuilder};
use std::io::Write;

fn run() -> anyhow::Result<()> {
    let config = arrayops::config()?;
    let array_size = env_var::array_size(DEFAULT_RUN_SIZE)?;
    let world = WorldBuilder::from_config(config).build()?;
    let settings = BenchSettings::from_config(config, array_size);

    let reports = world.launch(|pe| run_ops_once(pe, &settings))?;
    if let Some(Some(report)) = reports.first() {
        let mut out = std::io::stdout().lock();
        write!(out, "{}", report).context("failed to write report")?;
    }
    Ok(())
}

fn main() {
    arrayops::init_logging();
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        let code = err.downcast_ref::<BenchError>().map_or(1, |e| e.exit_code());
        std::process::exit(code);
    }
}
