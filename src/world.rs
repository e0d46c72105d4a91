use crate::bench_env::BenchEnv;
use crate::comm::{CommRT, Pe};
use crate::env_var::{deadlock_timeout, Config};
use crate::error::{BenchError, BenchResult};

use std::sync::Arc;
use std::time::Duration;
use tracing::*;

/// The set of PEs a run is launched on.
///
/// Each call to [World::launch] starts `num_pes` fresh worker threads that only share
/// the collective primitives exposed through [Pe].
#[derive(Debug, Clone)]
pub struct World {
    num_pes: usize,
    deadlock_timeout: Duration,
    pin_threads: bool,
}

impl BenchEnv for World {
    /// The world itself always acts from the launching (coordinating) side
    fn my_pe(&self) -> usize {
        0
    }

    fn num_pes(&self) -> usize {
        self.num_pes
    }
}

/// Aborts the run if the owning PE thread unwinds.
struct AbortOnPanic<'a> {
    my_pe: usize,
    rt: &'a CommRT,
}

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.rt
                .abort(self.my_pe, BenchError::PePanicked { pe: self.my_pe });
        }
    }
}

impl World {
    /// Run `f` on every PE and collect the per PE results in PE order.
    ///
    /// The first error any PE returns (or a PE panicking) aborts every other PE; the
    /// originating error is the one returned.
    #[tracing::instrument(skip_all)]
    pub fn launch<F, T>(&self, f: F) -> BenchResult<Vec<T>>
    where
        F: Fn(&Pe) -> BenchResult<T> + Sync,
        T: Send,
    {
        let rt = Arc::new(CommRT::new(self.num_pes, self.deadlock_timeout));
        let cores = if self.pin_threads {
            core_affinity::get_core_ids().filter(|ids| !ids.is_empty())
        } else {
            None
        };
        debug!(
            "launching {:?} pes (pinned: {:?})",
            self.num_pes,
            cores.is_some()
        );

        let results: Vec<Option<T>> = std::thread::scope(|s| {
            let mut handles = Vec::with_capacity(self.num_pes);
            for my_pe in 0..self.num_pes {
                let pe_rt = rt.clone();
                let f = &f;
                let core = cores.as_ref().map(|ids| ids[my_pe % ids.len()]);
                let spawned = std::thread::Builder::new()
                    .name(format!("pe-{}", my_pe))
                    .spawn_scoped(s, move || {
                        if let Some(core) = core {
                            core_affinity::set_for_current(core);
                        }
                        let _guard = AbortOnPanic {
                            my_pe,
                            rt: pe_rt.as_ref(),
                        };
                        trace!("[{:?}] pe thread running", my_pe);
                        let pe = Pe::new(my_pe, pe_rt.clone());
                        match f(&pe) {
                            Ok(val) => Some(val),
                            Err(err) => {
                                pe_rt.abort(my_pe, err);
                                None
                            }
                        }
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        rt.abort(
                            my_pe,
                            BenchError::Spawn {
                                pe: my_pe,
                                reason: e.to_string(),
                            },
                        );
                        break;
                    }
                }
            }
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(None))
                .collect()
        });

        if let Some(err) = rt.take_error() {
            return Err(err);
        }
        Ok(results.into_iter().flatten().collect())
    }
}

#[derive(Debug, Clone)]
pub struct WorldBuilder {
    num_pes: usize,
    deadlock_timeout: f64,
    pin_threads: bool,
}

impl Default for WorldBuilder {
    fn default() -> Self {
        WorldBuilder::new()
    }
}

impl WorldBuilder {
    pub fn new() -> WorldBuilder {
        WorldBuilder {
            num_pes: match std::thread::available_parallelism() {
                Ok(n) => n.into(),
                Err(_) => 4,
            },
            deadlock_timeout: 600.0,
            pin_threads: false,
        }
    }

    pub fn from_config(config: &Config) -> WorldBuilder {
        WorldBuilder {
            num_pes: config.num_pes,
            deadlock_timeout: config.deadlock_timeout,
            pin_threads: config.pin_threads,
        }
    }

    pub fn with_num_pes(mut self, num_pes: usize) -> WorldBuilder {
        self.num_pes = num_pes;
        self
    }

    /// Seconds before a blocked PE warns about a potential deadlock.
    pub fn with_deadlock_timeout(mut self, secs: f64) -> WorldBuilder {
        self.deadlock_timeout = secs;
        self
    }

    pub fn with_pinned_threads(mut self, pin: bool) -> WorldBuilder {
        self.pin_threads = pin;
        self
    }

    pub fn build(self) -> BenchResult<World> {
        if self.num_pes == 0 {
            return Err(BenchError::Config(
                "number of processes must be at least 1".to_owned(),
            ));
        }
        Ok(World {
            num_pes: self.num_pes,
            deadlock_timeout: deadlock_timeout(self.deadlock_timeout)?,
            pin_threads: self.pin_threads,
        })
    }
}
