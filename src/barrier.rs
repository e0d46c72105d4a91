use crate::error::CommStatus;

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::*;

struct BarrierState {
    arrived: usize,
    generation: usize,
    aborted: Option<i32>,
}

/// Full rendezvous across every PE of a run.
///
/// A PE returns from [Barrier::wait] only once all `num_pes` PEs have entered the same
/// generation, or with [CommStatus::Aborted] once any PE aborts the run.
pub(crate) struct Barrier {
    num_pes: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
    deadlock_timeout: Duration,
}

impl Barrier {
    pub(crate) fn new(num_pes: usize, deadlock_timeout: Duration) -> Barrier {
        Barrier {
            num_pes,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: None,
            }),
            cvar: Condvar::new(),
            deadlock_timeout,
        }
    }

    pub(crate) fn wait(&self, my_pe: usize) -> Result<(), CommStatus> {
        let mut state = self.state.lock();
        if let Some(code) = state.aborted {
            return Err(CommStatus::Aborted(code));
        }
        let generation = state.generation;
        state.arrived += 1;
        trace!(
            "[{:?}] barrier {:?} arrived {:?}/{:?}",
            my_pe,
            generation,
            state.arrived,
            self.num_pes
        );
        if state.arrived == self.num_pes {
            state.arrived = 0;
            state.generation = generation.wrapping_add(1);
            self.cvar.notify_all();
            return Ok(());
        }

        let mut s = Instant::now();
        while state.generation == generation {
            if let Some(code) = state.aborted {
                return Err(CommStatus::Aborted(code));
            }
            self.cvar.wait_for(&mut state, self.deadlock_timeout);
            if state.generation == generation
                && state.aborted.is_none()
                && s.elapsed() >= self.deadlock_timeout
            {
                warn!(
                    "[{:?}] Potential deadlock detected: {:?} of {:?} PEs entered barrier {:?}. \
                    Barrier is a collective operation requiring all PEs to enter the barrier call. \
                    The deadlock timeout can be set via the ARRAYOPS_DEADLOCK_TIMEOUT environment variable, \
                    the current timeout is {} seconds",
                    my_pe,
                    state.arrived,
                    self.num_pes,
                    generation,
                    self.deadlock_timeout.as_secs_f64()
                );
                s = Instant::now();
            }
        }
        Ok(())
    }

    /// Release every waiter (current and future) with [CommStatus::Aborted].
    pub(crate) fn abort(&self, code: i32) {
        let mut state = self.state.lock();
        if state.aborted.is_none() {
            state.aborted = Some(code);
        }
        self.cvar.notify_all();
    }
}
