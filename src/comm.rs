use crate::barrier::Barrier;
use crate::bench_env::BenchEnv;
use crate::error::{try_to_vec, BenchError, BenchResult, CommStatus};
use crate::partition::BlockedPartition;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::*;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Combining function of a reduction. Integer sums wrap on overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
    Min,
}

/// Element types that can be combined by [Pe::reduce] and [Pe::reduce_slice].
pub trait Reducible: Copy + Send + 'static {
    fn combine(self, other: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_reducible_int {
    ($($t:ty),*) => {
        $(
            impl Reducible for $t {
                fn combine(self, other: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => self.wrapping_add(other),
                        ReduceOp::Max => std::cmp::max(self, other),
                        ReduceOp::Min => std::cmp::min(self, other),
                    }
                }
            }
        )*
    };
}

macro_rules! impl_reducible_float {
    ($($t:ty),*) => {
        $(
            impl Reducible for $t {
                fn combine(self, other: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => self + other,
                        ReduceOp::Max => self.max(other),
                        ReduceOp::Min => self.min(other),
                    }
                }
            }
        )*
    };
}

impl_reducible_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);
impl_reducible_float!(f32, f64);

struct Envelope {
    seq: u64,
    src: usize,
    payload: Box<dyn Any + Send>,
}

/// State shared by every PE of one run: mailboxes, the barrier and the abort flag.
pub(crate) struct CommRT {
    num_pes: usize,
    senders: Vec<Sender<Envelope>>,
    receivers: Vec<Receiver<Envelope>>,
    barrier: Barrier,
    aborted: AtomicBool,
    abort_code: AtomicI32,
    first_error: Mutex<Option<BenchError>>,
    deadlock_timeout: Duration,
}

impl CommRT {
    pub(crate) fn new(num_pes: usize, deadlock_timeout: Duration) -> CommRT {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..num_pes).map(|_| unbounded()).unzip();
        CommRT {
            num_pes,
            senders,
            receivers,
            barrier: Barrier::new(num_pes, deadlock_timeout),
            aborted: AtomicBool::new(false),
            abort_code: AtomicI32::new(0),
            first_error: Mutex::new(None),
            deadlock_timeout,
        }
    }

    /// Abort the whole run. The first non-secondary error is the one reported.
    pub(crate) fn abort(&self, pe: usize, err: BenchError) {
        let code = {
            let mut first = self.first_error.lock();
            if first.is_none() {
                if err.is_secondary() {
                    trace!("[{:?}] leaving run after abort: {}", pe, err);
                } else {
                    error!("[{:?}] aborting run: {}", pe, err);
                }
                *first = Some(err);
            } else if !err.is_secondary() && first.as_ref().map_or(false, |e| e.is_secondary()) {
                *first = Some(err);
            }
            first.as_ref().map_or(1, |e| e.exit_code())
        };
        if !self.aborted.swap(true, Ordering::SeqCst) {
            self.abort_code.store(code, Ordering::SeqCst);
        }
        self.barrier.abort(code);
    }

    fn abort_code(&self) -> Option<i32> {
        if self.aborted.load(Ordering::SeqCst) {
            Some(self.abort_code.load(Ordering::SeqCst))
        } else {
            None
        }
    }

    pub(crate) fn take_error(&self) -> Option<BenchError> {
        self.first_error.lock().take()
    }
}

/// A processing element: one worker of a run, owning its private buffers.
///
/// All collectives must be called by every PE of the run in the same order.
pub struct Pe {
    my_pe: usize,
    rt: Arc<CommRT>,
    seq: Cell<u64>,
    parked: RefCell<Vec<Envelope>>,
}

impl BenchEnv for Pe {
    fn my_pe(&self) -> usize {
        self.my_pe
    }

    fn num_pes(&self) -> usize {
        self.rt.num_pes
    }
}

impl Pe {
    pub(crate) fn new(my_pe: usize, rt: Arc<CommRT>) -> Pe {
        assert!(my_pe < rt.num_pes, "invalid pe: {:?}", my_pe);
        Pe {
            my_pe,
            rt,
            seq: Cell::new(0),
            parked: RefCell::new(Vec::new()),
        }
    }

    pub fn is_root(&self) -> bool {
        self.my_pe == 0
    }

    fn next_seq(&self) -> u64 {
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        seq
    }

    fn fail(&self, op: &'static str, status: CommStatus) -> BenchError {
        BenchError::Collective {
            pe: self.my_pe,
            op,
            status,
        }
    }

    fn send(
        &self,
        dest: usize,
        seq: u64,
        payload: Box<dyn Any + Send>,
        op: &'static str,
    ) -> BenchResult<()> {
        if let Some(code) = self.rt.abort_code() {
            return Err(self.fail(op, CommStatus::Aborted(code)));
        }
        self.rt.senders[dest]
            .send(Envelope {
                seq,
                src: self.my_pe,
                payload,
            })
            .map_err(|_| self.fail(op, CommStatus::Disconnected))
    }

    fn take_parked(&self, seq: u64, src: Option<usize>) -> Option<Envelope> {
        let mut parked = self.parked.borrow_mut();
        let pos = parked
            .iter()
            .position(|env| env.seq == seq && src.map_or(true, |src| env.src == src))?;
        Some(parked.swap_remove(pos))
    }

    /// Receive the message of collective `seq`, from `src` or from any PE.
    /// Messages of later collectives that arrive first are parked.
    fn recv(&self, seq: u64, src: Option<usize>, op: &'static str) -> BenchResult<Envelope> {
        if let Some(env) = self.take_parked(seq, src) {
            return Ok(env);
        }
        let mailbox = &self.rt.receivers[self.my_pe];
        let mut s = Instant::now();
        loop {
            if let Some(code) = self.rt.abort_code() {
                return Err(self.fail(op, CommStatus::Aborted(code)));
            }
            match mailbox.recv_timeout(POLL_INTERVAL) {
                Ok(env) => {
                    if env.seq == seq && src.map_or(true, |src| env.src == src) {
                        return Ok(env);
                    }
                    trace!(
                        "[{:?}] parking message seq {:?} from {:?} while waiting on {:?}",
                        self.my_pe,
                        env.seq,
                        env.src,
                        seq
                    );
                    self.parked.borrow_mut().push(env);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if s.elapsed() >= self.rt.deadlock_timeout {
                        warn!(
                            "[{:?}] Potential deadlock detected in {}: still waiting for message {:?} from {:?}. \
                            The deadlock timeout can be set via the ARRAYOPS_DEADLOCK_TIMEOUT environment variable, \
                            the current timeout is {} seconds",
                            self.my_pe,
                            op,
                            seq,
                            src,
                            self.rt.deadlock_timeout.as_secs_f64()
                        );
                        s = Instant::now();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(self.fail(op, CommStatus::Disconnected));
                }
            }
        }
    }

    fn unpack<T: 'static>(&self, env: Envelope, op: &'static str) -> BenchResult<Vec<T>> {
        env.payload
            .downcast::<Vec<T>>()
            .map(|b| *b)
            .map_err(|_| self.fail(op, CommStatus::TypeMismatch))
    }

    /// Full rendezvous of every PE.
    #[tracing::instrument(skip_all)]
    pub fn barrier(&self) -> BenchResult<()> {
        trace!("[{:?}] barrier", self.my_pe);
        self.rt
            .barrier
            .wait(self.my_pe)
            .map_err(|status| self.fail("barrier", status))
    }

    /// Distribute `send` (only read on `root`) so that PE `k` receives
    /// `send[partition.range(k)]`.
    #[tracing::instrument(skip_all)]
    pub fn scatter<T>(
        &self,
        root: usize,
        send: Option<&[T]>,
        partition: &BlockedPartition,
    ) -> BenchResult<Vec<T>>
    where
        T: Clone + Send + 'static,
    {
        const OP: &str = "scatter";
        assert!(root < self.num_pes(), "invalid root pe: {:?}", root);
        assert_eq!(partition.num_pes(), self.num_pes());
        let seq = self.next_seq();

        if self.my_pe == root {
            let send = send.unwrap_or(&[]);
            if send.len() != partition.total_len() {
                return Err(self.fail(
                    OP,
                    CommStatus::LengthMismatch {
                        expected: partition.total_len(),
                        found: send.len(),
                    },
                ));
            }
            let mut mine = None;
            for (pe, range) in partition.iter() {
                let chunk = try_to_vec(&send[range], self.my_pe)?;
                if pe == root {
                    mine = Some(chunk);
                } else {
                    self.send(pe, seq, Box::new(chunk), OP)?;
                }
            }
            debug!(
                "[{:?}] scattered {:?} elements in chunks of {:?}",
                self.my_pe,
                partition.total_len(),
                partition.local_len()
            );
            Ok(mine.unwrap_or_default())
        } else {
            let env = self.recv(seq, Some(root), OP)?;
            let chunk = self.unpack::<T>(env, OP)?;
            if chunk.len() != partition.local_len() {
                return Err(self.fail(
                    OP,
                    CommStatus::LengthMismatch {
                        expected: partition.local_len(),
                        found: chunk.len(),
                    },
                ));
            }
            Ok(chunk)
        }
    }

    /// Collect every PE's `local` block on `root`, in original index order.
    /// Returns `Some` on `root` only.
    #[tracing::instrument(skip_all)]
    pub fn gather<T>(
        &self,
        root: usize,
        local: &[T],
        partition: &BlockedPartition,
    ) -> BenchResult<Option<Vec<T>>>
    where
        T: Clone + Send + 'static,
    {
        const OP: &str = "gather";
        assert!(root < self.num_pes(), "invalid root pe: {:?}", root);
        assert_eq!(partition.num_pes(), self.num_pes());
        let seq = self.next_seq();

        if local.len() != partition.local_len() {
            return Err(self.fail(
                OP,
                CommStatus::LengthMismatch {
                    expected: partition.local_len(),
                    found: local.len(),
                },
            ));
        }

        if self.my_pe != root {
            self.send(root, seq, Box::new(try_to_vec(local, self.my_pe)?), OP)?;
            return Ok(None);
        }

        let mut blocks: Vec<Option<Vec<T>>> = (0..self.num_pes()).map(|_| None).collect();
        for _ in 1..self.num_pes() {
            let env = self.recv(seq, None, OP)?;
            let src = env.src;
            let block = self.unpack::<T>(env, OP)?;
            if block.len() != partition.local_len() {
                return Err(self.fail(
                    OP,
                    CommStatus::LengthMismatch {
                        expected: partition.local_len(),
                        found: block.len(),
                    },
                ));
            }
            blocks[src] = Some(block);
        }

        let mut out = Vec::new();
        out.try_reserve_exact(partition.total_len())
            .map_err(|_| BenchError::Alloc {
                pe: self.my_pe,
                elems: partition.total_len(),
            })?;
        for (pe, block) in blocks.into_iter().enumerate() {
            match block {
                Some(block) => out.extend(block),
                None if pe == root => out.extend_from_slice(local),
                None => return Err(self.fail(OP, CommStatus::Disconnected)),
            }
        }
        Ok(Some(out))
    }

    /// Elementwise reduction of every PE's `local` values onto `root`, combined in PE order.
    #[tracing::instrument(skip_all)]
    pub fn reduce_slice<T: Reducible>(
        &self,
        root: usize,
        local: &[T],
        op: ReduceOp,
    ) -> BenchResult<Option<Vec<T>>> {
        const OP: &str = "reduce";
        assert!(root < self.num_pes(), "invalid root pe: {:?}", root);
        let seq = self.next_seq();

        if self.my_pe != root {
            self.send(root, seq, Box::new(try_to_vec(local, self.my_pe)?), OP)?;
            return Ok(None);
        }

        let mut contributions: Vec<Option<Vec<T>>> = (0..self.num_pes()).map(|_| None).collect();
        for _ in 1..self.num_pes() {
            let env = self.recv(seq, None, OP)?;
            let src = env.src;
            let vals = self.unpack::<T>(env, OP)?;
            if vals.len() != local.len() {
                return Err(self.fail(
                    OP,
                    CommStatus::LengthMismatch {
                        expected: local.len(),
                        found: vals.len(),
                    },
                ));
            }
            contributions[src] = Some(vals);
        }
        contributions[root] = Some(try_to_vec(local, self.my_pe)?);

        let mut contributions = contributions.into_iter().flatten();
        let mut acc = contributions.next().unwrap_or_default();
        for vals in contributions {
            for (a, v) in acc.iter_mut().zip(vals) {
                *a = a.combine(v, op);
            }
        }
        Ok(Some(acc))
    }

    /// Reduce a single value onto `root`.
    pub fn reduce<T: Reducible>(&self, root: usize, value: T, op: ReduceOp) -> BenchResult<Option<T>> {
        Ok(self
            .reduce_slice(root, &[value], op)?
            .and_then(|vals| vals.into_iter().next()))
    }
}
