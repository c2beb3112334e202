//! `Dispatcher` — the runnable unit that drains a [`crate::scheduler`]'s
//! fetcher hook: either a single-thread [`blocking::BlockingDispatcher`]
//! run loop, or an N-thread [`pool::ThreadPoolDispatcher`].
//!
//! # State machine
//! `Created → Started → Terminating → Terminated`, per spec.md §4.7.
//! `terminate(mode)` with `mode ∈ {Linger, Annihilate}`: `Linger` drains
//! every already-queued task before stopping; `Annihilate` stops as soon
//! as each worker's in-flight task finishes.

mod blocking;
mod pool;

pub use blocking::{BlockingDispatcher, BlockingDispatcherHandle};
pub use pool::{ThreadPoolDispatcher, ThreadPoolOptions};

use std::borrow::Cow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};

use crate::error::CoreError;
use crate::expect::Expect;
use crate::scheduler::TaskSource;
use std::sync::Arc;

/// How `terminate` should wind a dispatcher down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationMode {
    /// Drain every already-queued task before stopping.
    Linger,
    /// Stop as soon as each worker's current task finishes.
    Annihilate,
}

/// The dispatcher lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatcherState {
    /// Constructed but `start()` has not been called.
    Created,
    /// Actively draining its fetcher.
    Running,
    /// `terminate()` has been called; winding down per its mode.
    Terminating,
    /// All worker threads have exited.
    Terminated,
}

impl DispatcherState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DispatcherState::Created,
            1 => DispatcherState::Running,
            2 => DispatcherState::Terminating,
            _ => DispatcherState::Terminated,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            DispatcherState::Created => 0,
            DispatcherState::Running => 1,
            DispatcherState::Terminating => 2,
            DispatcherState::Terminated => 3,
        }
    }
}

/// Construction-time options shared by both dispatcher flavours.
#[derive(Clone, Debug)]
pub struct DispatcherOptions {
    /// Diagnostic name, surfaced in logs.
    pub name: Cow<'static, str>,
    /// The mode used if `terminate()` is called without an explicit
    /// override — `Linger` unless set otherwise.
    pub default_termination: TerminationMode,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        DispatcherOptions {
            name: Cow::Borrowed("dispatcher"),
            default_termination: TerminationMode::Linger,
        }
    }
}

impl DispatcherOptions {
    /// Options with just a name set.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        DispatcherOptions {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A uniform, object-safe handle onto either dispatcher flavour, used by a
/// [`crate::queue::Queue`] to wake a parked worker immediately after a
/// push, and by [`crate::context::ExecutionContext`] to carry termination
/// control without committing to a concrete dispatcher type.
pub trait Dispatcher: Send + Sync + crate::sealed::Sealed {
    /// Wake a parked worker so it re-checks its fetcher immediately.
    fn notify(&self);
    /// Begin winding the dispatcher down in the given mode.
    fn terminate(&self, mode: TerminationMode);
    /// Block until every worker has exited.
    fn await_termination(&self) -> Expect<()>;
    /// Current lifecycle state.
    fn state(&self) -> DispatcherState;
}

/// State shared between a dispatcher handle and its worker thread(s).
pub(crate) struct DispatcherCore {
    name: Cow<'static, str>,
    fetcher: Arc<dyn TaskSource>,
    state: AtomicU8,
    wake: Mutex<()>,
    condvar: Condvar,
    mode: Mutex<TerminationMode>,
    first_error: Mutex<Option<CoreError>>,
}

impl DispatcherCore {
    fn new(fetcher: Arc<dyn TaskSource>, options: &DispatcherOptions) -> Self {
        DispatcherCore {
            name: options.name.clone(),
            fetcher,
            state: AtomicU8::new(DispatcherState::Created.as_u8()),
            wake: Mutex::new(()),
            condvar: Condvar::new(),
            mode: Mutex::new(options.default_termination),
            first_error: Mutex::new(None),
        }
    }

    fn state(&self) -> DispatcherState {
        DispatcherState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: DispatcherState) {
        self.state.store(state.as_u8(), Ordering::Release);
        let _guard = self.wake.lock().unwrap();
        self.condvar.notify_all();
    }

    /// Transition `Created`/`Running` -> `Terminating` and record the mode.
    fn begin_terminate(&self, mode: TerminationMode) {
        *self.mode.lock().unwrap() = mode;
        if self.state() != DispatcherState::Terminated {
            self.set_state(DispatcherState::Terminating);
        }
    }

    fn record_error(&self, error: CoreError) {
        let mut slot = self.first_error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// Wake any worker sleeping in the condvar, e.g. because a task was
    /// just pushed to one of the scheduler's queues.
    pub fn notify(&self) {
        let _guard = self.wake.lock().unwrap();
        self.condvar.notify_all();
    }
}

/// Runs the shared worker loop body until this worker decides to exit,
/// returning `true` if this invocation was the one that observed the
/// queues fully drained (used by the pool to decide who flips the final
/// `Terminated` state).
pub(crate) fn run_worker_loop(core: &DispatcherCore) {
    loop {
        let now = crate::time::MonotonicTimePoint::now();
        match core.fetcher.next_task(now) {
            Some(task) => {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| task.run()));
                if let Err(_payload) = result {
                    crate::observability::log_error!(
                        "tether_rt::dispatcher",
                        "{} a dispatched task panicked",
                        core.name
                    );
                    core.record_error(CoreError::domain(
                        "dispatcher.worker_panicked",
                        "a dispatched task panicked",
                    ));
                }
            }
            None => {
                if core.state() == DispatcherState::Terminating {
                    let mode = *core.mode.lock().unwrap();
                    if mode == TerminationMode::Annihilate {
                        return;
                    }
                    // Linger: stop only once nothing is left to drain,
                    // including future timed tasks already enqueued.
                    if core.fetcher.next_wakeup(now).is_none() {
                        return;
                    }
                }
                park_until_next_wakeup(core, now);
            }
        }
    }
}

fn park_until_next_wakeup(core: &DispatcherCore, now: crate::time::MonotonicTimePoint) {
    let guard = core.wake.lock().unwrap();
    match core.fetcher.next_wakeup(now) {
        Some(deadline) => {
            let wait = deadline.saturating_duration_since(now);
            let _ = core.condvar.wait_timeout(guard, wait).unwrap();
        }
        None => {
            // Bounded wait even with nothing scheduled, so a `terminate()`
            // racing with this park is always observed promptly.
            let _ = core
                .condvar
                .wait_timeout(guard, std::time::Duration::from_millis(50))
                .unwrap();
        }
    }
}

/// Blocks until `core`'s state is `Terminated`, returning the first
/// recorded worker error, if any.
pub(crate) fn await_termination(core: &DispatcherCore) -> Expect<()> {
    let mut guard = core.wake.lock().unwrap();
    while core.state() != DispatcherState::Terminated {
        guard = core.condvar.wait(guard).unwrap();
    }
    drop(guard);
    match core.first_error.lock().unwrap().take() {
        Some(err) => Expect::refuse(err),
        None => Expect::fulfill(()),
    }
}
