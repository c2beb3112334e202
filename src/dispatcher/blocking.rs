//! Single-thread run-loop dispatcher: the calling thread of `start()` *is*
//! the worker.

use std::sync::Arc;

use super::{await_termination, run_worker_loop, Dispatcher, DispatcherCore, DispatcherOptions, DispatcherState, TerminationMode};
use crate::expect::Expect;
use crate::scheduler::TaskSource;

/// A dispatcher whose `start()` call blocks the caller, running the
/// fetch-run loop directly on that thread until terminated.
pub struct BlockingDispatcher {
    core: Arc<DispatcherCore>,
}

impl BlockingDispatcher {
    /// Build a dispatcher over the given fetcher hook.
    pub fn new(fetcher: Arc<dyn TaskSource>, options: DispatcherOptions) -> Self {
        BlockingDispatcher {
            core: Arc::new(DispatcherCore::new(fetcher, &options)),
        }
    }

    /// A cloneable handle that can call `terminate`/`await_termination`
    /// from a different thread than the one blocked in `start()`.
    pub fn handle(&self) -> BlockingDispatcherHandle {
        BlockingDispatcherHandle {
            core: self.core.clone(),
        }
    }

    /// Enter the run loop on the calling thread. Returns once another
    /// thread (via a [`BlockingDispatcherHandle`]) has called `terminate`
    /// and the resulting drain has completed.
    pub fn start(&self) {
        self.core.set_state(DispatcherState::Running);
        run_worker_loop(&self.core);
        self.core.set_state(DispatcherState::Terminated);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatcherState {
        self.core.state()
    }
}

/// A handle usable from any thread to terminate or await a
/// [`BlockingDispatcher`] whose `start()` is blocking some other thread.
#[derive(Clone)]
pub struct BlockingDispatcherHandle {
    core: Arc<DispatcherCore>,
}

impl BlockingDispatcherHandle {
    /// Request termination in the given mode and wake the run loop.
    pub fn terminate(&self, mode: TerminationMode) {
        self.core.begin_terminate(mode);
        self.core.notify();
    }

    /// Wake the run loop without requesting termination, e.g. after
    /// pushing a task so a parked loop re-checks immediately.
    pub fn notify(&self) {
        self.core.notify();
    }

    /// Block until the dispatcher has fully terminated.
    pub fn await_termination(&self) -> Expect<()> {
        await_termination(&self.core)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatcherState {
        self.core.state()
    }
}

impl Dispatcher for BlockingDispatcherHandle {
    fn notify(&self) {
        BlockingDispatcherHandle::notify(self)
    }

    fn terminate(&self, mode: TerminationMode) {
        BlockingDispatcherHandle::terminate(self, mode)
    }

    fn await_termination(&self) -> Expect<()> {
        BlockingDispatcherHandle::await_termination(self)
    }

    fn state(&self) -> DispatcherState {
        BlockingDispatcherHandle::state(self)
    }
}
