//! N-worker-thread dispatcher: `start()` spawns its workers and returns
//! immediately; `await_termination()` joins them.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::{await_termination, run_worker_loop, Dispatcher, DispatcherCore, DispatcherOptions, DispatcherState, TerminationMode};
use crate::expect::Expect;
use crate::scheduler::TaskSource;

/// Parallelism configuration for a [`ThreadPoolDispatcher`].
#[derive(Clone, Debug)]
pub struct ThreadPoolOptions {
    /// Number of worker threads.
    pub threads: usize,
    /// Shared dispatcher-level options (name, default termination mode).
    pub dispatcher: DispatcherOptions,
}

impl ThreadPoolOptions {
    /// `threads` workers under the given name.
    pub fn new(threads: usize, name: impl Into<Cow<'static, str>>) -> Self {
        ThreadPoolOptions {
            threads: threads.max(1),
            dispatcher: DispatcherOptions::named(name),
        }
    }

    /// A thread count derived from the host's available parallelism (a
    /// "soft cores" default), falling back to `1` if it cannot be probed.
    /// CPU-topology probing beyond this is delegated to the host
    /// environment, per the out-of-scope platform-abstraction boundary in
    /// spec.md §9.
    pub fn soft_cores(name: impl Into<Cow<'static, str>>) -> Self {
        let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        ThreadPoolOptions::new(threads, name)
    }
}

/// A dispatcher backed by a fixed pool of worker threads, each running the
/// same fetch-run loop as [`super::BlockingDispatcher`].
pub struct ThreadPoolDispatcher {
    core: Arc<DispatcherCore>,
    threads: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
    active_workers: Arc<std::sync::atomic::AtomicUsize>,
}

impl ThreadPoolDispatcher {
    /// Build a dispatcher that will spawn `options.threads` workers on
    /// `start()`.
    pub fn new(fetcher: Arc<dyn TaskSource>, options: ThreadPoolOptions) -> Self {
        ThreadPoolDispatcher {
            core: Arc::new(DispatcherCore::new(fetcher, &options.dispatcher)),
            threads: options.threads,
            handles: Mutex::new(Vec::new()),
            active_workers: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        }
    }

    /// Spawn the worker threads. Returns immediately; call
    /// `await_termination` to block until they have all exited.
    pub fn start(&self) {
        self.core.set_state(DispatcherState::Running);
        self.active_workers
            .store(self.threads, std::sync::atomic::Ordering::SeqCst);
        let mut handles = self.handles.lock().unwrap();
        for idx in 0..self.threads {
            let core = self.core.clone();
            let active = self.active_workers.clone();
            let builder = thread::Builder::new().name(format!("{}-{idx}", core.name));
            let spawned = builder.spawn(move || {
                run_worker_loop(&core);
                if active.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) == 1 {
                    core.set_state(DispatcherState::Terminated);
                }
            });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(_) => {
                    self.core.record_error(crate::error::CoreError::new(
                        crate::error::CoreErrorKind::Domain("dispatcher.spawn_failed"),
                        "failed to spawn a worker thread",
                    ));
                    active.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                }
            }
        }
    }

    /// Request termination in the given mode; workers observe this on
    /// their next loop iteration.
    pub fn terminate(&self, mode: TerminationMode) {
        self.core.begin_terminate(mode);
        self.core.notify();
    }

    /// Block until every worker thread has exited.
    pub fn await_termination(&self) -> Expect<()> {
        let result = await_termination(&self.core);
        let mut handles = self.handles.lock().unwrap();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
        result
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatcherState {
        self.core.state()
    }
}

impl Dispatcher for ThreadPoolDispatcher {
    fn notify(&self) {
        self.core.notify()
    }

    fn terminate(&self, mode: TerminationMode) {
        ThreadPoolDispatcher::terminate(self, mode)
    }

    fn await_termination(&self) -> Expect<()> {
        ThreadPoolDispatcher::await_termination(self)
    }

    fn state(&self) -> DispatcherState {
        ThreadPoolDispatcher::state(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Queue;
    use crate::scheduler::DirectScheduler;
    use crate::task::Task;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn pool_drains_tasks_across_workers() {
        let queue = Arc::new(Queue::new(0));
        let scheduler: Arc<dyn TaskSource> = Arc::new(DirectScheduler::new(vec![queue.clone()]));
        let dispatcher = ThreadPoolDispatcher::new(scheduler, ThreadPoolOptions::new(4, "pool"));

        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..50 {
            let counter = counter.clone();
            queue.push(Task::immediate(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        dispatcher.start();
        std::thread::sleep(std::time::Duration::from_millis(50));
        dispatcher.terminate(TerminationMode::Linger);
        dispatcher.await_termination().rethrow_on_exception().unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(dispatcher.state(), DispatcherState::Terminated);
    }

    #[test]
    fn annihilate_stops_without_waiting_for_future_timed_tasks() {
        let queue = Arc::new(Queue::new(0));
        let scheduler: Arc<dyn TaskSource> = Arc::new(DirectScheduler::new(vec![queue.clone()]));
        let dispatcher = ThreadPoolDispatcher::new(scheduler, ThreadPoolOptions::new(2, "pool-annihilate"));

        let far_future = crate::time::MonotonicTimePoint::now()
            .saturating_add(std::time::Duration::from_secs(3600));
        queue.push(Task::timed(far_future, || {}));

        dispatcher.start();
        std::thread::sleep(std::time::Duration::from_millis(10));
        dispatcher.terminate(TerminationMode::Annihilate);
        let result = dispatcher.await_termination();
        assert!(result.rethrow_on_exception().is_ok());
        assert_eq!(dispatcher.state(), DispatcherState::Terminated);
    }
}
