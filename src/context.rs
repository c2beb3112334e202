//! `ExecutionContext` — the dispatcher + scheduler + default queue bundle
//! handed to user code (spec.md §3 item 7). Promise combinators and
//! channel constructors that don't name a queue explicitly post their
//! continuations to a context's default queue.

use std::sync::Arc;

use crate::dispatcher::{BlockingDispatcher, Dispatcher, DispatcherOptions, ThreadPoolDispatcher, ThreadPoolOptions};
use crate::expect::Expect;
use crate::queue::Queue;
use crate::scheduler::{DirectScheduler, PriorityScheduler, TaskSource};

/// A scheduler + dispatcher pairing with one queue designated as the
/// default target for combinators that don't name one explicitly.
///
/// Built by one of the `with_*` constructors, which wire a fresh
/// [`Queue`], a scheduler over it, and a dispatcher in the same motion —
/// mirroring how the teacher crate's runtime bootstrap couples these
/// three pieces rather than leaving callers to assemble them by hand.
pub struct ExecutionContext {
    default_queue: Arc<Queue>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl ExecutionContext {
    fn new(default_queue: Arc<Queue>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        default_queue.attach_dispatcher(dispatcher.clone());
        ExecutionContext {
            default_queue,
            dispatcher,
        }
    }

    /// A context with a single queue drained by a single blocking-style
    /// dispatcher handle; the caller is responsible for running the
    /// dispatcher's worker loop on some thread (see
    /// [`crate::dispatcher::BlockingDispatcher::start`]).
    pub fn single_threaded(name: impl Into<std::borrow::Cow<'static, str>>) -> (Self, Arc<BlockingDispatcher>) {
        let queue = Arc::new(Queue::new(0));
        let scheduler: Arc<dyn TaskSource> = Arc::new(DirectScheduler::new(vec![queue.clone()]));
        let dispatcher = Arc::new(BlockingDispatcher::new(scheduler, DispatcherOptions::named(name)));
        let handle: Arc<dyn Dispatcher> = Arc::new(dispatcher.handle());
        (ExecutionContext::new(queue, handle), dispatcher)
    }

    /// A context backed by an N-worker thread pool, already started.
    pub fn thread_pool(options: ThreadPoolOptions) -> Self {
        let queue = Arc::new(Queue::new(0));
        let scheduler: Arc<dyn TaskSource> = Arc::new(DirectScheduler::new(vec![queue.clone()]));
        let dispatcher = Arc::new(ThreadPoolDispatcher::new(scheduler, options));
        dispatcher.start();
        ExecutionContext::new(queue, dispatcher)
    }

    /// A context over several priority-ordered queues, draining the
    /// given thread pool. `queues` must be non-empty; the first entry's
    /// priority is used for `default_queue()`.
    pub fn priority_thread_pool(priorities: &[i32], options: ThreadPoolOptions) -> Self {
        let queues: Vec<Arc<Queue>> = priorities.iter().map(|p| Arc::new(Queue::new(*p))).collect();
        let default_queue = queues[0].clone();
        let scheduler: Arc<dyn TaskSource> = Arc::new(PriorityScheduler::new(queues.clone()));
        let dispatcher = Arc::new(ThreadPoolDispatcher::new(scheduler, options));
        dispatcher.start();
        let wake: Arc<dyn Dispatcher> = dispatcher.clone();
        for queue in &queues {
            queue.attach_dispatcher(wake.clone());
        }
        ExecutionContext {
            default_queue,
            dispatcher,
        }
    }

    /// The queue combinators and channel constructors should post to when
    /// none is named explicitly.
    pub fn default_queue(&self) -> Arc<Queue> {
        self.default_queue.clone()
    }

    /// The dispatcher backing this context's scheduler.
    pub fn dispatcher(&self) -> Arc<dyn Dispatcher> {
        self.dispatcher.clone()
    }

    /// Request termination of the backing dispatcher.
    pub fn terminate(&self, mode: crate::dispatcher::TerminationMode) {
        self.dispatcher.terminate(mode);
    }

    /// Block until the backing dispatcher has fully terminated.
    pub fn await_termination(&self) -> Expect<()> {
        self.dispatcher.await_termination()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn thread_pool_context_drains_pushed_tasks() {
        let ctx = ExecutionContext::thread_pool(ThreadPoolOptions::new(2, "ctx-pool"));
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..10 {
            let counter = counter.clone();
            ctx.default_queue()
                .push(Task::immediate(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }));
        }
        std::thread::sleep(Duration::from_millis(30));
        ctx.terminate(crate::dispatcher::TerminationMode::Linger);
        ctx.await_termination().rethrow_on_exception().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn priority_context_drains_high_priority_queue_first() {
        let ctx = ExecutionContext::priority_thread_pool(&[10, 0], ThreadPoolOptions::new(1, "ctx-priority"));
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        for _ in 0..3 {
            let log = log.clone();
            ctx.default_queue()
                .push(Task::immediate(move || log.lock().unwrap().push("high")));
        }
        std::thread::sleep(Duration::from_millis(30));
        ctx.terminate(crate::dispatcher::TerminationMode::Linger);
        ctx.await_termination().rethrow_on_exception().unwrap();
        assert_eq!(log.lock().unwrap().len(), 3);
    }
}
