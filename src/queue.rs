//! `Queue` — an ordered FIFO of tasks with an integer priority.
//!
//! # Design background (Why)
//! - Mirrors the teacher crate's pattern of a small state struct guarded by
//!   its own lock (one mutex per `Queue`, never held across a call into a
//!   different component's lock — see spec.md §5).
//! - Resolves the open question on timed-vs-immediate ordering within one
//!   queue: a due timed task always outranks an immediate task in the same
//!   queue (spec.md §9).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::dispatcher::Dispatcher;
use crate::task::Task;
use crate::time::MonotonicTimePoint;

struct TimedSlot {
    at: MonotonicTimePoint,
    task: Task,
}

struct QueueInner {
    immediate: VecDeque<Task>,
    timed: Vec<TimedSlot>,
}

/// A single-priority task FIFO. Belongs to exactly one
/// [`crate::scheduler`] scheduler.
pub struct Queue {
    priority: i32,
    inner: Mutex<QueueInner>,
    wake: Mutex<Option<Arc<dyn Dispatcher>>>,
}

impl Queue {
    /// Create an empty queue at the given priority (higher runs first
    /// under a [`crate::scheduler::PriorityScheduler`]).
    pub fn new(priority: i32) -> Self {
        Queue {
            priority,
            inner: Mutex::new(QueueInner {
                immediate: VecDeque::new(),
                timed: Vec::new(),
            }),
            wake: Mutex::new(None),
        }
    }

    /// Attach the dispatcher this queue's scheduler is mounted on, so that
    /// `push` can wake a parked worker immediately instead of waiting for
    /// its bounded poll interval.
    pub fn attach_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) {
        *self.wake.lock().unwrap() = Some(dispatcher);
    }

    /// This queue's priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Push a task to the back of the FIFO, or into the timed set if it
    /// carries a future deadline.
    ///
    /// # Logic (How)
    /// - The dispatcher notify happens after the lock is released, not
    ///   under it: `Dispatcher::notify` only takes a condvar lock of its
    ///   own, but holding two locks across a call into another component
    ///   is exactly the ordering hazard spec.md §5 rules out, so this
    ///   queue's own mutex is always dropped first.
    pub fn push(&self, task: Task) {
        {
            let mut inner = self.inner.lock().unwrap();
            match task.wait_until() {
                Some(at) => inner.timed.push(TimedSlot { at, task }),
                None => inner.immediate.push_back(task),
            }
        }
        if let Some(dispatcher) = self.wake.lock().unwrap().as_ref() {
            dispatcher.notify();
        }
    }

    /// `true` if no task (due or pending) is enqueued.
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.immediate.is_empty() && inner.timed.is_empty()
    }

    /// Pop the next runnable task, if any is due at `now`.
    ///
    /// A due timed task always outranks an immediate task in the same
    /// queue; among several due timed tasks, the earliest deadline wins.
    pub fn pop_ready(&self, now: MonotonicTimePoint) -> Option<Task> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(idx) = earliest_due_index(&inner.timed, now) {
            return Some(inner.timed.remove(idx).task);
        }
        inner.immediate.pop_front()
    }

    /// The earliest instant at which this queue will next have runnable
    /// work, used by a dispatcher to size its timed wait. `None` means the
    /// queue is drained of timed tasks (immediate tasks, if any, are
    /// already ready and should be drained via `pop_ready` first).
    pub fn next_wakeup(&self) -> Option<MonotonicTimePoint> {
        let inner = self.inner.lock().unwrap();
        inner.timed.iter().map(|slot| slot.at).min()
    }
}

fn earliest_due_index(timed: &[TimedSlot], now: MonotonicTimePoint) -> Option<usize> {
    timed
        .iter()
        .enumerate()
        .filter(|(_, slot)| now >= slot.at)
        .min_by_key(|(_, slot)| slot.at)
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn fifo_order_within_priority() {
        let queue = Queue::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            queue.push(Task::immediate(move || order.lock().unwrap().push(i)));
        }
        let now = MonotonicTimePoint::now();
        while let Some(task) = queue.pop_ready(now) {
            task.run();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn due_timed_task_outranks_immediate() {
        let queue = Queue::new(0);
        let ran = Arc::new(AtomicU32::new(0));
        let ran2 = ran.clone();
        queue.push(Task::immediate(move || {
            ran2.compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                .ok();
        }));
        let ran3 = ran.clone();
        queue.push(Task::timed(MonotonicTimePoint::now(), move || {
            ran3.compare_exchange(0, 2, Ordering::SeqCst, Ordering::SeqCst)
                .ok();
        }));
        let now = MonotonicTimePoint::now();
        let first = queue.pop_ready(now).unwrap();
        first.run();
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn not_yet_due_timed_task_is_not_popped() {
        let queue = Queue::new(0);
        let future = MonotonicTimePoint::now().saturating_add(Duration::from_secs(3600));
        queue.push(Task::timed(future, || {}));
        assert!(queue.pop_ready(MonotonicTimePoint::now()).is_none());
        assert!(queue.next_wakeup().is_some());
    }

    #[test]
    fn push_notifies_attached_dispatcher() {
        use crate::dispatcher::{BlockingDispatcher, DispatcherOptions};
        use crate::scheduler::{DirectScheduler, TaskSource};

        let queue = Arc::new(Queue::new(0));
        let scheduler: Arc<dyn TaskSource> = Arc::new(DirectScheduler::new(vec![queue.clone()]));
        let dispatcher = Arc::new(BlockingDispatcher::new(scheduler, DispatcherOptions::named("queue-wake")));
        queue.attach_dispatcher(Arc::new(dispatcher.handle()));

        let ran = Arc::new(AtomicU32::new(0));
        let handle = dispatcher.handle();
        let runner = {
            let dispatcher = dispatcher.clone();
            std::thread::spawn(move || dispatcher.start())
        };

        let ran2 = ran.clone();
        queue.push(Task::immediate(move || {
            ran2.store(1, Ordering::SeqCst);
        }));

        // The push's notify() should wake the loop well before its bounded
        // poll interval would have anyway.
        std::thread::sleep(Duration::from_millis(20));
        handle.terminate(crate::dispatcher::TerminationMode::Linger);
        handle.await_termination().rethrow_on_exception().unwrap();
        runner.join().unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
