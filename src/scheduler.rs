//! `Scheduler` — fans tasks from one or more queues out to a backing
//! dispatcher.
//!
//! Two implementations are required by spec.md §4.6: a work-conserving
//! [`DirectScheduler`] (round-robin across queues, ignoring priority) and a
//! work-conserving [`PriorityScheduler`] (higher-priority queues drain
//! before lower-priority ones). Both are exposed to a
//! [`crate::dispatcher::Dispatcher`] through the same [`TaskSource`]
//! fetcher hook.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::queue::Queue;
use crate::task::Task;
use crate::time::MonotonicTimePoint;

/// The fetcher hook a [`crate::dispatcher::Dispatcher`] polls for work.
///
/// # Contract
/// - `next_task` returns `None` only when no queue currently has a due
///   task; a work-conserving implementation never returns `None` while any
///   queue has runnable work.
/// - `next_wakeup` gives the dispatcher a precise instant to sleep until
///   when `next_task` returned `None` but a timed task is pending.
pub trait TaskSource: Send + Sync + crate::sealed::Sealed {
    /// Pop and return the next runnable task, or `None` if nothing is due.
    fn next_task(&self, now: MonotonicTimePoint) -> Option<Task>;

    /// The earliest instant at which a timed task across all queues will
    /// become due, if any is pending.
    fn next_wakeup(&self, now: MonotonicTimePoint) -> Option<MonotonicTimePoint>;
}

/// Round-robins across its queues, ignoring priority entirely.
pub struct DirectScheduler {
    queues: Vec<Arc<Queue>>,
    cursor: AtomicUsize,
}

impl DirectScheduler {
    /// Build a scheduler owning the given queues.
    pub fn new(queues: Vec<Arc<Queue>>) -> Self {
        DirectScheduler {
            queues,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Attach a new queue.
    pub fn add_queue(&mut self, queue: Arc<Queue>) {
        self.queues.push(queue);
    }
}

impl TaskSource for DirectScheduler {
    fn next_task(&self, now: MonotonicTimePoint) -> Option<Task> {
        let len = self.queues.len();
        if len == 0 {
            return None;
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
        for offset in 0..len {
            let idx = (start + offset) % len;
            if let Some(task) = self.queues[idx].pop_ready(now) {
                return Some(task);
            }
        }
        None
    }

    fn next_wakeup(&self, _now: MonotonicTimePoint) -> Option<MonotonicTimePoint> {
        self.queues.iter().filter_map(|q| q.next_wakeup()).min()
    }
}

/// Drains strictly higher-priority queues before ever considering a
/// lower-priority one is eligible.
pub struct PriorityScheduler {
    /// Sorted highest-priority first.
    queues: Vec<Arc<Queue>>,
}

impl PriorityScheduler {
    /// Build a scheduler owning the given queues, sorting them by
    /// descending priority.
    pub fn new(mut queues: Vec<Arc<Queue>>) -> Self {
        queues.sort_by(|a, b| b.priority().cmp(&a.priority()));
        PriorityScheduler { queues }
    }

    /// Attach a new queue, re-sorting to preserve priority order.
    pub fn add_queue(&mut self, queue: Arc<Queue>) {
        self.queues.push(queue);
        self.queues.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }
}

impl TaskSource for PriorityScheduler {
    fn next_task(&self, now: MonotonicTimePoint) -> Option<Task> {
        for queue in &self.queues {
            if let Some(task) = queue.pop_ready(now) {
                return Some(task);
            }
        }
        None
    }

    fn next_wakeup(&self, _now: MonotonicTimePoint) -> Option<MonotonicTimePoint> {
        self.queues.iter().filter_map(|q| q.next_wakeup()).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn direct_scheduler_round_robins_across_queues() {
        let a = Arc::new(Queue::new(0));
        let b = Arc::new(Queue::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        for (label, queue) in [("a", &a), ("b", &b)] {
            for _ in 0..2 {
                let log = log.clone();
                queue.push(Task::immediate(move || log.lock().unwrap().push(label)));
            }
        }
        let scheduler = DirectScheduler::new(vec![a, b]);
        let now = MonotonicTimePoint::now();
        let mut drained = Vec::new();
        while let Some(task) = scheduler.next_task(now) {
            task.run();
        }
        drained.extend(log.lock().unwrap().iter().copied());
        assert_eq!(drained.len(), 4);
        assert!(drained.contains(&"a") && drained.contains(&"b"));
    }

    #[test]
    fn priority_scheduler_drains_higher_priority_first() {
        let high = Arc::new(Queue::new(10));
        let low = Arc::new(Queue::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            let log = log.clone();
            low.push(Task::immediate(move || log.lock().unwrap().push("low")));
        }
        for _ in 0..3 {
            let log = log.clone();
            high.push(Task::immediate(move || log.lock().unwrap().push("high")));
        }
        let scheduler = PriorityScheduler::new(vec![low, high]);
        let now = MonotonicTimePoint::now();
        while let Some(task) = scheduler.next_task(now) {
            task.run();
        }
        let log = log.lock().unwrap();
        assert_eq!(&log[0..3], &["high", "high", "high"]);
        assert_eq!(&log[3..6], &["low", "low", "low"]);
    }
}
