//! `Task` — a zero-argument callable plus an optional earliest-execution
//! deadline.

use crate::function::UniqueFn;
use crate::time::MonotonicTimePoint;
use std::fmt;

/// One unit of work posted to a [`crate::queue::Queue`].
///
/// # Contract
/// - If `wait_until` is set and still in the future, the task must not run
///   before that instant (spec.md Data Model, `Task` row).
/// - A `Task` runs exactly once, to completion, on whichever dispatcher
///   thread pops it; there is no task-level suspension.
pub struct Task {
    run: UniqueFn<(), ()>,
    wait_until: Option<MonotonicTimePoint>,
    name: Option<&'static str>,
}

impl Task {
    /// Build a task that may run as soon as it is dequeued.
    pub fn immediate(run: impl FnOnce() + Send + 'static) -> Self {
        Task {
            run: UniqueFn::from_closure(move |_| run()),
            wait_until: None,
            name: None,
        }
    }

    /// Build a task that must not run before `at`.
    pub fn timed(at: MonotonicTimePoint, run: impl FnOnce() + Send + 'static) -> Self {
        Task {
            run: UniqueFn::from_closure(move |_| run()),
            wait_until: Some(at),
            name: None,
        }
    }

    /// Attach a diagnostic name, surfaced in logs.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// The earliest instant this task may run, if any.
    pub fn wait_until(&self) -> Option<MonotonicTimePoint> {
        self.wait_until
    }

    /// `true` if this task's deadline (if any) has passed.
    pub fn is_due(&self, now: MonotonicTimePoint) -> bool {
        match self.wait_until {
            Some(deadline) => now >= deadline,
            None => true,
        }
    }

    /// Run the task to completion, consuming it.
    ///
    /// # Contract
    /// - A failure here is always `BadFunctionCall` — an empty `UniqueFn`
    ///   — since `Task` never exposes a constructor that leaves `run`
    ///   empty; it is logged rather than propagated because nothing holds
    ///   a promise or channel slot waiting on a bare `Task`'s outcome (the
    ///   dispatcher's own panic-to-error conversion covers the "closure
    ///   panicked" case separately, in `run_worker_loop`).
    pub fn run(self) {
        let name = self.name;
        if let Err(err) = self.run.call(()) {
            crate::observability::log_error!("tether_rt::task", "task {:?} failed to run: {err}", name);
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("wait_until", &self.wait_until)
            .finish()
    }
}
