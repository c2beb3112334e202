//! Rendezvous storage shared by a `Defer`/`Promise` pair, and by a
//! `SharedPromise`'s observers.
//!
//! # Design background (Why)
//! - `§4.2` requires a single-slot rendezvous: whichever of
//!   resolution-or-registration happens second is the one responsible for
//!   posting the continuation `Task`. One mutex per state serializes that
//!   race; the mutex is always released before the resulting `Task` is
//!   pushed onto its `Queue`, per the no-cross-component-locks-held rule
//!   in `§5`.
//! - The unique and shared cases are split into two concrete types rather
//!   than one mode flag: a unique state never needs `T: Clone` and holds at
//!   most one continuation, while a shared state always needs `T: Clone`
//!   and holds a list. Keeping them separate avoids smuggling a runtime
//!   mode check into code paths that Rust's ownership already makes
//!   mutually exclusive (a `Promise<T>` is consumed by value on first use).

use std::sync::{Arc, Mutex};

use crate::error::CoreError;
use crate::expect::Expect;
use crate::observability::log_warn;
use crate::queue::Queue;
use crate::task::Task;

pub(crate) type Continuation<T> = Box<dyn FnOnce(Expect<T>) + Send>;

enum UniqueSlot<T> {
    PendingIdle,
    PendingWithContinuation(Arc<Queue>, Continuation<T>),
    Resolved(Expect<T>),
}

/// Backing storage for one unique `Promise<T>`/`Defer<T>` pair.
pub(crate) struct UniqueState<T> {
    slot: Mutex<UniqueSlot<T>>,
}

impl<T: Send + 'static> UniqueState<T> {
    pub(crate) fn new() -> Self {
        UniqueState {
            slot: Mutex::new(UniqueSlot::PendingIdle),
        }
    }

    /// Complete the state. Only the first call has any effect; a second
    /// call is a contract violation (spec.md §4.2, "at most one producer
    /// call completes the state") and is logged rather than panicking,
    /// since the producer side has already returned control to its
    /// caller by the time this would be detected.
    pub(crate) fn resolve(&self, value: Expect<T>) {
        let mut guard = self.slot.lock().unwrap();
        match std::mem::replace(&mut *guard, UniqueSlot::PendingIdle) {
            UniqueSlot::PendingIdle => *guard = UniqueSlot::Resolved(value),
            UniqueSlot::PendingWithContinuation(queue, run) => {
                drop(guard);
                queue.push(Task::immediate(move || run(value)));
            }
            UniqueSlot::Resolved(prior) => {
                *guard = UniqueSlot::Resolved(prior);
                log_warn!("tether_rt::promise", "promise state resolved twice; ignoring the second resolution");
            }
        }
    }

    /// Register the single continuation this state will ever run. Called
    /// at most once, because the `Promise<T>` owning a reference to this
    /// state is consumed by value when a combinator registers one.
    pub(crate) fn register(&self, queue: Arc<Queue>, run: Continuation<T>) {
        let mut guard = self.slot.lock().unwrap();
        match std::mem::replace(&mut *guard, UniqueSlot::PendingIdle) {
            UniqueSlot::PendingIdle => *guard = UniqueSlot::PendingWithContinuation(queue, run),
            UniqueSlot::Resolved(value) => {
                drop(guard);
                queue.push(Task::immediate(move || run(value)));
            }
            UniqueSlot::PendingWithContinuation(existing_queue, existing_run) => {
                *guard = UniqueSlot::PendingWithContinuation(existing_queue, existing_run);
                log_warn!("tether_rt::promise", "duplicate continuation registration ignored");
            }
        }
    }
}

/// The value half of a resolved [`SharedState`], kept distinct from
/// `Expect<T>` so the error case can be stored once and handed to every
/// observer by reference-counted clone instead of requiring `CoreError`
/// itself to stay cheap to clone indefinitely.
#[derive(Clone)]
enum SharedOutcome<T> {
    Value(T),
    Error(Arc<CoreError>),
}

impl<T: Clone> SharedOutcome<T> {
    fn to_expect(&self) -> Expect<T> {
        match self {
            SharedOutcome::Value(value) => Expect::fulfill(value.clone()),
            SharedOutcome::Error(error) => Expect::refuse((**error).clone()),
        }
    }
}

enum SharedSlot<T> {
    Pending(Vec<(Arc<Queue>, Continuation<T>)>),
    Resolved(SharedOutcome<T>),
}

/// Backing storage for a [`crate::promise::SharedPromise<T>`]; every
/// registered continuation observes an equal outcome (spec.md invariant
/// 11, "round-trip").
pub(crate) struct SharedState<T: Clone> {
    slot: Mutex<SharedSlot<T>>,
}

impl<T: Clone + Send + 'static> SharedState<T> {
    pub(crate) fn new() -> Self {
        SharedState {
            slot: Mutex::new(SharedSlot::Pending(Vec::new())),
        }
    }

    pub(crate) fn resolve(&self, value: Expect<T>) {
        let outcome = match value.rethrow_on_exception() {
            Ok(value) => SharedOutcome::Value(value),
            Err(error) => SharedOutcome::Error(Arc::new(error)),
        };
        let mut guard = self.slot.lock().unwrap();
        let waiters = match std::mem::replace(&mut *guard, SharedSlot::Resolved(outcome.clone())) {
            SharedSlot::Pending(waiters) => waiters,
            SharedSlot::Resolved(prior) => {
                *guard = SharedSlot::Resolved(prior);
                log_warn!("tether_rt::promise", "shared promise state resolved twice; ignoring the second resolution");
                return;
            }
        };
        drop(guard);
        for (queue, run) in waiters {
            let expect = outcome.to_expect();
            queue.push(Task::immediate(move || run(expect)));
        }
    }

    pub(crate) fn register(&self, queue: Arc<Queue>, run: Continuation<T>) {
        let mut guard = self.slot.lock().unwrap();
        match &mut *guard {
            SharedSlot::Pending(waiters) => waiters.push((queue, run)),
            SharedSlot::Resolved(outcome) => {
                let expect = outcome.to_expect();
                drop(guard);
                queue.push(Task::immediate(move || run(expect)));
            }
        }
    }
}
