//! `Defer<T>` — the producer-side handle that resolves a `Promise<T>`.
//!
//! # Design background (Why)
//! - Each terminal setter consumes `self` by value, so "at most one
//!   terminal setter call" (spec.md §3, `Defer` row) is enforced at
//!   compile time rather than with a runtime flag.
//! - `Drop` still runs on the consumed-and-returned `self` inside each
//!   setter; a `settled` field distinguishes "already resolved, Drop is a
//!   no-op" from "never resolved, Drop must install the abandoned error"
//!   (the open question this crate resolves per spec.md §9 / SPEC_FULL.md
//!   §4.1).

use std::sync::Arc;

use crate::error::CoreError;
use crate::expect::Expect;
use crate::queue::Queue;

use super::state::UniqueState;
use super::unique::Promise;
use super::Continued;

/// The producer side of a one-shot [`Promise<T>`].
pub struct Defer<T: Send + 'static> {
    pub(crate) state: Arc<UniqueState<T>>,
    settled: bool,
}

impl<T: Send + 'static> Defer<T> {
    /// Build a fresh, unresolved `Defer`/`Promise` pair posting
    /// continuations to `queue` by default.
    pub fn construct(queue: Arc<Queue>) -> (Defer<T>, Promise<T>) {
        let state = Arc::new(UniqueState::new());
        (
            Defer {
                state: state.clone(),
                settled: false,
            },
            Promise::from_parts(state, queue),
        )
    }

    /// Resolve with a successful value.
    pub fn set_value(mut self, value: T) {
        self.state.resolve(Expect::fulfill(value));
        self.settled = true;
    }

    /// Resolve with an error.
    pub fn set_exception(mut self, error: CoreError) {
        self.state.resolve(Expect::refuse(error));
        self.settled = true;
    }

    /// Resolve with an already-constructed [`Expect<T>`].
    pub fn set_expect(mut self, expect: Expect<T>) {
        self.state.resolve(expect);
        self.settled = true;
    }

    /// Run `f` synchronously, capturing either its returned value, its
    /// returned inner promise (adopted — this `Defer` resolves when the
    /// inner promise does), or a panic raised while running it.
    pub fn set_by_fun<F, R>(mut self, f: F)
    where
        F: FnOnce() -> R,
        R: Into<Continued<T>>,
    {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
            Ok(result) => match result.into() {
                Continued::Value(value) => {
                    self.state.resolve(Expect::fulfill(value));
                    self.settled = true;
                }
                Continued::Rejected(error) => {
                    self.state.resolve(Expect::refuse(error));
                    self.settled = true;
                }
                Continued::Inner(inner) => {
                    self.settled = true;
                    adopt(self, inner);
                }
            },
            Err(_payload) => {
                self.state.resolve(Expect::refuse(CoreError::domain(
                    "promise.set_by_fun_panicked",
                    "producer callable panicked",
                )));
                self.settled = true;
            }
        }
    }

    /// Subscribe to `inner`; this `Defer` resolves with whatever `inner`
    /// eventually resolves with.
    pub fn satisfy(self, inner: Promise<T>) {
        adopt(self, inner);
    }
}

impl<T: Send + 'static> Drop for Defer<T> {
    fn drop(&mut self) {
        if !self.settled {
            self.state.resolve(Expect::refuse(CoreError::abandoned()));
        }
    }
}

fn adopt<T: Send + 'static>(mut defer: Defer<T>, inner: Promise<T>) {
    let queue = inner.queue();
    inner.register_raw(queue, Box::new(move |expect: Expect<T>| {
        defer.state.resolve(expect);
        defer.settled = true;
    }));
}
