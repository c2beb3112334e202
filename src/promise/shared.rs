//! `SharedPromise<T>` — a `Clone`-able handle permitting any number of
//! independent observers, each seeing an equal outcome (spec.md §8
//! invariant 11).

use std::sync::Arc;

use crate::error::CoreError;
use crate::expect::Expect;
use crate::queue::Queue;

use super::state::SharedState;
use super::unique::Promise;
use super::Continued;

/// A multi-shot, `Clone`-able handle to a promise's eventual outcome.
/// Requires `T: Clone` because every observer receives its own copy of
/// the value.
pub struct SharedPromise<T: Clone + Send + 'static> {
    state: Arc<SharedState<T>>,
    queue: Arc<Queue>,
}

impl<T: Clone + Send + 'static> Clone for SharedPromise<T> {
    fn clone(&self) -> Self {
        SharedPromise {
            state: self.state.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> SharedPromise<T> {
    pub(crate) fn from_unique(promise: Promise<T>) -> Self {
        let queue = promise.queue();
        let state = Arc::new(SharedState::new());
        let shared_state_for_forward = state.clone();
        promise.register_raw(
            queue.clone(),
            Box::new(move |expect: Expect<T>| shared_state_for_forward.resolve(expect)),
        );
        SharedPromise { state, queue }
    }

    /// The queue this promise's continuations post to by default.
    pub fn queue(&self) -> Arc<Queue> {
        self.queue.clone()
    }

    /// Register a new observer. May be called any number of times; every
    /// observer sees the same (by-clone) outcome.
    pub fn then<U, R, F>(&self, fn_: F) -> Promise<U>
    where
        U: Send + 'static,
        R: Into<Continued<U>>,
        F: FnOnce(T) -> R + Send + 'static,
    {
        let queue = self.queue.clone();
        let (defer, result) = super::defer::Defer::construct(queue.clone());
        self.state.register(
            queue,
            Box::new(move |expect: Expect<T>| match expect.rethrow_on_exception() {
                Ok(value) => match std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || fn_(value))) {
                    Ok(result) => match result.into() {
                        Continued::Value(value) => defer.set_value(value),
                        Continued::Rejected(error) => defer.set_exception(error),
                        Continued::Inner(inner) => defer.satisfy(inner),
                    },
                    Err(_payload) => defer.set_exception(CoreError::domain(
                        "promise.then_panicked",
                        "a shared promise continuation panicked",
                    )),
                },
                Err(error) => defer.set_exception(error),
            }),
        );
        result
    }

    /// Register a new observer that only runs on failure.
    pub fn fail<R, F>(&self, fn_: F) -> Promise<T>
    where
        R: Into<Continued<T>>,
        F: FnOnce(CoreError) -> R + Send + 'static,
    {
        let queue = self.queue.clone();
        let (defer, result) = super::defer::Defer::construct(queue.clone());
        self.state.register(
            queue,
            Box::new(move |expect: Expect<T>| match expect.rethrow_on_exception() {
                Ok(value) => defer.set_value(value),
                Err(error) => match std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || fn_(error))) {
                    Ok(result) => match result.into() {
                        Continued::Value(value) => defer.set_value(value),
                        Continued::Rejected(error) => defer.set_exception(error),
                        Continued::Inner(inner) => defer.satisfy(inner),
                    },
                    Err(_payload) => defer.set_exception(CoreError::domain(
                        "promise.fail_panicked",
                        "a shared promise failure handler panicked",
                    )),
                },
            }),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::defer::Defer;
    use crate::queue::Queue;

    fn test_queue() -> Arc<Queue> {
        Arc::new(Queue::new(0))
    }

    fn drain(queue: &Queue) {
        let now = crate::time::MonotonicTimePoint::now();
        while let Some(task) = queue.pop_ready(now) {
            task.run();
        }
    }

    #[test]
    fn two_observers_see_equal_values() {
        let queue = test_queue();
        let (defer, promise) = Defer::construct(queue.clone());
        let shared = promise.share();

        let a = Arc::new(std::sync::Mutex::new(None));
        let b = Arc::new(std::sync::Mutex::new(None));
        let a2 = a.clone();
        let b2 = b.clone();
        shared.then(move |value: i32| *a2.lock().unwrap() = Some(value)).done();
        shared.then(move |value: i32| *b2.lock().unwrap() = Some(value)).done();

        defer.set_value(7);
        drain(&queue);
        assert_eq!(*a.lock().unwrap(), Some(7));
        assert_eq!(*b.lock().unwrap(), Some(7));
    }

    #[test]
    fn rejected_shared_promise_yields_equal_errors_to_all_observers() {
        let queue = test_queue();
        let (defer, promise): (Defer<i32>, _) = Defer::construct(queue.clone());
        let shared = promise.share();

        let a = Arc::new(std::sync::Mutex::new(None));
        let b = Arc::new(std::sync::Mutex::new(None));
        let a2 = a.clone();
        let b2 = b.clone();
        shared.fail(move |err| { *a2.lock().unwrap() = Some(err.message().to_string()); 0 }).done();
        shared.fail(move |err| { *b2.lock().unwrap() = Some(err.message().to_string()); 0 }).done();

        drop(defer);
        drain(&queue);
        assert!(a.lock().unwrap().is_some());
        assert_eq!(*a.lock().unwrap(), *b.lock().unwrap());
    }
}
