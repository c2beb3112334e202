//! `Promise<T>` — the consumer-side handle to a one-shot [`super::Defer<T>`].

use std::sync::Arc;
use std::time::Duration;

use crate::error::{CoreError, CoreErrorKind};
use crate::expect::Expect;
use crate::queue::Queue;
use crate::task::Task;

use super::defer::Defer;
use super::shared::SharedPromise;
use super::state::{Continuation, UniqueState};
use super::Continued;

/// A one-shot, move-only handle to a promise's eventual outcome.
///
/// `then`/`fail`/`tap`/`tap_error`/`finally`/`strip`/`delay`/`share`/`done`
/// each consume `self` and return a new `Promise<U>` (or, for `share`, a
/// [`SharedPromise<T>`]) — matching the spec's requirement that a unique
/// promise's continuation may be registered exactly once, enforced here
/// by Rust's move semantics rather than a runtime check.
pub struct Promise<T: Send + 'static> {
    pub(crate) state: Arc<UniqueState<T>>,
    queue: Arc<Queue>,
}

impl<T: Send + 'static> Promise<T> {
    pub(crate) fn from_parts(state: Arc<UniqueState<T>>, queue: Arc<Queue>) -> Self {
        Promise { state, queue }
    }

    /// An already-resolved promise carrying `value`.
    pub fn fulfilled(queue: Arc<Queue>, value: T) -> Self {
        let (defer, promise) = Defer::construct(queue);
        defer.set_value(value);
        promise
    }

    /// An already-resolved promise carrying `error`.
    pub fn failed(queue: Arc<Queue>, error: CoreError) -> Self {
        let (defer, promise) = Defer::construct(queue);
        defer.set_exception(error);
        promise
    }

    /// The queue this promise's continuations post to by default.
    pub fn queue(&self) -> Arc<Queue> {
        self.queue.clone()
    }

    pub(crate) fn register_raw(self, queue: Arc<Queue>, run: Continuation<T>) {
        self.state.register(queue, run);
    }

    /// Change the default queue inherited by every stage chained after
    /// this one, without itself registering a continuation (spec.md
    /// §4.3, `set_default`).
    pub fn set_default(mut self, queue: Arc<Queue>) -> Self {
        self.queue = queue;
        self
    }

    /// On success, run `fn_` with the value and continue with its result
    /// (or, if it returns a [`Promise<U>`], with that promise's eventual
    /// outcome — adoption). On failure, the error propagates unchanged.
    pub fn then<U, R, F>(self, fn_: F) -> Promise<U>
    where
        U: Send + 'static,
        R: Into<Continued<U>>,
        F: FnOnce(T) -> R + Send + 'static,
    {
        self.then_on(None, fn_)
    }

    /// [`Promise::then`] targeting an explicit queue for this stage and
    /// every unlabelled stage chained after it.
    pub fn then_on<U, R, F>(self, queue: Option<Arc<Queue>>, fn_: F) -> Promise<U>
    where
        U: Send + 'static,
        R: Into<Continued<U>>,
        F: FnOnce(T) -> R + Send + 'static,
    {
        chain(self, queue, move |input| match input.rethrow_on_exception() {
            Ok(value) => run_guarded(move || fn_(value)),
            Err(error) => ChainOutcome::Value(Expect::refuse(error)),
        })
    }

    /// On failure whose kind matches `kind`, run `fn_` with the error and
    /// recover with its result (value or adopted promise). On success, or
    /// on a non-matching failure, the outcome propagates unchanged.
    pub fn fail_kind<R, F>(self, kind: CoreErrorKind, fn_: F) -> Promise<T>
    where
        R: Into<Continued<T>>,
        F: FnOnce(CoreError) -> R + Send + 'static,
    {
        chain(self, None, move |input| match input.rethrow_on_exception() {
            Ok(value) => ChainOutcome::Value(Expect::fulfill(value)),
            Err(error) => {
                if error.is_kind(&kind) {
                    run_guarded(move || fn_(error))
                } else {
                    ChainOutcome::Value(Expect::refuse(error))
                }
            }
        })
    }

    /// [`Promise::fail_kind`] with a universal match: runs on any error,
    /// regardless of kind.
    pub fn fail<R, F>(self, fn_: F) -> Promise<T>
    where
        R: Into<Continued<T>>,
        F: FnOnce(CoreError) -> R + Send + 'static,
    {
        chain(self, None, move |input| match input.rethrow_on_exception() {
            Ok(value) => ChainOutcome::Value(Expect::fulfill(value)),
            Err(error) => run_guarded(move || fn_(error)),
        })
    }

    /// Run `fn_` with the value on success, once; forwards the original
    /// value either way once `fn_` completes.
    pub fn tap<R, F>(self, fn_: F) -> Promise<T>
    where
        R: Into<Continued<()>>,
        F: FnOnce(&T) -> R + Send + 'static,
    {
        chain(self, None, move |input| match input.rethrow_on_exception() {
            Ok(value) => match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| fn_(&value))) {
                Ok(result) => match result.into() {
                    Continued::Value(()) => ChainOutcome::Value(Expect::fulfill(value)),
                    Continued::Rejected(error) => ChainOutcome::Value(Expect::refuse(error)),
                    Continued::Inner(inner) => ChainOutcome::Adopt(inner.then(move |()| value)),
                },
                Err(_payload) => ChainOutcome::Value(Expect::refuse(CoreError::domain(
                    "promise.tap_panicked",
                    "tap callback panicked",
                ))),
            },
            Err(error) => ChainOutcome::Value(Expect::refuse(error)),
        })
    }

    /// Run `fn_` with the error on failure, once; forwards the original
    /// error once `fn_` completes. A no-op on success.
    pub fn tap_error<R, F>(self, fn_: F) -> Promise<T>
    where
        R: Into<Continued<()>>,
        F: FnOnce(&CoreError) -> R + Send + 'static,
    {
        chain(self, None, move |input| match input.rethrow_on_exception() {
            Ok(value) => ChainOutcome::Value(Expect::fulfill(value)),
            Err(error) => match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| fn_(&error))) {
                Ok(result) => match result.into() {
                    Continued::Value(()) => ChainOutcome::Value(Expect::refuse(error)),
                    Continued::Rejected(tap_error) => ChainOutcome::Value(Expect::refuse(tap_error)),
                    Continued::Inner(inner) => {
                        ChainOutcome::Adopt(inner.then(move |()| -> Expect<T> { Expect::refuse(error) }))
                    }
                },
                Err(_payload) => ChainOutcome::Value(Expect::refuse(CoreError::domain(
                    "promise.tap_error_panicked",
                    "tap_error callback panicked",
                ))),
            },
        })
    }

    /// Run `fn_` regardless of outcome, once; forwards the original
    /// outcome unchanged once `fn_` completes.
    pub fn finally<R, F>(self, fn_: F) -> Promise<T>
    where
        R: Into<Continued<()>>,
        F: FnOnce() -> R + Send + 'static,
    {
        chain(self, None, move |input| {
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(fn_)) {
                Ok(result) => match result.into() {
                    Continued::Value(()) => ChainOutcome::Value(input),
                    Continued::Rejected(error) => ChainOutcome::Value(Expect::refuse(error)),
                    Continued::Inner(inner) => {
                        ChainOutcome::Adopt(inner.then(move |()| -> Expect<T> { input }))
                    }
                },
                Err(_payload) => ChainOutcome::Value(Expect::refuse(CoreError::domain(
                    "promise.finally_panicked",
                    "finally callback panicked",
                ))),
            }
        })
    }

    /// Reduce this promise to only its success/failure discriminator.
    pub fn strip(self) -> Promise<()> {
        chain(self, None, |input| match input.rethrow_on_exception() {
            Ok(_) => ChainOutcome::Value(Expect::fulfill(())),
            Err(error) => ChainOutcome::Value(Expect::refuse(error)),
        })
    }

    /// A promise that adopts this one's outcome only after `duration` has
    /// elapsed on the target queue.
    pub fn delay(self, duration: Duration) -> Promise<T> {
        let queue = self.queue.clone();
        let (defer, result) = Defer::construct(queue.clone());
        self.register_raw(
            queue.clone(),
            Box::new(move |expect: Expect<T>| {
                let deadline = crate::time::MonotonicTimePoint::now().saturating_add(duration);
                queue.push(Task::timed(deadline, move || defer.set_expect(expect)));
            }),
        );
        result
    }

    /// Convert to a [`SharedPromise<T>`], permitting any number of
    /// observers. Requires `T: Clone` because every observer receives its
    /// own copy of the eventual value.
    pub fn share(self) -> SharedPromise<T>
    where
        T: Clone,
    {
        SharedPromise::from_unique(self)
    }

    /// Consume the chain. Any error not recovered by an earlier `fail`
    /// becomes an uncaught-exception diagnostic rather than being
    /// silently dropped (spec.md §7, propagation policy).
    pub fn done(self) {
        let queue = self.queue.clone();
        self.register_raw(
            queue,
            Box::new(|expect: Expect<T>| {
                if let Err(error) = expect.rethrow_on_exception() {
                    crate::observability::log_error!(
                        "tether_rt::promise",
                        "uncaught exception at end of promise chain: {error}"
                    );
                }
            }),
        );
    }
}

/// The outcome of one continuation stage, either an immediately-available
/// `Expect<U>` or an inner promise whose eventual outcome this stage
/// should adopt (spec.md §4.2, "Adoption rule").
pub(crate) enum ChainOutcome<U: Send + 'static> {
    Value(Expect<U>),
    Adopt(Promise<U>),
}

fn run_guarded<U, R, F>(f: F) -> ChainOutcome<U>
where
    U: Send + 'static,
    R: Into<Continued<U>>,
    F: FnOnce() -> R,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => match result.into() {
            Continued::Value(value) => ChainOutcome::Value(Expect::fulfill(value)),
            Continued::Rejected(error) => ChainOutcome::Value(Expect::refuse(error)),
            Continued::Inner(inner) => ChainOutcome::Adopt(inner),
        },
        Err(_payload) => ChainOutcome::Value(Expect::refuse(CoreError::domain(
            "promise.continuation_panicked",
            "a promise continuation panicked",
        ))),
    }
}

/// The shared building block behind every combinator: register a
/// continuation on `promise` that runs `handler` and resolves (or adopts
/// into) the returned `Defer<U>`.
pub(crate) fn chain<T, U, H>(promise: Promise<T>, queue_override: Option<Arc<Queue>>, handler: H) -> Promise<U>
where
    T: Send + 'static,
    U: Send + 'static,
    H: FnOnce(Expect<T>) -> ChainOutcome<U> + Send + 'static,
{
    let queue = queue_override.unwrap_or_else(|| promise.queue.clone());
    let (defer, result) = Defer::construct(queue.clone());
    promise.register_raw(
        queue,
        Box::new(move |expect: Expect<T>| match handler(expect) {
            ChainOutcome::Value(value) => defer.set_expect(value),
            ChainOutcome::Adopt(inner) => defer.satisfy(inner),
        }),
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn then_chain_transforms_value() {
        let queue = test_queue();
        let (defer, promise) = Defer::construct(queue.clone());
        let observed = Arc::new(std::sync::Mutex::new(None));
        let observed2 = observed.clone();
        promise
            .then(|x: i32| x + 1)
            .then(|x: i32| x * 2)
            .then(move |x: i32| {
                *observed2.lock().unwrap() = Some(x);
                x
            })
            .done();
        defer.set_value(5);
        drain(&queue);
        assert_eq!(*observed.lock().unwrap(), Some(12));
    }

    #[test]
    fn fail_recovers_matching_error() {
        let queue = test_queue();
        let (defer, promise) = Defer::construct(queue.clone());
        let observed = Arc::new(std::sync::Mutex::new(None));
        let observed2 = observed.clone();
        promise
            .then(|_: ()| -> &'static str { panic!("boom") })
            .fail(|_err| "recovered")
            .then(move |s: &'static str| {
                *observed2.lock().unwrap() = Some(s);
            })
            .done();
        defer.set_value(());
        drain(&queue);
        assert_eq!(*observed.lock().unwrap(), Some("recovered"));
    }

    #[test]
    fn then_adopts_inner_promise() {
        let queue = test_queue();
        let (defer, promise) = Defer::construct(queue.clone());
        let observed = Arc::new(std::sync::Mutex::new(None));
        let observed2 = observed.clone();
        let inner_queue = queue.clone();
        promise
            .then(move |x: i32| Promise::fulfilled(inner_queue.clone(), x + 10))
            .then(move |x: i32| {
                *observed2.lock().unwrap() = Some(x);
            })
            .done();
        defer.set_value(1);
        drain(&queue);
        assert_eq!(*observed.lock().unwrap(), Some(11));
    }

    #[test]
    fn dropped_defer_resolves_as_abandoned() {
        let queue = test_queue();
        let (defer, promise): (Defer<i32>, Promise<i32>) = Defer::construct(queue.clone());
        let observed = Arc::new(std::sync::Mutex::new(None));
        let observed2 = observed.clone();
        promise
            .fail(move |err| {
                observed2.lock().unwrap().replace(err.is_kind(&CoreErrorKind::Abandoned));
                0
            })
            .done();
        drop(defer);
        drain(&queue);
        assert_eq!(*observed.lock().unwrap(), Some(true));
    }
}
