//! `all()`/`all3()`/`all4()`/`all5()` fan-in and `make_promise()` — spec.md
//! §4.4's variadic `all(Promise<T1>, Promise<T2>, …)` is covered by a
//! hand-written pairwise base case plus three macro-generated siblings
//! rather than one true variadic generic, since Rust has no variadic
//! generics of its own.

use std::sync::{Arc, Mutex};

use crate::error::{CoreError, CoreErrorKind};
use crate::expect::Expect;
use crate::queue::Queue;
use crate::task::Task;

use super::defer::Defer;
use super::unique::Promise;
use super::Continued;

/// Schedule `fn_` on `queue` and resolve the returned promise with its
/// outcome; adoption applies if `fn_` returns a [`Promise<T>`]
/// (spec.md §4.4).
pub fn make_promise<T, R, F>(queue: Arc<Queue>, fn_: F) -> Promise<T>
where
    T: Send + 'static,
    R: Into<Continued<T>>,
    F: FnOnce() -> R + Send + 'static,
{
    let (defer, promise) = Defer::construct(queue.clone());
    queue.push(Task::immediate(move || defer.set_by_fun(fn_)));
    promise
}

/// The two-argument imperative form: `fn_` receives the producer-side
/// [`Defer<T>`] directly rather than separate resolve/reject closures —
/// `Defer` already exposes `set_value`/`set_exception`/`satisfy`, so a
/// single handle covers both without inventing a second vocabulary.
pub fn make_promise_with<T, F>(queue: Arc<Queue>, fn_: F) -> Promise<T>
where
    T: Send + 'static,
    F: FnOnce(Defer<T>) + Send + 'static,
{
    let (defer, promise) = Defer::construct(queue.clone());
    queue.push(Task::immediate(move || fn_(defer)));
    promise
}

/// The aggregate error produced when the vector form of `all()` observes
/// any input reject: exposes every input's outcome, in input order, for
/// diagnostic inspection (spec.md §4.4, §7).
pub struct CombinedFailure<T> {
    outcomes: Vec<Expect<T>>,
}

impl<T> CombinedFailure<T> {
    /// Each input's outcome, in input position order.
    pub fn outcomes(&self) -> &[Expect<T>] {
        &self.outcomes
    }

    fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.has_exception()).count()
    }
}

impl<T> std::fmt::Debug for CombinedFailure<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedFailure")
            .field("len", &self.outcomes.len())
            .field("failed", &self.failed_count())
            .finish()
    }
}

impl<T> std::fmt::Display for CombinedFailure<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} inputs to all() rejected", self.failed_count(), self.outcomes.len())
    }
}

impl<T: Send + Sync + 'static> std::error::Error for CombinedFailure<T> {}

/// `all(Vec<Promise<T>>, queue)` → `Promise<Vec<T>>`, order-preserving.
/// Resolves once every input has resolved; rejects with a
/// [`CombinedFailure`] carrying every input's outcome if any input
/// failed. Input promises that are still pending when one fails
/// continue to run to completion; they are not cancelled (spec.md §9,
/// Non-goals: no cancellation of in-flight work).
pub fn all_vec<T>(promises: Vec<Promise<T>>, queue: Arc<Queue>) -> Promise<Vec<T>>
where
    T: Send + Sync + 'static,
{
    let total = promises.len();
    let (defer, result) = Defer::construct(queue.clone());
    if total == 0 {
        defer.set_value(Vec::new());
        return result;
    }

    let slots: Arc<Mutex<Vec<Option<Expect<T>>>>> = Arc::new(Mutex::new((0..total).map(|_| None).collect()));
    let remaining = Arc::new(std::sync::atomic::AtomicUsize::new(total));
    let defer = Arc::new(Mutex::new(Some(defer)));

    for (index, promise) in promises.into_iter().enumerate() {
        let slots = slots.clone();
        let remaining = remaining.clone();
        let defer = defer.clone();
        promise.register_raw(
            queue.clone(),
            Box::new(move |expect: Expect<T>| {
                slots.lock().unwrap()[index] = Some(expect);
                if remaining.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) == 1 {
                    let outcomes = slots.lock().unwrap().drain(..).map(|o| o.unwrap()).collect::<Vec<_>>();
                    let any_failed = outcomes.iter().any(Expect::has_exception);
                    if let Some(defer) = defer.lock().unwrap().take() {
                        if any_failed {
                            let failure = CombinedFailure { outcomes };
                            let message = failure.to_string();
                            defer.set_exception(
                                CoreError::new(CoreErrorKind::CombinedFailure, message).with_cause(failure),
                            );
                        } else {
                            let values = outcomes.into_iter().map(Expect::consume).collect();
                            defer.set_value(values);
                        }
                    }
                }
            }),
        );
    }

    result
}

/// `all(p1, p2)` → `Promise<(T1, T2)>`: resolves once both inputs have
/// resolved, rejecting with the first error observed (remaining inputs
/// still complete but are discarded, per spec.md §4.4).
pub fn all<T1, T2>(p1: Promise<T1>, p2: Promise<T2>, queue: Arc<Queue>) -> Promise<(T1, T2)>
where
    T1: Send + 'static,
    T2: Send + 'static,
{
    let (defer, result) = Defer::construct(queue.clone());
    let defer = Arc::new(Mutex::new(Some(defer)));
    let slot1: Arc<Mutex<Option<T1>>> = Arc::new(Mutex::new(None));
    let slot2: Arc<Mutex<Option<T2>>> = Arc::new(Mutex::new(None));
    let remaining = Arc::new(std::sync::atomic::AtomicUsize::new(2));

    {
        let defer = defer.clone();
        let slot1 = slot1.clone();
        let slot2 = slot2.clone();
        let remaining = remaining.clone();
        p1.register_raw(
            queue.clone(),
            Box::new(move |expect: Expect<T1>| match expect.rethrow_on_exception() {
                Ok(value) => {
                    *slot1.lock().unwrap() = Some(value);
                    if remaining.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) == 1 {
                        complete_pair(&defer, &slot1, &slot2);
                    }
                }
                Err(error) => {
                    if let Some(defer) = defer.lock().unwrap().take() {
                        defer.set_exception(error);
                    }
                }
            }),
        );
    }
    {
        let defer = defer.clone();
        let slot1 = slot1.clone();
        let slot2 = slot2.clone();
        let remaining = remaining.clone();
        p2.register_raw(
            queue,
            Box::new(move |expect: Expect<T2>| match expect.rethrow_on_exception() {
                Ok(value) => {
                    *slot2.lock().unwrap() = Some(value);
                    if remaining.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) == 1 {
                        complete_pair(&defer, &slot1, &slot2);
                    }
                }
                Err(error) => {
                    if let Some(defer) = defer.lock().unwrap().take() {
                        defer.set_exception(error);
                    }
                }
            }),
        );
    }

    result
}

fn complete_pair<T1: Send + 'static, T2: Send + 'static>(
    defer: &Arc<Mutex<Option<Defer<(T1, T2)>>>>,
    slot1: &Arc<Mutex<Option<T1>>>,
    slot2: &Arc<Mutex<Option<T2>>>,
) {
    if let Some(defer) = defer.lock().unwrap().take() {
        let v1 = slot1.lock().unwrap().take();
        let v2 = slot2.lock().unwrap().take();
        if let (Some(v1), Some(v2)) = (v1, v2) {
            defer.set_value((v1, v2));
        }
    }
}

/// Generates one fixed-arity `all` sibling above the hand-written
/// two-argument form, each following the same first-error-wins fan-in as
/// [`all`] — the `futures::join!`-style tuple fan-in spec.md §4.4's "…"
/// calls for. The per-argument registration loop shares one `complete`
/// closure (built once, cloned per argument) rather than re-deriving the
/// full slot list inside each argument's own closure.
macro_rules! impl_all_tuple {
    ($fn_name:ident; $(($T:ident, $arg:ident, $slot:ident)),+ $(,)?) => {
        /// Resolves once every input has resolved, rejecting with the
        /// first error observed; remaining inputs still complete but are
        /// discarded, matching [`all`]'s two-argument semantics.
        pub fn $fn_name<$($T),+>($($arg: Promise<$T>),+, queue: Arc<Queue>) -> Promise<($($T),+,)>
        where
            $($T: Send + 'static),+
        {
            let (defer, result) = Defer::construct(queue.clone());
            let defer = Arc::new(Mutex::new(Some(defer)));
            $(let $slot: Arc<Mutex<Option<$T>>> = Arc::new(Mutex::new(None));)+

            let complete: Arc<dyn Fn() + Send + Sync> = {
                let defer = defer.clone();
                $(let $slot = $slot.clone();)+
                Arc::new(move || {
                    if let Some(defer) = defer.lock().unwrap().take() {
                        $(let $slot = $slot.lock().unwrap().take();)+
                        if let ($(Some($slot)),+,) = ($($slot),+,) {
                            defer.set_value(($($slot),+,));
                        }
                    }
                })
            };

            let remaining = Arc::new(std::sync::atomic::AtomicUsize::new([$(stringify!($T)),+].len()));

            $({
                let defer = defer.clone();
                let remaining = remaining.clone();
                let slot = $slot.clone();
                let complete = complete.clone();
                $arg.register_raw(
                    queue.clone(),
                    Box::new(move |expect: Expect<$T>| match expect.rethrow_on_exception() {
                        Ok(value) => {
                            *slot.lock().unwrap() = Some(value);
                            if remaining.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) == 1 {
                                complete();
                            }
                        }
                        Err(error) => {
                            if let Some(defer) = defer.lock().unwrap().take() {
                                defer.set_exception(error);
                            }
                        }
                    }),
                );
            })+

            result
        }
    };
}

impl_all_tuple!(all3; (T1, p1, slot1), (T2, p2, slot2), (T3, p3, slot3));
impl_all_tuple!(all4; (T1, p1, slot1), (T2, p2, slot2), (T3, p3, slot3), (T4, p4, slot4));
impl_all_tuple!(all5; (T1, p1, slot1), (T2, p2, slot2), (T3, p3, slot3), (T4, p4, slot4), (T5, p5, slot5));
