//! `Readable<T>` — the consumer-side handle onto a channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::error::CoreError;
use crate::promise::{Defer, Promise, SharedPromise};
use crate::queue::Queue;

use super::state::ChannelState;
use super::writable::Writable;

/// Concurrency knobs for [`Readable::consume`].
#[derive(Clone, Debug)]
pub struct ConsumeOptions {
    /// Up to this many `fn` invocations may be in flight at once.
    pub concurrency: usize,
}

impl Default for ConsumeOptions {
    fn default() -> Self {
        ConsumeOptions { concurrency: 1 }
    }
}

/// The consumer side of a bounded MPMC channel. `Clone`-able: every clone
/// increments the channel's reader count, and the channel closes once the
/// last clone drops (spec.md §4.5).
pub struct Readable<T: Send + 'static> {
    pub(crate) state: Arc<ChannelState<T>>,
    pub(crate) queue: Arc<Queue>,
    pub(crate) reader_count: Arc<CachePadded<AtomicUsize>>,
}

impl<T: Send + 'static> Readable<T> {
    /// A promise for the next value. Resolves on this handle's default
    /// queue from the buffer if non-empty; otherwise waits for the next
    /// `write()` or for the channel to close.
    pub fn read(&self) -> Promise<T> {
        let queue = self.queue.clone();
        let mut registered_promise = None;
        let outcome = self.state.pop_or_register(|| {
            let (defer, promise) = Defer::construct(queue.clone());
            registered_promise = Some(promise);
            defer
        });
        match outcome {
            super::state::PopOrRegister::Value(value) => Promise::fulfilled(queue, value),
            super::state::PopOrRegister::Closed(error) => Promise::failed(queue, error),
            super::state::PopOrRegister::Registered => {
                registered_promise.expect("Registered outcome always builds its promise")
            }
        }
    }

    /// Close the channel (and every other handle onto it) with `error`.
    /// Equivalent to [`Writable::close_with`], reachable from the consumer
    /// side since a panic inside `read_with`'s `on_value` must be able to
    /// close the channel without holding a `Writable`.
    pub fn close_with(&self, error: CoreError) {
        self.state.close(Some(error));
    }

    /// Fast path: invokes `on_value`/`on_close` directly instead of
    /// returning a `Promise<T>`, returning whether a value was delivered.
    /// Any error raised by the callback closes this readable end with that
    /// error (propagated via panic→error conversion), the same
    /// panic→`CoreError` treatment the dispatcher worker loop gives a
    /// panicking task.
    pub fn read_with<V, C>(&self, on_value: V, on_close: C) -> Promise<bool>
    where
        V: FnOnce(T) + Send + 'static,
        C: FnOnce(CoreError) + Send + 'static,
    {
        let queue = self.queue.clone();
        let reader = self.clone();
        self.read().then(move |value: T| match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| on_value(value))) {
            Ok(()) => true,
            Err(_payload) => {
                reader.close_with(CoreError::domain(
                    "channel.read_with_panicked",
                    "read_with on_value callback panicked",
                ));
                false
            }
        }).fail(move |error: CoreError| {
            // Fires regardless of kind: `close_with` lets an application
            // close a channel with any error, not only `ChannelClosed`.
            on_close(error);
            false
        }).set_default(queue)
    }

    /// Forward each value read to `destination`; when this channel closes,
    /// closes `destination` with the same outcome. Backpressure from
    /// `destination` pauses this source via `set_resume_notification`.
    pub fn pipe(&self, destination: Writable<T>) {
        pipe_next(self.clone(), destination);
    }

    /// Drain the channel, invoking `fn_` on each value; up to
    /// `opts.concurrency` invocations may be in flight if `fn_` returns a
    /// promise. Resolves when the channel closes cleanly, rejects on the
    /// first error (from either `fn_` or the channel).
    pub fn consume<R, F>(self, fn_: F, opts: ConsumeOptions) -> Promise<()>
    where
        R: Into<crate::promise::Continued<()>>,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let queue = self.queue.clone();
        let fn_ = Arc::new(fn_);
        let (defer, result) = Defer::construct(queue.clone());
        let defer = Arc::new(std::sync::Mutex::new(Some(defer)));
        let concurrency = opts.concurrency.max(1);
        for _ in 0..concurrency {
            spawn_consume_worker(self.clone(), fn_.clone(), defer.clone());
        }
        result
    }
}

fn spawn_consume_worker<T, R, F>(
    reader: Readable<T>,
    fn_: Arc<F>,
    defer: Arc<std::sync::Mutex<Option<Defer<()>>>>,
) where
    T: Send + 'static,
    R: Into<crate::promise::Continued<()>>,
    F: Fn(T) -> R + Send + Sync + 'static,
{
    reader
        .read()
        .then(move |value: T| {
            match fn_(value).into() {
                crate::promise::Continued::Value(()) => {
                    spawn_consume_worker(reader, fn_, defer);
                }
                crate::promise::Continued::Rejected(error) => {
                    if let Some(defer) = defer.lock().unwrap().take() {
                        defer.set_exception(error);
                    }
                }
                crate::promise::Continued::Inner(inner) => {
                    let defer2 = defer.clone();
                    inner
                        .then(move |()| {
                            spawn_consume_worker(reader, fn_, defer2);
                        })
                        .done();
                }
            }
        })
        .fail(move |error: CoreError| {
            if error.is_kind(&crate::error::CoreErrorKind::ChannelClosed) {
                if let Some(defer) = defer.lock().unwrap().take() {
                    defer.set_value(());
                }
            } else if let Some(defer) = defer.lock().unwrap().take() {
                defer.set_exception(error);
            }
        })
        .done();
}

fn pipe_next<T: Send + 'static>(reader: Readable<T>, destination: Writable<T>) {
    let destination_for_fail = destination.clone();
    reader
        .read()
        .then(move |value: T| {
            destination.write(value);
            if destination.should_write() {
                pipe_next(reader, destination);
            } else {
                let reader_for_resume = reader;
                destination.set_resume_notification(move || pipe_next(reader_for_resume, destination));
            }
        })
        .fail(move |error: CoreError| {
            destination_for_fail.close_with(error);
        })
        .done();
}

impl<T: Send + 'static> Clone for Readable<T> {
    fn clone(&self) -> Self {
        self.reader_count.fetch_add(1, Ordering::SeqCst);
        Readable {
            state: self.state.clone(),
            queue: self.queue.clone(),
            reader_count: self.reader_count.clone(),
        }
    }
}

impl<T: Send + 'static> Drop for Readable<T> {
    fn drop(&mut self) {
        if self.reader_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.close(None);
        }
    }
}

/// `Channel<Promise<T>>` auto-unwrap: a read resolves with the inner
/// promise's outcome rather than the `Promise<T>` value itself. Named
/// distinctly from [`Readable::read`] rather than overriding it — Rust has
/// no template specialization to pick this impl over the generic one for
/// `T = Promise<U>`, so the two call sites are spelled differently
/// (documented as a deliberate simplification in `DESIGN.md`).
impl<U: Send + 'static> Readable<Promise<U>> {
    /// Read the next `Promise<U>` off the channel and adopt its outcome.
    /// If the inner promise rejects, this read rejects with the same
    /// error, but the channel itself remains open for subsequent reads.
    pub fn read_unwrapped(&self) -> Promise<U> {
        self.read().then(|inner: Promise<U>| inner)
    }
}

impl<U: Clone + Send + 'static> Readable<SharedPromise<U>> {
    /// [`Readable::read_unwrapped`] for a channel of `SharedPromise<U>`.
    pub fn read_unwrapped(&self) -> Promise<U> {
        self.read().then(|inner: SharedPromise<U>| inner.then(|value: U| value))
    }
}
