//! Shared channel state: the buffer, the reader wait list, and the closed
//! flag, guarded by one mutex per spec.md §5 ("each Channel has its own
//! mutex guarding the buffer, reader list, and closed flag").

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::CoreError;
use crate::promise::Defer;
use crate::queue::Queue;

pub(crate) struct ResumeNotification {
    pub(crate) queue: Arc<Queue>,
    pub(crate) run: Box<dyn FnOnce() + Send>,
}

pub(crate) struct Inner<T: Send + 'static> {
    pub(crate) buffer: VecDeque<T>,
    pub(crate) readers: VecDeque<Defer<T>>,
    pub(crate) closed: Option<CoreError>,
    pub(crate) resume: Option<ResumeNotification>,
    pub(crate) paused: bool,
    capacity: usize,
    resume_threshold: usize,
}

/// State shared by every `Writable<T>`/`Readable<T>` handle onto one
/// channel.
pub(crate) struct ChannelState<T: Send + 'static> {
    pub(crate) inner: Mutex<Inner<T>>,
}

impl<T: Send + 'static> ChannelState<T> {
    pub(crate) fn new(capacity: usize, resume_threshold: usize) -> Self {
        ChannelState {
            inner: Mutex::new(Inner {
                buffer: VecDeque::new(),
                readers: VecDeque::new(),
                closed: None,
                resume: None,
                paused: false,
                capacity,
                resume_threshold,
            }),
        }
    }

    /// Hand `value` to the oldest waiting reader, or buffer it; returns
    /// `false` if the channel was already closed.
    pub(crate) fn write(&self, value: T) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed.is_some() {
            return false;
        }
        if let Some(waiter) = inner.readers.pop_front() {
            drop(inner);
            waiter.set_value(value);
            return true;
        }
        inner.buffer.push_back(value);
        if inner.buffer.len() >= inner.capacity {
            inner.paused = true;
        }
        true
    }

    /// `false` while paused or closed.
    pub(crate) fn should_write(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.closed.is_none() && !inner.paused
    }

    /// Install a one-shot callback fired the next time buffered drops below
    /// the resume threshold. Overwrites any previously armed callback.
    pub(crate) fn set_resume_notification(&self, queue: Arc<Queue>, run: Box<dyn FnOnce() + Send>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.paused {
            inner.resume = Some(ResumeNotification { queue, run });
        } else {
            // Already below threshold; fire immediately rather than
            // waiting for a transition that already happened.
            drop(inner);
            queue.push(crate::task::Task::immediate(run));
        }
    }

    /// Atomically either pop a buffered value, observe the channel already
    /// closed, or register a fresh reader built by `make_defer` — decided
    /// under a single lock acquisition so a racing `write()`/`close()`
    /// between an empty-check and a separate registration call can never
    /// steal a value meant for this call (spec.md §8 invariant 4, channel
    /// FIFO).
    pub(crate) fn pop_or_register(&self, make_defer: impl FnOnce() -> Defer<T>) -> PopOrRegister<T> {
        let (outcome, resume) = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(value) = inner.buffer.pop_front() {
                let resume = if inner.paused && inner.buffer.len() < inner.resume_threshold {
                    inner.paused = false;
                    inner.resume.take()
                } else {
                    None
                };
                (PopOrRegister::Value(value), resume)
            } else if let Some(error) = inner.closed.clone() {
                (PopOrRegister::Closed(error), None)
            } else {
                inner.readers.push_back(make_defer());
                (PopOrRegister::Registered, None)
            }
        };
        if let Some(notification) = resume {
            notification.queue.push(crate::task::Task::immediate(notification.run));
        }
        outcome
    }

    /// Close the channel with `error`, or `CoreError::channel_closed()` if
    /// `None`. Idempotent: only the first call has any effect. Every
    /// waiting reader is resolved with the closing error, and any armed
    /// resume notification fires under the same lock hand-off — a producer
    /// that called `set_resume_notification` while paused must not be left
    /// waiting forever just because the channel closed instead of draining
    /// below the threshold.
    pub(crate) fn close(&self, error: Option<CoreError>) {
        let (error, waiters, resume) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed.is_some() {
                return;
            }
            let error = error.unwrap_or_else(CoreError::channel_closed);
            inner.closed = Some(error.clone());
            inner.paused = false;
            (error, std::mem::take(&mut inner.readers), inner.resume.take())
        };
        for waiter in waiters {
            waiter.set_exception(error.clone());
        }
        if let Some(notification) = resume {
            notification.queue.push(crate::task::Task::immediate(notification.run));
        }
    }
}

/// The outcome of [`ChannelState::pop_or_register`].
pub(crate) enum PopOrRegister<T: Send + 'static> {
    /// A buffered value was available.
    Value(T),
    /// The channel was already closed; no defer was constructed.
    Closed(CoreError),
    /// The buffer was empty and the channel open; the defer built by
    /// `make_defer` was registered as a waiting reader.
    Registered,
}
