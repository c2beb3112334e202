//! A bounded, back-pressured multi-producer/multi-consumer channel.
//!
//! Grounded in the teacher crate's `pipeline::Channel` (a bounded buffer
//! guarded by one lock, with a paused/resumed flow-control flag) but
//! reworked onto this crate's promise primitives: a waiting reader is a
//! stored [`crate::promise::Defer`] rather than a raw waker, so resolving
//! it is just `set_value`/`set_exception` (spec.md §4.8).

mod readable;
mod state;
mod writable;

pub use readable::{ConsumeOptions, Readable};
pub use writable::Writable;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::queue::Queue;
use state::ChannelState;

/// Construction-time knobs for [`channel`].
#[derive(Clone, Copy, Debug)]
pub struct ChannelOptions {
    /// Values may buffer up to this many entries before `should_write`
    /// reports back-pressure.
    pub capacity: usize,
    /// Buffered count must drop to (strictly) below this before a paused
    /// writer's resume notification fires. Defaults to `3 * capacity / 4`.
    pub resume_threshold: Option<usize>,
}

impl ChannelOptions {
    /// A channel with the given capacity and the default resume threshold.
    pub fn new(capacity: usize) -> Self {
        ChannelOptions {
            capacity,
            resume_threshold: None,
        }
    }

    /// Override the resume threshold explicitly.
    pub fn with_resume_threshold(mut self, resume_threshold: usize) -> Self {
        self.resume_threshold = Some(resume_threshold);
        self
    }

    fn resolved_resume_threshold(&self) -> usize {
        self.resume_threshold
            .unwrap_or_else(|| (3 * self.capacity) / 4)
    }
}

/// Build a bounded channel, returning its write and read ends. Both ends
/// are `Clone`-able; the channel closes itself once the last `Writable`
/// clone drops (clean close) or the last `Readable` clone drops (spec.md
/// §4.8, "automatic close on handle drop").
pub fn channel<T: Send + 'static>(queue: Arc<Queue>, options: ChannelOptions) -> (Writable<T>, Readable<T>) {
    let state = Arc::new(ChannelState::new(options.capacity, options.resolved_resume_threshold()));
    let writer_count = Arc::new(CachePadded::new(AtomicUsize::new(1)));
    let reader_count = Arc::new(CachePadded::new(AtomicUsize::new(1)));
    let writable = Writable {
        state: state.clone(),
        queue: queue.clone(),
        writer_count,
    };
    let readable = Readable {
        state,
        queue,
        reader_count,
    };
    (writable, readable)
}
