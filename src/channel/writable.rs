//! `Writable<T>` — the producer-side handle onto a channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::error::CoreError;
use crate::queue::Queue;

use super::state::ChannelState;

/// The producer side of a bounded MPMC channel. `Clone`-able: every clone
/// increments the channel's writer count, and the channel closes with no
/// error once the last clone drops (spec.md §4.5, "automatic close on
/// handle drop").
pub struct Writable<T: Send + 'static> {
    pub(crate) state: Arc<ChannelState<T>>,
    pub(crate) queue: Arc<Queue>,
    // Cache-padded: every clone/drop on any producer thread bumps this
    // same counter, so it sits on its own cache line rather than next to
    // `state`/`queue`'s pointers.
    pub(crate) writer_count: Arc<CachePadded<AtomicUsize>>,
}

impl<T: Send + 'static> Writable<T> {
    /// Push `value` onto the channel, or hand it directly to the oldest
    /// waiting reader. Returns `false` if the channel is already closed.
    pub fn write(&self, value: T) -> bool {
        self.state.write(value)
    }

    /// `false` while paused (buffered has reached capacity) or closed.
    pub fn should_write(&self) -> bool {
        self.state.should_write()
    }

    /// Arm a one-shot callback, run on this handle's default queue, fired
    /// the next time buffered drops below the resume threshold. If the
    /// channel is not currently paused, fires on the next queue turn
    /// instead of waiting for a transition that will never come.
    pub fn set_resume_notification(&self, run: impl FnOnce() + Send + 'static) {
        self.state.set_resume_notification(self.queue.clone(), Box::new(run));
    }

    /// Close with `CoreError::channel_closed()`.
    pub fn close(&self) {
        self.state.close(None);
    }

    /// Close with an explicit error; every waiting reader observes it.
    pub fn close_with(&self, error: CoreError) {
        self.state.close(Some(error));
    }
}

impl<T: Send + 'static> Clone for Writable<T> {
    fn clone(&self) -> Self {
        self.writer_count.fetch_add(1, Ordering::SeqCst);
        Writable {
            state: self.state.clone(),
            queue: self.queue.clone(),
            writer_count: self.writer_count.clone(),
        }
    }
}

impl<T: Send + 'static> Drop for Writable<T> {
    fn drop(&mut self) {
        if self.writer_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.close(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{channel, ChannelOptions};
    use crate::error::CoreError;
    use crate::time::MonotonicTimePoint;

    fn drain(queue: &Queue) {
        let now = MonotonicTimePoint::now();
        while let Some(task) = queue.pop_ready(now) {
            task.run();
        }
    }

    #[test]
    fn write_to_closed_channel_returns_false() {
        let queue = Arc::new(Queue::new(0));
        let (writer, reader) = channel::<i32>(queue, ChannelOptions::new(2));
        writer.close();
        assert!(!writer.write(1));
        drop(reader);
    }

    #[test]
    fn cloned_writer_keeps_channel_open_until_all_drop() {
        let queue = Arc::new(Queue::new(0));
        let (writer, reader) = channel::<i32>(queue.clone(), ChannelOptions::new(2));
        let second = writer.clone();
        drop(writer);
        assert!(second.should_write());
        assert!(second.write(1));
        drop(second);

        let closed = Arc::new(std::sync::Mutex::new(false));
        let closed2 = closed.clone();
        reader.read().then(move |_: i32| {}).fail(move |_: CoreError| {
            *closed2.lock().unwrap() = true;
        }).done();
        drain(&queue);
        // The buffered value is delivered before the close (from the
        // second writer's drop) reaches this reader.
        let closed3 = closed.clone();
        reader.read().fail(move |_: CoreError| {
            *closed3.lock().unwrap() = true;
        }).done();
        drain(&queue);
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn close_with_is_idempotent() {
        let queue = Arc::new(Queue::new(0));
        let (writer, reader) = channel::<i32>(queue, ChannelOptions::new(2));
        writer.close_with(CoreError::domain("demo.boom", "boom"));
        writer.close_with(CoreError::domain("demo.other", "ignored"));
        assert!(!writer.write(1));
        drop(reader);
    }
}
