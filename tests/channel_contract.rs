//! Black-box scenarios for the bounded channel's FIFO, close, and
//! backpressure contracts.

use std::sync::{Arc, Mutex};

use tether_rt::{channel, ChannelOptions, CoreError, CoreErrorKind, MonotonicTimePoint, Queue};

fn drain(queue: &Queue) {
    let now = MonotonicTimePoint::now();
    while let Some(task) = queue.pop_ready(now) {
        task.run();
    }
}

#[test]
fn fifo_delivery_survives_interleaved_writes_and_reads() {
    let queue = Arc::new(Queue::new(0));
    let (writer, reader) = channel::<i32>(queue.clone(), ChannelOptions::new(8));
    let seen = Arc::new(Mutex::new(Vec::new()));

    writer.write(1);
    let seen2 = seen.clone();
    reader.read().then(move |v: i32| seen2.lock().unwrap().push(v)).done();
    writer.write(2);
    writer.write(3);
    let seen3 = seen.clone();
    reader.read().then(move |v: i32| seen3.lock().unwrap().push(v)).done();
    let seen4 = seen.clone();
    reader.read().then(move |v: i32| seen4.lock().unwrap().push(v)).done();

    drain(&queue);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn closing_with_capacity_two_and_threshold_one_rejects_waiting_readers() {
    let queue = Arc::new(Queue::new(0));
    let (writer, reader) = channel::<i32>(
        queue.clone(),
        ChannelOptions::new(2).with_resume_threshold(1),
    );
    assert!(writer.write(10));
    assert!(writer.write(20));
    assert!(!writer.should_write());

    let paused = Arc::new(Mutex::new(false));
    let paused2 = paused.clone();
    writer.set_resume_notification(move || *paused2.lock().unwrap() = true);
    drain(&queue);
    assert!(!*paused.lock().unwrap());

    reader.read().done();
    drain(&queue);
    assert!(*paused.lock().unwrap());

    let errors = Arc::new(Mutex::new(0usize));
    for _ in 0..2 {
        let errors = errors.clone();
        reader
            .read()
            .fail(move |error: CoreError| {
                assert!(error.is_kind(&CoreErrorKind::ChannelClosed));
                *errors.lock().unwrap() += 1;
            })
            .done();
    }
    writer.close();
    drain(&queue);
    assert_eq!(*errors.lock().unwrap(), 2);
}

#[test]
fn close_with_custom_error_reaches_read_with_on_close() {
    let queue = Arc::new(Queue::new(0));
    let (writer, reader) = channel::<i32>(queue.clone(), ChannelOptions::new(1));
    let observed = Arc::new(Mutex::new(None));
    let observed2 = observed.clone();
    reader
        .read_with(move |_: i32| {}, move |error: CoreError| {
            *observed2.lock().unwrap() = Some(error.is_kind(&CoreErrorKind::Domain("demo.shutdown")));
        })
        .done();
    writer.close_with(CoreError::domain("demo.shutdown", "shutting down"));
    drain(&queue);
    assert_eq!(*observed.lock().unwrap(), Some(true));
}
