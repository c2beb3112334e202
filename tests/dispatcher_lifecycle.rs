//! End-to-end scenarios driving a scheduler + dispatcher + channel
//! together, the way an application assembles this crate's pieces.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tether_rt::{
    channel, BlockingDispatcher, ChannelOptions, DirectScheduler, DispatcherOptions,
    DispatcherState, Queue, Task, TaskSource, TerminationMode, ThreadPoolDispatcher,
    ThreadPoolOptions,
};

#[test]
fn blocking_dispatcher_drives_a_channel_consumer_to_completion() {
    let queue = Arc::new(Queue::new(0));
    let scheduler: Arc<dyn TaskSource> = Arc::new(DirectScheduler::new(vec![queue.clone()]));
    let dispatcher = Arc::new(BlockingDispatcher::new(scheduler, DispatcherOptions::named("consumer")));
    queue.attach_dispatcher(Arc::new(dispatcher.handle()));

    let (writer, reader) = channel::<i32>(queue.clone(), ChannelOptions::new(16));
    let total = Arc::new(AtomicUsize::new(0));
    let total2 = total.clone();
    reader
        .consume(
            move |v: i32| {
                total2.fetch_add(v as usize, Ordering::SeqCst);
            },
            Default::default(),
        )
        .done();

    let handle = dispatcher.handle();
    let runner = {
        let dispatcher = dispatcher.clone();
        std::thread::spawn(move || dispatcher.start())
    };

    for i in 1..=10 {
        writer.write(i);
    }
    drop(writer);

    std::thread::sleep(Duration::from_millis(30));
    handle.terminate(TerminationMode::Linger);
    handle.await_termination().rethrow_on_exception().unwrap();
    runner.join().unwrap();

    assert_eq!(total.load(Ordering::SeqCst), 55);
    assert_eq!(handle.state(), DispatcherState::Terminated);
}

#[test]
fn thread_pool_dispatcher_runs_every_task_exactly_once() {
    let queue = Arc::new(Queue::new(0));
    let scheduler: Arc<dyn TaskSource> = Arc::new(DirectScheduler::new(vec![queue.clone()]));
    let dispatcher = ThreadPoolDispatcher::new(scheduler, ThreadPoolOptions::new(3, "fan-out"));

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..200 {
        let counter = counter.clone();
        queue.push(Task::immediate(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    }

    dispatcher.start();
    std::thread::sleep(Duration::from_millis(50));
    dispatcher.terminate(TerminationMode::Linger);
    dispatcher.await_termination().rethrow_on_exception().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 200);
}
