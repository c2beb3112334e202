//! Black-box scenarios for promise chaining, recovery, and adoption.

use std::sync::{Arc, Mutex};

use tether_rt::{CoreError, CoreErrorKind, Defer, MonotonicTimePoint, Promise, Queue};

fn drain(queue: &Queue) {
    let now = MonotonicTimePoint::now();
    while let Some(task) = queue.pop_ready(now) {
        task.run();
    }
}

#[test]
fn serial_chain_transforms_value() {
    let queue = Arc::new(Queue::new(0));
    let observed = Arc::new(Mutex::new(None));
    let observed2 = observed.clone();
    Promise::fulfilled(queue.clone(), 5)
        .then(|x: i32| x + 1)
        .then(|x: i32| x * 2)
        .then(move |x: i32| *observed2.lock().unwrap() = Some(x))
        .done();
    drain(&queue);
    assert_eq!(*observed.lock().unwrap(), Some(12));
}

#[test]
fn error_recovery_restores_the_chain() {
    let queue = Arc::new(Queue::new(0));
    let observed = Arc::new(Mutex::new(None));
    let observed2 = observed.clone();
    Promise::<()>::fulfilled(queue.clone(), ())
        .then(|_: ()| -> Result<&'static str, CoreError> { Err(CoreError::domain("demo.boom", "boom")) })
        .fail(|_err: CoreError| "recovered")
        .then(move |s: &'static str| *observed2.lock().unwrap() = Some(s))
        .done();
    drain(&queue);
    assert_eq!(*observed.lock().unwrap(), Some("recovered"));
}

#[test]
fn adoption_flattens_an_inner_promise() {
    let queue = Arc::new(Queue::new(0));
    let observed = Arc::new(Mutex::new(None));
    let observed2 = observed.clone();
    let inner_queue = queue.clone();
    Promise::fulfilled(queue.clone(), 1)
        .then(move |x: i32| tether_rt::make_promise(inner_queue.clone(), move || x + 10))
        .then(move |x: i32| *observed2.lock().unwrap() = Some(x))
        .done();
    drain(&queue);
    assert_eq!(*observed.lock().unwrap(), Some(11));
}

#[test]
fn all_vec_mixed_outcomes_surfaces_combined_failure() {
    let queue = Arc::new(Queue::new(0));
    let promises = vec![
        Promise::fulfilled(queue.clone(), 3),
        Promise::failed(queue.clone(), CoreError::domain("demo.boom", "boom")),
        Promise::fulfilled(queue.clone(), 5),
    ];
    let observed: Arc<Mutex<Option<Vec<bool>>>> = Arc::new(Mutex::new(None));
    let observed2 = observed.clone();
    tether_rt::all_vec(promises, queue.clone())
        .fail(move |error: CoreError| {
            assert!(error.is_kind(&CoreErrorKind::CombinedFailure));
            let cause = error
                .cause()
                .expect("CombinedFailure cause attached")
                .downcast_ref::<tether_rt::CombinedFailure<i32>>()
                .expect("cause downcasts to CombinedFailure<i32>");
            let flags = cause.outcomes().iter().map(|o| o.has_exception()).collect();
            *observed2.lock().unwrap() = Some(flags);
            Vec::new()
        })
        .done();
    drain(&queue);
    assert_eq!(*observed.lock().unwrap(), Some(vec![false, true, false]));
}

#[test]
fn abandoned_defer_rejects_with_abandoned_kind() {
    let queue = Arc::new(Queue::new(0));
    let (defer, promise): (Defer<i32>, Promise<i32>) = Defer::construct(queue.clone());
    let observed = Arc::new(Mutex::new(false));
    let observed2 = observed.clone();
    promise
        .fail(move |error: CoreError| {
            *observed2.lock().unwrap() = error.is_kind(&CoreErrorKind::Abandoned);
            0
        })
        .done();
    drop(defer);
    drain(&queue);
    assert!(*observed.lock().unwrap());
}
