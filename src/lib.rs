#![deny(unsafe_code)]
#![doc = "tether-rt: a cooperative, callback-continuation concurrency substrate."]
#![doc = ""]
#![doc = "This crate provides `Expect<T>`/`Promise<T>`/`Defer<T>`/`SharedPromise<T>`"]
#![doc = "value propagation, a bounded multi-producer/multi-consumer `Channel<T>`,"]
#![doc = "and the `Task`/`Queue`/`Scheduler`/`Dispatcher` layer that drives them."]
#![doc = "Deliberately not built on `async fn`/`Future`: continuations run"]
#![doc = "synchronously on whichever dispatcher worker observes them ready,"]
#![doc = "the same execution model as the host library this substrate was"]
#![doc = "distilled from."]

mod sealed;

pub mod channel;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod expect;
pub mod function;
pub mod observability;
pub mod promise;
pub mod queue;
pub mod scheduler;
pub mod task;
pub mod time;

pub use channel::{channel, ChannelOptions, ConsumeOptions, Readable, Writable};
pub use context::ExecutionContext;
pub use dispatcher::{
    BlockingDispatcher, BlockingDispatcherHandle, Dispatcher, DispatcherOptions, DispatcherState,
    TerminationMode, ThreadPoolDispatcher, ThreadPoolOptions,
};
pub use error::{CoreError, CoreErrorKind, ErrorCause, ErrorLocation};
pub use expect::Expect;
pub use function::{SharedFn, UniqueFn};
pub use observability::{default_logger, LogRecord, LogSeverity, Logger};
pub use promise::{
    all, all3, all4, all5, all_vec, make_promise, make_promise_with, CombinedFailure, Continued, Defer, Promise,
    SharedPromise,
};
pub use queue::Queue;
pub use scheduler::{DirectScheduler, PriorityScheduler, TaskSource};
pub use task::Task;
pub use time::MonotonicTimePoint;
