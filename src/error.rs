//! Unified error carrier for the substrate.
//!
//! # Design background (Why)
//! - Every producer in this crate — a `Defer`, a `Channel`, a `Dispatcher` —
//!   needs to hand callers a value that can travel along a promise chain,
//!   be matched on by `fail`, and still carry an arbitrary application
//!   cause. `std::error::Error` alone does not give us a stable, matchable
//!   "kind"; a hand-rolled sum type does.
//! - This is the "replace `std::exception_ptr` with a sum type whose
//!   variants are the declared error kinds plus a `Boxed(opaque)` fallback"
//!   redesign called for by the concurrency substrate this crate implements.
//!
//! # Contract
//! - `CoreError::code()` is a stable, human- and machine-readable key.
//! - `CoreError::cause()` optionally exposes the upstream error for
//!   diagnostics; it is never required for correct propagation.
//! - Constructing a `CoreError` always requires a message; there is no
//!   "empty" error (this is also the `InvalidException` contract: refusing
//!   a promise with nothing is a programming error, not a valid state).

use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// The upstream cause of a [`CoreError`], `Arc`-boxed so a `CoreError` stays
/// `Clone` — required to hand every `SharedPromise` observer an equal
/// outcome without re-running whatever produced the error.
pub type ErrorCause = Arc<dyn StdError + Send + Sync + 'static>;

/// The declared kind of a [`CoreError`], used by `fail`/`fail_kind` to
/// decide whether a recovery handler should run.
///
/// # Contract
/// - `Domain` carries an application-chosen stable string; everything else
///   is a substrate-defined lifecycle error.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreErrorKind {
    /// The channel is closed; no further reads will ever succeed.
    ChannelClosed,
    /// A [`crate::function::UniqueFn`]/[`crate::function::SharedFn`] was
    /// invoked while empty.
    BadFunctionCall,
    /// `refuse`/`set_exception` was called with no usable cause.
    InvalidException,
    /// A `Defer` was dropped without resolving its promise.
    Abandoned,
    /// The vector form of `all()` rejected; see
    /// [`crate::promise::compose::CombinedFailure`].
    CombinedFailure,
    /// One variant per POSIX errno, surfaced by I/O collaborators.
    Errno(i32),
    /// An application-defined error kind, named by a stable string.
    Domain(&'static str),
}

impl fmt::Display for CoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreErrorKind::ChannelClosed => write!(f, "channel_closed"),
            CoreErrorKind::BadFunctionCall => write!(f, "bad_function_call"),
            CoreErrorKind::InvalidException => write!(f, "invalid_exception"),
            CoreErrorKind::Abandoned => write!(f, "abandoned"),
            CoreErrorKind::CombinedFailure => write!(f, "combined_failure"),
            CoreErrorKind::Errno(n) => write!(f, "errno({n})"),
            CoreErrorKind::Domain(name) => write!(f, "domain({name})"),
        }
    }
}

/// The origin location of a [`CoreError`], captured at `refuse`/
/// `set_exception` call sites via `#[track_caller]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLocation {
    file: &'static str,
    line: u32,
    column: u32,
}

impl ErrorLocation {
    fn captured(location: &Location<'_>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The universal error carrier that flows through `Expect<T>`, `Promise`
/// combinators, and channel close paths.
#[derive(Debug, Clone)]
pub struct CoreError {
    kind: CoreErrorKind,
    message: String,
    cause: Option<ErrorCause>,
    location: Option<ErrorLocation>,
}

impl CoreError {
    /// Construct an error of the given kind with a human-readable message.
    ///
    /// # Design background (Why)
    /// - `#[track_caller]` captures the call site rather than requiring
    ///   every caller to thread a location through by hand; this is the
    ///   same tradeoff the substrate's `Defer::drop` abandonment path and
    ///   channel close paths rely on to report where a failure originated
    ///   without an explicit backtrace capture.
    ///
    /// # Contract
    /// - The returned error has no cause and no kind-specific default
    ///   message beyond what `message` supplies; callers needing a
    ///   standard wording should prefer one of the named constructors
    ///   below (`channel_closed`, `abandoned`, …) instead.
    #[track_caller]
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            location: Some(ErrorLocation::captured(Location::caller())),
        }
    }

    /// An application error identified by a stable name.
    #[track_caller]
    pub fn domain(name: &'static str, message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Domain(name), message)
    }

    /// The `ChannelClosed` error used when no explicit close cause was
    /// supplied.
    #[track_caller]
    pub fn channel_closed() -> Self {
        Self::new(CoreErrorKind::ChannelClosed, "channel closed")
    }

    /// The `Abandoned` error installed when a `Defer` is dropped without a
    /// terminal setter call.
    #[track_caller]
    pub fn abandoned() -> Self {
        Self::new(
            CoreErrorKind::Abandoned,
            "promise abandoned: defer dropped without resolving",
        )
    }

    /// The `BadFunctionCall` error raised by an empty function container.
    #[track_caller]
    pub fn bad_function_call() -> Self {
        Self::new(CoreErrorKind::BadFunctionCall, "function container empty")
    }

    /// The `InvalidException` error raised when refusing with no cause.
    #[track_caller]
    pub fn invalid_exception() -> Self {
        Self::new(
            CoreErrorKind::InvalidException,
            "refuse() called with no exception payload",
        )
    }

    /// Attach an upstream cause, forming an error chain.
    ///
    /// # Trade-offs
    /// - The cause is `Arc`-boxed, not `Box`-boxed: a `CoreError` must stay
    ///   `Clone` so a `SharedPromise` can hand every observer an equal
    ///   outcome, and a move-only `Box<dyn Error>` would make that
    ///   impossible without re-running whatever produced the failure.
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// The declared error kind, used for `fail`/`fail_kind` matching.
    pub fn kind(&self) -> &CoreErrorKind {
        &self.kind
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The optional upstream cause.
    pub fn cause(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn StdError + 'static))
    }

    /// Where this error was raised, if captured.
    pub fn location(&self) -> Option<ErrorLocation> {
        self.location
    }

    /// `true` if this error's kind matches `kind` (by `Eq`, so `Domain`
    /// comparisons key off the stable name and `Errno` off the code).
    pub fn is_kind(&self, kind: &CoreErrorKind) -> bool {
        &self.kind == kind
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause()
    }
}

/// Stable error-code constants, mirroring the teacher crate's `error::codes`
/// module so logs and metrics can key on a fixed vocabulary.
pub mod codes {
    /// A channel observed a read or write after `close()`.
    pub const CHANNEL_CLOSED: &str = "channel.closed";
    /// A promise's function container was invoked while empty.
    pub const FUNCTION_BAD_CALL: &str = "promise.bad_function_call";
    /// A `Defer` was dropped without resolving.
    pub const PROMISE_ABANDONED: &str = "promise.abandoned";
    /// A `done()` chain ended with an unhandled error.
    pub const PROMISE_UNCAUGHT: &str = "promise.uncaught_exception";
    /// A dispatcher worker thread failed to start.
    pub const DISPATCHER_SPAWN_FAILED: &str = "dispatcher.spawn_failed";
}
