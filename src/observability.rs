//! A thin, object-safe logging facade over the [`log`] crate.
//!
//! Every ambient log call in this crate (dispatcher worker panics, task
//! failures, channel close propagation) goes through a [`Logger`]
//! implementation rather than calling `log::*!` macros directly, so a host
//! application can redirect, filter, or silence diagnostics without
//! depending on the `log` crate's global logger being the right one for
//! its process. [`default_logger`] returns the `log`-crate-backed
//! implementation used unless a caller installs another.

use std::fmt;

/// Severity of a [`LogRecord`], mirroring [`log::Level`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Unrecoverable or near-unrecoverable condition (a worker panic).
    Error,
    /// Recoverable but noteworthy (a task failed, a channel closed with an
    /// error while readers were still pending).
    Warn,
    /// Routine lifecycle events (dispatcher started, queue drained).
    Info,
    /// High-volume detail useful only while debugging the runtime itself.
    Trace,
}

impl LogSeverity {
    fn as_log_level(self) -> log::Level {
        match self {
            LogSeverity::Error => log::Level::Error,
            LogSeverity::Warn => log::Level::Warn,
            LogSeverity::Info => log::Level::Info,
            LogSeverity::Trace => log::Level::Trace,
        }
    }
}

/// A single diagnostic event.
pub struct LogRecord<'a> {
    /// Severity of this record.
    pub severity: LogSeverity,
    /// A dotted component path, e.g. `"tether_rt::dispatcher"`.
    pub target: &'a str,
    /// Human-readable message. Already formatted; `Logger` implementations
    /// should not assume any particular structure.
    pub message: fmt::Arguments<'a>,
}

/// An object-safe sink for runtime diagnostics.
///
/// Implementations must be cheap to call from a worker thread mid-loop;
/// blocking I/O belongs behind a channel, not inline in `log`.
pub trait Logger: Send + Sync + crate::sealed::Sealed {
    /// Emit one record. Implementations may filter by severity internally.
    fn log(&self, record: &LogRecord<'_>);
}

/// Forwards every record to the `log` crate's global logger, tagged with
/// the record's target. This is the default used throughout the crate;
/// a host application configures where records end up the same way it
/// would for any other `log`-based dependency (`env_logger`, `tracing`'s
/// `log` bridge, etc.).
pub struct StdLogLogger;

impl Logger for StdLogLogger {
    fn log(&self, record: &LogRecord<'_>) {
        log::log!(target: record.target, record.severity.as_log_level(), "{}", record.message);
    }
}

/// The logger used when no other has been installed via
/// [`crate::context::ExecutionContext`] configuration.
pub fn default_logger() -> &'static dyn Logger {
    &StdLogLogger
}

/// Emit an error-severity record through the default logger.
macro_rules! log_error {
    ($target:expr, $($arg:tt)+) => {
        $crate::observability::default_logger().log(&$crate::observability::LogRecord {
            severity: $crate::observability::LogSeverity::Error,
            target: $target,
            message: format_args!($($arg)+),
        })
    };
}

/// Emit a warn-severity record through the default logger.
macro_rules! log_warn {
    ($target:expr, $($arg:tt)+) => {
        $crate::observability::default_logger().log(&$crate::observability::LogRecord {
            severity: $crate::observability::LogSeverity::Warn,
            target: $target,
            message: format_args!($($arg)+),
        })
    };
}

pub(crate) use log_error;
pub(crate) use log_warn;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingLogger {
        count: Arc<AtomicUsize>,
    }

    impl Logger for CountingLogger {
        fn log(&self, record: &LogRecord<'_>) {
            assert_eq!(record.severity, LogSeverity::Warn);
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn custom_logger_receives_records() {
        let count = Arc::new(AtomicUsize::new(0));
        let logger = CountingLogger { count: count.clone() };
        logger.log(&LogRecord {
            severity: LogSeverity::Warn,
            target: "test",
            message: format_args!("hello {}", 1),
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_logger_does_not_panic() {
        default_logger().log(&LogRecord {
            severity: LogSeverity::Trace,
            target: "tether_rt::observability::tests",
            message: format_args!("smoke test"),
        });
    }
}
