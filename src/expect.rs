//! `Expect<T>` — the value-or-error sum every promise and channel slot is
//! built from.
//!
//! # Design background (Why)
//! - `§9` of the concurrency substrate this crate implements calls out the
//!   source's three-way `void`/`unit`/"no args" split as an accident of its
//!   host language; here `void` collapses to the unit tuple `()` and
//!   `Expect<()>` is the only "no payload" representation.

use crate::error::CoreError;
use std::fmt;

/// Holds exactly one of a successful value or an error.
///
/// # Contract
/// - Never holds both a value and an error.
/// - [`Expect::consume`] moves the value out and may only be called once;
///   this is enforced by taking `self` by value.
pub struct Expect<T> {
    inner: Result<T, CoreError>,
}

impl<T> Expect<T> {
    /// Build a successful `Expect` from a value (possibly `()`).
    pub fn fulfill(value: T) -> Self {
        Expect { inner: Ok(value) }
    }

    /// Build an errored `Expect` from a [`CoreError`].
    pub fn refuse(error: CoreError) -> Self {
        Expect { inner: Err(error) }
    }

    /// `true` if this holds an error rather than a value.
    pub fn has_exception(&self) -> bool {
        self.inner.is_err()
    }

    /// Borrow the held error.
    ///
    /// # Panics
    /// Panics if this `Expect` holds a value; callers should check
    /// [`Expect::has_exception`] first, exactly as the spec's `get()` on a
    /// value-holding `Expect` is a precondition violation.
    pub fn exception(&self) -> &CoreError {
        self.inner
            .as_ref()
            .err()
            .expect("Expect::exception called on a successful Expect")
    }

    /// Borrow the held value.
    ///
    /// # Panics
    /// Panics if this `Expect` holds an error.
    pub fn get(&self) -> &T {
        self.inner
            .as_ref()
            .ok()
            .expect("Expect::get called on an errored Expect")
    }

    /// Move the held value out. May only meaningfully be called once per
    /// logical slot — taking `self` by value enforces that at the type
    /// level.
    ///
    /// # Panics
    /// Panics if this `Expect` holds an error.
    pub fn consume(self) -> T {
        self.inner
            .expect("Expect::consume called on an errored Expect")
    }

    /// Re-raise the held error by returning it as a `Result`; a no-op on
    /// success.
    pub fn rethrow_on_exception(self) -> Result<T, CoreError> {
        self.inner
    }

    /// View this `Expect` as a plain [`Result`] without consuming it.
    pub fn as_result(&self) -> Result<&T, &CoreError> {
        self.inner.as_ref()
    }

    /// Map the success value, leaving an error untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Expect<U> {
        Expect {
            inner: self.inner.map(f),
        }
    }
}

impl<T> From<Result<T, CoreError>> for Expect<T> {
    fn from(inner: Result<T, CoreError>) -> Self {
        Expect { inner }
    }
}

impl<T> From<Expect<T>> for Result<T, CoreError> {
    fn from(expect: Expect<T>) -> Self {
        expect.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for Expect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Ok(value) => f.debug_tuple("Expect::Value").field(value).finish(),
            Err(error) => f.debug_tuple("Expect::Error").field(error).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfill_holds_value() {
        let e = Expect::fulfill(5);
        assert!(!e.has_exception());
        assert_eq!(*e.get(), 5);
        assert_eq!(e.consume(), 5);
    }

    #[test]
    fn refuse_holds_error() {
        let e: Expect<i32> = Expect::refuse(CoreError::domain("demo", "boom"));
        assert!(e.has_exception());
        assert_eq!(e.exception().message(), "boom");
    }

    #[test]
    fn rethrow_on_exception_is_noop_on_success() {
        let e = Expect::fulfill(7);
        assert_eq!(e.rethrow_on_exception().unwrap(), 7);
    }

    #[test]
    #[should_panic]
    fn get_panics_on_error() {
        let e: Expect<i32> = Expect::refuse(CoreError::domain("demo", "boom"));
        let _ = e.get();
    }
}
