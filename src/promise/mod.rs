//! Promise/Expect propagation: one-shot (`Promise`/`Defer`) and shared
//! (`SharedPromise`) asynchronous values, their combinators, and the
//! `all()`/`make_promise()` composition helpers.
//!
//! See spec.md §4.2–§4.4 for the contract; `DESIGN.md` records where each
//! piece is grounded and the simplifications made translating a C++
//! template-overload-driven API into Rust's trait system.

mod compose;
mod defer;
mod shared;
mod state;
mod unique;

pub use compose::{all, all3, all4, all5, all_vec, make_promise, make_promise_with, CombinedFailure};
pub use defer::Defer;
pub use shared::SharedPromise;
pub use unique::Promise;

use crate::error::CoreError;
use crate::expect::Expect;

/// What a combinator callback produced: a plain value (success), an
/// explicit rejection, or an inner [`Promise<U>`] whose eventual outcome
/// this stage should adopt (spec.md §4.2, "Adoption rule").
///
/// Four `From` impls cover every callback return shape the combinators
/// accept — `U`, `Promise<U>`, `Expect<U>`, `Result<U, CoreError>` —
/// without needing specialization: the three wrapper types can never
/// unify with a bare type variable `U`, so the blanket
/// `impl<U> From<U> for Continued<U>` and the wrapper-specific impls
/// never overlap.
pub enum Continued<U: Send + 'static> {
    /// Resolve this stage with a plain value.
    Value(U),
    /// Reject this stage with an explicit error, without unwinding.
    Rejected(CoreError),
    /// Adopt another promise's eventual outcome.
    Inner(Promise<U>),
}

impl<U: Send + 'static> From<U> for Continued<U> {
    fn from(value: U) -> Self {
        Continued::Value(value)
    }
}

impl<U: Send + 'static> From<Promise<U>> for Continued<U> {
    fn from(inner: Promise<U>) -> Self {
        Continued::Inner(inner)
    }
}

impl<U: Send + 'static> From<Expect<U>> for Continued<U> {
    fn from(expect: Expect<U>) -> Self {
        match expect.rethrow_on_exception() {
            Ok(value) => Continued::Value(value),
            Err(error) => Continued::Rejected(error),
        }
    }
}

impl<U: Send + 'static> From<Result<U, CoreError>> for Continued<U> {
    fn from(result: Result<U, CoreError>) -> Self {
        match result {
            Ok(value) => Continued::Value(value),
            Err(error) => Continued::Rejected(error),
        }
    }
}
