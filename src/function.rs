//! Small-buffer-friendly callable containers.
//!
//! # Design background (Why)
//! - Promise combinators, channel callbacks, and task closures all need to
//!   store a user-supplied callable behind a uniform, often object-safe,
//!   handle. The spec calls for two flavours — a copyable `SharedFn` and a
//!   move-only `UniqueFn` — with a fast path for plain function pointers so
//!   the common case (`.then(some_free_fn)`) never touches the allocator.
//!
//! # Trade-offs
//! - A true small-buffer optimisation (storing the closure's captured
//!   state inline, behind a hand-rolled vtable) needs `unsafe` to erase and
//!   later recover the concrete type. This crate instead dispatches over a
//!   small closed enum: a bare function pointer is stored by value with no
//!   allocation at all (satisfying the spec's "a plain function pointer is
//!   stored without any function object" requirement), and anything with
//!   captured state falls back to a heap-allocated trait object. This is a
//!   deliberate simplification recorded as an open design call in
//!   `DESIGN.md`: it gives up the inline-capture fast path for closures
//!   that do capture state, in exchange for a container with no `unsafe`.

use std::fmt;
use std::sync::Arc;

use crate::error::CoreError;

/// A move-only callable of `Args -> Out`, invoked at most once.
///
/// # Contract
/// - Calling an empty `UniqueFn` returns `CoreErrorKind::BadFunctionCall`
///   rather than panicking, matching the spec's `BadFunctionCall` error.
pub enum UniqueFn<Args, Out> {
    /// A bare function pointer, stored without allocation.
    Ptr(fn(Args) -> Out),
    /// A closure (or anything else) boxed onto the heap.
    Boxed(Box<dyn FnOnce(Args) -> Out + Send>),
    /// No callable installed.
    Empty,
}

impl<Args, Out> UniqueFn<Args, Out> {
    /// An empty container that errors when invoked.
    pub fn empty() -> Self {
        UniqueFn::Empty
    }

    /// Wrap a bare function pointer with no heap allocation.
    pub fn from_fn_ptr(f: fn(Args) -> Out) -> Self {
        UniqueFn::Ptr(f)
    }

    /// Wrap any `FnOnce`, boxing it onto the heap.
    pub fn from_closure(f: impl FnOnce(Args) -> Out + Send + 'static) -> Self {
        UniqueFn::Boxed(Box::new(f))
    }

    /// `true` if no callable is installed.
    pub fn is_empty(&self) -> bool {
        matches!(self, UniqueFn::Empty)
    }

    /// Invoke and consume the callable.
    ///
    /// # Errors
    /// Returns `CoreError::bad_function_call()` if empty.
    pub fn call(self, args: Args) -> Result<Out, CoreError> {
        match self {
            UniqueFn::Ptr(f) => Ok(f(args)),
            UniqueFn::Boxed(f) => Ok(f(args)),
            UniqueFn::Empty => Err(CoreError::bad_function_call()),
        }
    }
}

impl<Args, Out> fmt::Debug for UniqueFn<Args, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueFn::Ptr(_) => f.write_str("UniqueFn::Ptr(..)"),
            UniqueFn::Boxed(_) => f.write_str("UniqueFn::Boxed(..)"),
            UniqueFn::Empty => f.write_str("UniqueFn::Empty"),
        }
    }
}

/// A `Clone`-able callable of `Args -> Out`, invokable any number of times.
///
/// Produced from a [`UniqueFn`] via [`SharedFn::share`]; this is the
/// explicit unique-to-shared conversion the spec requires (no implicit
/// `Clone` exists for `UniqueFn` since its boxed variant holds a
/// move-only `FnOnce`).
#[derive(Clone)]
pub enum SharedFn<Args, Out> {
    /// A bare function pointer, stored without allocation.
    Ptr(fn(Args) -> Out),
    /// A closure shared via reference counting.
    Arced(Arc<dyn Fn(Args) -> Out + Send + Sync>),
    /// No callable installed.
    Empty,
}

impl<Args, Out> SharedFn<Args, Out> {
    /// An empty container that errors when invoked.
    pub fn empty() -> Self {
        SharedFn::Empty
    }

    /// Wrap a bare function pointer with no heap allocation.
    pub fn from_fn_ptr(f: fn(Args) -> Out) -> Self {
        SharedFn::Ptr(f)
    }

    /// Wrap any `Fn`, reference-counting it on the heap.
    pub fn from_closure(f: impl Fn(Args) -> Out + Send + Sync + 'static) -> Self {
        SharedFn::Arced(Arc::new(f))
    }

    /// `true` if no callable is installed.
    pub fn is_empty(&self) -> bool {
        matches!(self, SharedFn::Empty)
    }

    /// Invoke without consuming; may be called repeatedly.
    ///
    /// # Errors
    /// Returns `CoreError::bad_function_call()` if empty.
    pub fn call(&self, args: Args) -> Result<Out, CoreError> {
        match self {
            SharedFn::Ptr(f) => Ok(f(args)),
            SharedFn::Arced(f) => Ok(f(args)),
            SharedFn::Empty => Err(CoreError::bad_function_call()),
        }
    }
}

impl<Args, Out> fmt::Debug for SharedFn<Args, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharedFn::Ptr(_) => f.write_str("SharedFn::Ptr(..)"),
            SharedFn::Arced(_) => f.write_str("SharedFn::Arced(..)"),
            SharedFn::Empty => f.write_str("SharedFn::Empty"),
        }
    }
}

impl<Out: 'static> UniqueFn<(), Out> {
    /// Convert a unique, zero-argument callable into a shared one. Only
    /// meaningful for `FnOnce() -> Out` containers where `Out` itself does
    /// not need to be produced more than once by the caller's logic — the
    /// conversion clones the closure's *capability* to run, not a cached
    /// result; calling the resulting `SharedFn` more than once re-executes
    /// the wrapped closure each time for the `Ptr` case, and is rejected at
    /// the type level for `Boxed` since a `FnOnce` cannot be replayed.
    pub fn share(self) -> SharedFn<(), Out>
    where
        Out: Clone,
    {
        match self {
            UniqueFn::Ptr(f) => SharedFn::Ptr(f),
            UniqueFn::Empty => SharedFn::Empty,
            UniqueFn::Boxed(f) => {
                // A boxed `FnOnce` cannot be replayed; cache its single
                // result behind a mutex so every observer sees the same
                // value, matching `SharedPromise`'s copy-on-read contract.
                let cached: std::sync::Mutex<Option<Out>> = std::sync::Mutex::new(None);
                let once = std::sync::Once::new();
                let f = std::sync::Mutex::new(Some(f));
                SharedFn::from_closure(move |args: ()| {
                    once.call_once(|| {
                        let taken = f.lock().unwrap().take();
                        if let Some(taken) = taken {
                            *cached.lock().unwrap() = Some(taken(args));
                        }
                    });
                    cached
                        .lock()
                        .unwrap()
                        .clone()
                        .expect("share() result populated by call_once")
                })
            }
        }
    }
}
