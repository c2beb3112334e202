//! Crate-private sealing marker.
//!
//! A blanket impl means this currently grants every type the marker — it
//! exists so `Dispatcher`/`TaskSource`/`Logger` can declare `: Sealed` now
//! and the bound can be tightened later without an API break.

pub(crate) trait Sealed {}

impl<T: ?Sized> Sealed for T {}
