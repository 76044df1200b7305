//! Request Binder
//!
//! Maps a caller's positional or named tensors onto a model's declared inputs
//! and produces a transport-ready [`BoundRequest`]. Every check here runs
//! before any network I/O.

mod args;
mod bind;
mod error;

pub use args::{Arguments, CallArgs};
pub use bind::{bind, BindOptions, BoundRequest, Placeholder};
pub use error::BindingError;
