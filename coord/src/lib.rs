//! Concurrency coordination primitives.
//!
//! The crate is organized in two layers. [`concurrency`] holds the leaf primitives: a guarded
//! map, a counting semaphore with scoped permits, closable streams with a fan-in merger, a
//! broadcast cancellation signal and a completion tracker. [`workers`] builds a fixed-size
//! worker pool on top of them.

pub mod concurrency;
pub mod config;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
mod macros;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod workers;
