//! Concurrency primitives for coordinating tasks.
//!
//! Provides the building blocks the worker pool is assembled from: a reader/writer guarded map,
//! a counting semaphore with scoped permits, closable streams with fan-in and first-ready
//! selection, a broadcast cancellation signal, and a completion tracker for knowing when every
//! producer is done.

pub mod cancel;
pub mod fan_in;
pub mod future;
pub mod map;
pub mod select;
pub mod semaphore;
pub mod stream;
pub mod timeout;
pub mod tracker;
