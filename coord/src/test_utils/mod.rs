//! Helpers for testing code built on the coordination primitives.
//!
//! The [`probe`] module measures how many tasks are inside a section at once, which is how
//! permit limits and pool sizes are checked. The [`notify`] module wraps [`tokio::sync::Notify`]
//! with a timeout so a test waiting on a state that is never reached fails instead of hanging.

pub mod notify;
pub mod probe;

pub use notify::{DEFAULT_NOTIFY_TIMEOUT, TimedNotify};
pub use probe::{ConcurrencyProbe, ProbeGuard};
