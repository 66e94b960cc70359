//! Worker pool built on the coordination primitives.
//!
//! A [`pool::WorkerPool`] runs a fixed number of workers that share one job queue. Submitters
//! hold a [`queue::JobSender`]; workers take turns receiving from the queue behind an async
//! mutex, so every job is delivered to exactly one of them. Handlers implement
//! [`base::JobHandler`], which plain async closures already do.

pub mod base;
pub mod pool;
pub mod queue;
