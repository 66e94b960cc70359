//! Tracing setup shared by the binaries and test suites of the workspace.

pub mod tracing;
