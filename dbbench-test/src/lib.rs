//! Test utilities for the storage benchmark harness.
//!
//! See the modules for all available utilities.

pub mod tracing;
