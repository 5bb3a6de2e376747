//! Micro-benchmarks for embedded key/value stores.
//!
//! The harness runs a list of named workloads, such as sequential and random fills, overwrites,
//! point reads and full scans, against a storage [`backend`]. Every workload is deterministic:
//! keys come from a fixed-seed [`random::Random`] and values from a pre-built, partially
//! compressible [`payload::PayloadGenerator`], so two runs issue exactly the same operations.
//!
//! Each benchmark produces a [`report::Report`] with throughput and, optionally, a latency
//! [`histogram::Histogram`].
//!
//! ```no_run
//! use dbbench::backend::Sqlite;
//! use dbbench::config::Config;
//! use dbbench::runner::Runner;
//!
//! let config = Config {
//!     benchmarks: "fillseq,readrandom".into(),
//!     num: 10_000,
//!     ..Default::default()
//! };
//! let runner = Runner::new(config, Box::new(Sqlite::new("/tmp")))?;
//! let summary = runner.run()?;
//! println!("{} benchmarks ran", summary.reports.len());
//! # Ok::<(), dbbench::backend::BackendError>(())
//! ```
#![warn(missing_debug_implementations)]

pub mod backend;
pub mod benchmark;
pub mod config;
pub mod histogram;
pub mod key;
pub mod observability;
pub mod payload;
pub mod random;
pub mod report;
pub mod runner;
pub mod stats;
