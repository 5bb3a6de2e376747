//! Results of benchmark runs.

use std::fmt;
use std::time::Duration;

use crate::histogram::Histogram;

/// The outcome of one benchmark.
#[derive(Clone, Debug)]
pub struct Report {
    pub name: String,
    /// Completed operations, at least 1.
    pub ops: u64,
    pub elapsed: Duration,
    /// Payload bytes moved by the benchmark.
    pub bytes: u64,
    /// Throughput and notes printed after the timing.
    pub message: Option<String>,
    /// Per-operation latencies, if recorded.
    pub histogram: Option<Histogram>,
}

impl Report {
    /// Average wall-clock time per operation in microseconds.
    pub fn micros_per_op(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1e6 / self.ops as f64
    }
}

/// Renders the one-line summary, e.g.
/// `fillseq        :      2.413 usec/op[ 0.483];   45.8 MB/s`.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<14} : {:>10.3} usec/op[{:6.3}];",
            self.name,
            self.micros_per_op(),
            self.elapsed.as_secs_f64()
        )?;
        if let Some(message) = &self.message {
            write!(f, " {message}")?;
        }
        Ok(())
    }
}

/// The outcome of a whole benchmark list.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    /// Reports of all benchmarks that ran, in list order.
    pub reports: Vec<Report>,
    /// Sum of the elapsed times of all benchmarks.
    pub elapsed: Duration,
    /// Wall-clock time from setup to teardown.
    pub wall: Duration,
}

impl RunSummary {
    /// Returns the first report with the given benchmark name.
    pub fn report(&self, name: &str) -> Option<&Report> {
        self.reports.iter().find(|report| report.name == name)
    }
}
