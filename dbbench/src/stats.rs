//! Per-benchmark bookkeeping: operation counts, bytes, timing and progress.

use std::time::{Duration, Instant};

use indicatif::ProgressBar;

use crate::histogram::Histogram;
use crate::report::Report;

/// Operations slower than this are reported as long ops.
const LONG_OP_MICROS: f64 = 20_000.0;

/// Number of operations after which the first progress report is due.
const FIRST_REPORT: u64 = 100;

/// Counts completed operations and decides when progress is reported.
///
/// Reports become less frequent as the count grows: every 100 operations up to 1,000, then
/// every 500 up to 5,000 and so on, up to every 100,000 operations past 500,000.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Progress {
    done: u64,
    next_report: u64,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            done: 0,
            next_report: FIRST_REPORT,
        }
    }

    /// Number of completed operations.
    pub fn done(&self) -> u64 {
        self.done
    }

    /// Operation count at which the next report is due.
    pub fn next_report(&self) -> u64 {
        self.next_report
    }

    /// Counts one completed operation and returns `true` if a report is due.
    pub fn tick(&mut self) -> bool {
        self.done += 1;
        if self.done < self.next_report {
            return false;
        }

        self.next_report += if self.next_report < 1_000 {
            100
        } else if self.next_report < 5_000 {
            500
        } else if self.next_report < 10_000 {
            1_000
        } else if self.next_report < 50_000 {
            5_000
        } else if self.next_report < 100_000 {
            10_000
        } else if self.next_report < 500_000 {
            50_000
        } else {
            100_000
        };
        true
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates the spinner that shows progress on stderr.
///
/// The spinner stays invisible when stderr is not a terminal.
fn spinner(enabled: bool) -> ProgressBar {
    if enabled {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    }
}

/// Run state of the benchmark that is currently executing.
#[derive(Debug)]
pub struct Stats {
    start: Instant,
    last_op: Instant,
    bytes: u64,
    message: Option<String>,
    histogram: Option<Histogram>,
    progress: Progress,
    show_progress: bool,
    bar: ProgressBar,
}

impl Stats {
    /// Creates run state that records per-operation latencies if `histogram` is set.
    pub fn new(histogram: bool, show_progress: bool) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_op: now,
            bytes: 0,
            message: None,
            histogram: histogram.then(Histogram::new),
            progress: Progress::new(),
            show_progress,
            bar: ProgressBar::hidden(),
        }
    }

    /// Resets all counters and starts the clock.
    pub fn start(&mut self) {
        self.bytes = 0;
        self.message = None;
        if let Some(histogram) = &mut self.histogram {
            histogram.clear();
        }
        self.progress = Progress::new();
        self.bar = spinner(self.show_progress);

        self.start = Instant::now();
        self.last_op = self.start;
    }

    /// Records the completion of one elementary operation.
    pub fn finished_single_op(&mut self) {
        if let Some(histogram) = &mut self.histogram {
            let now = Instant::now();
            let micros = now.duration_since(self.last_op).as_secs_f64() * 1e6;
            histogram.add(micros);
            if micros > LONG_OP_MICROS {
                tracing::warn!("long op: {micros:.1} usec");
            }
            self.last_op = now;
        }

        if self.progress.tick() {
            self.bar
                .set_message(format!("... finished {} ops", self.progress.done()));
            self.bar.tick();
        }
    }

    pub fn add_bytes(&mut self, bytes: u64) {
        self.bytes += bytes;
    }

    /// Sets the note printed after the timing of the summary line.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Number of operations completed since [`start`](Self::start).
    pub fn done(&self) -> u64 {
        self.progress.done()
    }

    /// Stops the clock and summarizes the benchmark.
    pub fn stop(&mut self, name: &str) -> Report {
        let elapsed = self.start.elapsed();
        self.bar.finish_and_clear();

        let mut message = self.message.take();
        if self.bytes > 0 {
            let rate = format!("{:6.1} MB/s", throughput(self.bytes, elapsed));
            message = Some(match message {
                Some(message) => format!("{rate} {message}"),
                None => rate,
            });
        }

        Report {
            name: name.to_owned(),
            ops: self.progress.done().max(1),
            elapsed,
            bytes: self.bytes,
            message,
            histogram: self.histogram.clone(),
        }
    }
}

/// Megabytes (2^20 bytes) per second.
fn throughput(bytes: u64, elapsed: Duration) -> f64 {
    (bytes as f64 / 1_048_576.0) / elapsed.as_secs_f64()
}
