//! Runs a list of benchmarks against one backend.
//!
//! The [`Runner`] owns everything a run mutates: the open database, the key and payload
//! generators and the statistics of the current benchmark. Benchmarks run strictly one after
//! another and every operation completes before the next one is issued.

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use yansi::Paint;

use crate::backend::{BackendResult, BoxedBackend, BoxedConnection};
use crate::benchmark::{self, Benchmark, DbState, Order, Workload, WriteSpec};
use crate::config::Config;
use crate::key::{KEY_SIZE, Key};
use crate::payload::PayloadGenerator;
use crate::random::Random;
use crate::report::{Report, RunSummary};
use crate::stats::Stats;

/// Seed of the key-selection stream.
const KEY_SEED: u32 = 301;

/// Width of the separator lines around the header and footer.
const RULE_WIDTH: usize = 52;

/// A group of operations, optionally wrapped in a transaction.
///
/// An open transaction that is not committed is rolled back when the batch is dropped.
struct Batch<'c> {
    conn: &'c mut BoxedConnection,
    open: bool,
}

impl<'c> Batch<'c> {
    fn begin(conn: &'c mut BoxedConnection, transactional: bool) -> BackendResult<Self> {
        if transactional {
            conn.begin_transaction()?;
        }
        Ok(Self {
            conn,
            open: transactional,
        })
    }

    fn conn(&mut self) -> &mut BoxedConnection {
        &mut *self.conn
    }

    fn commit(mut self) -> BackendResult<()> {
        if self.open {
            self.open = false;
            self.conn.end_transaction()?;
        }
        Ok(())
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(error) = self.conn.rollback_transaction() {
            tracing::error!(
                error = &error as &dyn std::error::Error,
                "failed to roll back batch"
            );
        }
    }
}

/// Opens database `id` and prepares it for benchmarking.
fn open_database(
    backend: &BoxedBackend,
    id: u32,
    config: &Config,
) -> BackendResult<BoxedConnection> {
    let mut conn = backend.open(id)?;
    conn.configure(&config.options())?;
    conn.create_table(!config.use_rowids)?;
    Ok(conn)
}

/// The orchestrator of a benchmark run.
#[derive(Debug)]
pub struct Runner {
    config: Config,
    backend: BoxedBackend,
    connection: BoxedConnection,
    db_num: u32,
    num: u64,
    reads: u64,
    payload: PayloadGenerator,
    rand: Random,
    stats: Stats,
    /// Accumulated elapsed time of all finished benchmarks.
    elapsed: Duration,
    started: Instant,
}

impl Runner {
    /// Prepares a run: removes databases of earlier runs, unless they are to be reused, and
    /// opens the first database.
    pub fn new(config: Config, backend: BoxedBackend) -> BackendResult<Self> {
        let started = Instant::now();

        if !config.use_existing_db {
            backend.destroy()?;
        }
        let connection = open_database(&backend, 1, &config)?;

        Ok(Self {
            num: config.num,
            reads: config.reads(),
            payload: PayloadGenerator::new(config.compression_ratio),
            rand: Random::new(KEY_SEED),
            stats: Stats::new(config.histogram, config.progress),
            db_num: 1,
            elapsed: Duration::ZERO,
            started,
            connection,
            backend,
            config,
        })
    }

    /// Runs every benchmark of the configured list and closes the database.
    ///
    /// Prints a header, one summary line per benchmark and a footer to stdout. Unknown names
    /// are skipped with a warning. The first backend error aborts the run.
    pub fn run(mut self) -> BackendResult<RunSummary> {
        self.print_header();

        let mut reports = Vec::new();
        let list = self.config.benchmarks.clone();
        for entry in benchmark::parse_list(&list) {
            let benchmark = match entry {
                Ok(benchmark) => benchmark,
                Err(error) => {
                    tracing::warn!("{error}");
                    continue;
                }
            };

            let report = self.run_benchmark(benchmark)?;
            println!("{report}");
            if let Some(histogram) = &report.histogram {
                println!("Microseconds per op:\n{histogram}");
            }

            self.elapsed += report.elapsed;
            reports.push(report);
        }

        let Self {
            connection,
            backend,
            elapsed,
            started,
            ..
        } = self;
        connection.close()?;

        let summary = RunSummary {
            reports,
            elapsed,
            wall: started.elapsed(),
        };
        print_footer(backend.name(), &summary);
        Ok(summary)
    }

    /// Runs a single benchmark and summarizes it.
    pub fn run_benchmark(&mut self, benchmark: Benchmark) -> BackendResult<Report> {
        tracing::debug!(%benchmark, "starting benchmark");
        self.stats.start();

        match benchmark.workload() {
            Workload::Write(spec) => {
                self.write(spec)?;
                if self.config.wal_enabled {
                    self.connection.checkpoint()?;
                }
            }
            Workload::Read {
                order,
                divisor,
                batch_size,
            } => self.read(order, self.reads / divisor, batch_size)?,
            Workload::Scan => self.read_sequential()?,
        }

        Ok(self.stats.stop(benchmark.name()))
    }

    /// Closes the current database and continues with a new, empty one.
    fn reopen(&mut self) -> BackendResult<()> {
        self.db_num += 1;
        let connection = open_database(&self.backend, self.db_num, &self.config)?;
        std::mem::replace(&mut self.connection, connection).close()
    }

    fn write(&mut self, spec: WriteSpec) -> BackendResult<()> {
        let num_entries = self.num / spec.divisor;
        let value_size = spec.value_size.unwrap_or(self.config.value_size);

        if spec.state == DbState::Fresh {
            if self.config.use_existing_db {
                self.stats.set_message("skipping (--use-existing-db is true)");
                return Ok(());
            }
            self.reopen()?;
            self.stats.start();
        }

        if num_entries != self.num {
            self.stats.set_message(format!("({num_entries} ops)"));
        }

        self.connection.set_sync(spec.sync)?;

        let transactional = self.config.transaction && spec.batch_size > 1;
        let mut written = 0;
        while written < num_entries {
            let batch_len = spec.batch_size.min(num_entries - written);
            let mut batch = Batch::begin(&mut self.connection, transactional)?;
            for j in 0..batch_len {
                let index = match spec.order {
                    Order::Sequential => written + j,
                    Order::Random => self.rand.uniform(num_entries),
                };
                let value = self.payload.generate(value_size);
                batch.conn().upsert(Key::new(index).as_bytes(), value)?;
                self.stats.add_bytes((value_size + KEY_SIZE) as u64);
                self.stats.finished_single_op();
            }
            batch.commit()?;
            written += batch_len;
        }

        Ok(())
    }

    fn read(&mut self, order: Order, reads: u64, batch_size: u64) -> BackendResult<()> {
        let transactional = self.config.transaction && batch_size > 1;
        let mut done = 0;
        while done < reads {
            let batch_len = batch_size.min(reads - done);
            let mut batch = Batch::begin(&mut self.connection, transactional)?;
            for j in 0..batch_len {
                let index = match order {
                    Order::Sequential => done + j,
                    Order::Random => self.rand.uniform(reads),
                };
                // Missing keys are expected when the table is partially filled.
                batch.conn().point_lookup(Key::new(index).as_bytes())?;
                self.stats.finished_single_op();
            }
            batch.commit()?;
            done += batch_len;
        }

        Ok(())
    }

    fn read_sequential(&mut self) -> BackendResult<()> {
        let limit = self.reads;
        if limit == 0 {
            return Ok(());
        }

        let stats = &mut self.stats;
        let mut visited = 0;
        self.connection.ordered_scan(&mut |key, value| {
            stats.add_bytes((key.len() + value.len()) as u64);
            stats.finished_single_op();
            visited += 1;
            if visited < limit {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        })
    }

    fn print_header(&self) {
        let raw_size = (KEY_SIZE + self.config.value_size) as u64 * self.num;

        println!(
            "{:<12}version {}",
            format!("{}:", self.backend.name()),
            self.backend.version().bold()
        );
        println!("Keys:       {KEY_SIZE} bytes each");
        println!("Values:     {} bytes each", self.config.value_size);
        println!("Entries:    {}", self.num);
        println!("RawSize:    {} (estimated)", ByteSize::b(raw_size).bold());
        if cfg!(debug_assertions) {
            println!(
                "{}",
                "WARNING: Assertions are enabled; benchmarks unnecessarily slow"
                    .yellow()
                    .bold()
            );
        }
        println!("{}", "-".repeat(RULE_WIDTH));
    }
}

fn print_footer(backend: &str, summary: &RunSummary) {
    let label = format!("[{backend}]");
    println!("{label:->width$}{}", "-".repeat(9), width = RULE_WIDTH - 9);
    println!(
        "Total Elapsed  : {:>10.3} secs   [{:6.2}]",
        summary.wall.as_secs_f64(),
        summary.elapsed.as_secs_f64()
    );
    println!("{}", "-".repeat(RULE_WIDTH));
}
