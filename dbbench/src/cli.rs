use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use argh::FromArgs;
use yansi::Paint;

use dbbench::backend::{BoxedBackend, InMemory, Sqlite};
use dbbench::benchmark::Benchmark;
use dbbench::config::{Config, LogFormat, Storage};
use dbbench::observability;
use dbbench::runner::Runner;

/// Micro-benchmarks for an embedded key/value store.
///
/// Settings are read from defaults, an optional YAML file and `DBBENCH__` environment variables.
/// Flags override all of them.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// comma-separated list of benchmarks to run, see --list
    #[argh(option)]
    benchmarks: Option<String>,

    /// number of key/value pairs to place in the database
    #[argh(option)]
    num: Option<u64>,

    /// number of read operations, defaults to --num
    #[argh(option)]
    reads: Option<u64>,

    /// size of each value in bytes
    #[argh(option)]
    value_size: Option<usize>,

    /// print a latency histogram after every benchmark
    #[argh(switch)]
    histogram: bool,

    /// fraction of each value that is random, the rest repeats it
    #[argh(option)]
    compression_ratio: Option<f64>,

    /// reuse the databases of an earlier run and skip benchmarks that need a fresh one
    #[argh(switch)]
    use_existing_db: bool,

    /// store the table with an implicit row id
    #[argh(switch)]
    use_rowids: bool,

    /// do not wrap batches in transactions
    #[argh(switch)]
    no_transaction: bool,

    /// page size of new databases in bytes
    #[argh(option)]
    page_size: Option<u32>,

    /// number of pages in the page cache
    #[argh(option)]
    num_pages: Option<u32>,

    /// disable write-ahead logging
    #[argh(switch)]
    no_wal: bool,

    /// directory holding the database files
    #[argh(option)]
    db: Option<PathBuf>,

    /// storage engine to benchmark: sqlite or memory
    #[argh(option)]
    backend: Option<BackendKind>,

    /// log output format: auto, pretty, simplified or json
    #[argh(option)]
    log_format: Option<LogFormat>,

    /// do not show progress on stderr
    #[argh(switch)]
    no_progress: bool,

    /// print the available benchmarks and exit
    #[argh(switch)]
    list: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BackendKind {
    Sqlite,
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                r#"unknown backend "{other}": expected "sqlite" or "memory""#
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        })
    }
}

impl Args {
    /// Overrides configuration values with the flags that were given.
    fn apply(&self, config: &mut Config) {
        if let Some(benchmarks) = &self.benchmarks {
            config.benchmarks.clone_from(benchmarks);
        }
        if let Some(num) = self.num {
            config.num = num;
        }
        if let Some(reads) = self.reads {
            config.reads = Some(reads);
        }
        if let Some(value_size) = self.value_size {
            config.value_size = value_size;
        }
        if let Some(compression_ratio) = self.compression_ratio {
            config.compression_ratio = compression_ratio;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(num_pages) = self.num_pages {
            config.num_pages = num_pages;
        }

        if let Some(format) = self.log_format {
            config.logging.format = format;
        }

        config.histogram |= self.histogram;
        config.use_existing_db |= self.use_existing_db;
        config.use_rowids |= self.use_rowids;
        config.transaction &= !self.no_transaction;
        config.wal_enabled &= !self.no_wal;
        config.progress &= !self.no_progress;

        match self.backend {
            Some(BackendKind::Memory) => config.storage = Storage::Memory,
            Some(BackendKind::Sqlite) if config.storage == Storage::Memory => {
                config.storage = Storage::Sqlite {
                    path: PathBuf::from("."),
                }
            }
            Some(BackendKind::Sqlite) | None => (),
        }
        if let (Some(db), Storage::Sqlite { path }) = (&self.db, &mut config.storage) {
            path.clone_from(db);
        }
    }
}

fn print_catalogue() {
    for benchmark in Benchmark::ALL {
        println!(
            "{:<16}{}",
            benchmark.name().bold(),
            benchmark.description()
        );
    }
}

/// Bootstrap logging and run the configured benchmarks.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    if args.list {
        print_catalogue();
        return Ok(());
    }

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    observability::initialize_tracing(&config);
    tracing::debug!(?config);

    let backend: BoxedBackend = match &config.storage {
        Storage::Sqlite { path } => Box::new(Sqlite::new(path)),
        Storage::Memory => Box::new(InMemory::new()),
    };

    let runner = Runner::new(config, backend).context("failed to open database")?;
    runner.run()?;

    Ok(())
}
