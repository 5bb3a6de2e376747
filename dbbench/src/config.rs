//! Configuration for a benchmark run.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command-line flags
//! 2. Environment variables (prefixed with `DBBENCH__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `DBBENCH__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `DBBENCH__NUM=1000` sets the number of entries
//! - `DBBENCH__STORAGE__TYPE=sqlite` selects the storage engine
//! - `DBBENCH__STORAGE__PATH=/tmp/bench` sets the database directory
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! num: 1000
//!
//! storage:
//!   type: sqlite
//!   path: /tmp/bench
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::backend::{DEFAULT_PAGE_SIZE, Journal, Options};
use crate::benchmark::DEFAULT_BENCHMARKS;
use crate::key::KEY_SPACE;
use crate::payload::PAYLOAD_CAPACITY;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "DBBENCH__";

/// Storage engine the benchmarks run against.
///
/// The `type` field in YAML or `__TYPE` in environment variables determines which variant is used.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    /// SQLite database files (type `"sqlite"`).
    ///
    /// ```yaml
    /// storage:
    ///   type: sqlite
    ///   path: /tmp/bench
    /// ```
    Sqlite {
        /// Directory holding the database files. It must exist.
        path: PathBuf,
    },

    /// A transient in-memory store (type `"memory"`), useful for dry runs.
    Memory,
}

/// Log output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2020-12-04T12:10:32Z WARN dbbench::stats: long op: 21034.7 usec
    /// ```
    Simplified,

    /// JSON lines.
    Json,
}

/// Error returned when a `--log-format` value names no known format.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"unknown log format "{}": expected auto, pretty, simplified or json"#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "pretty" => Ok(Self::Pretty),
            "simplified" => Ok(Self::Simplified),
            "json" => Ok(Self::Json),
            _ => Err(FormatParseError(s.to_owned())),
        }
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration. Logs are always written to stderr.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable overrides this and allows per-module control.
    ///
    /// # Default
    ///
    /// `INFO`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct of a benchmark run.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Comma-separated list of benchmarks to run in order.
    ///
    /// Unknown names are skipped with a warning. Run `dbbench --list` for the catalogue.
    pub benchmarks: String,

    /// Number of key/value pairs written by the fill benchmarks.
    ///
    /// # Default
    ///
    /// `200000`
    pub num: u64,

    /// Number of point reads, defaults to [`num`](Self::num).
    pub reads: Option<u64>,

    /// Size of each value in bytes.
    ///
    /// # Default
    ///
    /// `100`
    pub value_size: usize,

    /// Records per-operation latencies and prints a histogram after every benchmark.
    pub histogram: bool,

    /// Fraction of each value that is random. The rest repeats the random part.
    ///
    /// # Default
    ///
    /// `0.5`
    pub compression_ratio: f64,

    /// Page size of newly created databases in bytes.
    ///
    /// # Default
    ///
    /// `1024`
    pub page_size: u32,

    /// Number of pages held in the page cache.
    ///
    /// # Default
    ///
    /// `4096`
    pub num_pages: u32,

    /// Runs against the databases of an earlier run instead of recreating them.
    ///
    /// Benchmarks that need a fresh database are skipped.
    pub use_existing_db: bool,

    /// Stores the table with an implicit row id instead of clustering it by key.
    pub use_rowids: bool,

    /// Wraps batches of writes in explicit transactions.
    ///
    /// # Default
    ///
    /// `true`
    pub transaction: bool,

    /// Enables write-ahead logging.
    ///
    /// # Default
    ///
    /// `true`
    pub wal_enabled: bool,

    /// Shows a progress spinner on stderr.
    ///
    /// # Default
    ///
    /// `true`
    pub progress: bool,

    /// Storage engine and location of the databases.
    ///
    /// # Default
    ///
    /// SQLite in the working directory.
    pub storage: Storage,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            benchmarks: DEFAULT_BENCHMARKS.to_owned(),
            num: 200_000,
            reads: None,
            value_size: 100,
            histogram: false,
            compression_ratio: 0.5,
            page_size: DEFAULT_PAGE_SIZE,
            num_pages: 4096,
            use_existing_db: false,
            use_rowids: false,
            transaction: true,
            wal_enabled: true,
            progress: true,
            storage: Storage::Sqlite {
                path: PathBuf::from("."),
            },
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if environment variables
    /// contain invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Checks that the configured sizes and counts can be benchmarked.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.value_size < PAYLOAD_CAPACITY,
            "value size {} must be smaller than {PAYLOAD_CAPACITY} bytes",
            self.value_size
        );
        ensure!(
            self.num <= KEY_SPACE,
            "entry count {} exceeds the key space of {KEY_SPACE}",
            self.num
        );
        ensure!(
            self.reads() <= KEY_SPACE,
            "read count {} exceeds the key space of {KEY_SPACE}",
            self.reads()
        );
        ensure!(
            self.compression_ratio.is_finite() && self.compression_ratio >= 0.0,
            "compression ratio must be a non-negative number, got {}",
            self.compression_ratio
        );
        ensure!(self.page_size > 0, "page size must be positive");
        ensure!(self.num_pages > 0, "cache page count must be positive");
        Ok(())
    }

    /// Number of point reads, falling back to the entry count.
    pub fn reads(&self) -> u64 {
        self.reads.unwrap_or(self.num)
    }

    /// Engine tuning applied to every database.
    pub fn options(&self) -> Options {
        Options {
            cache_pages: self.num_pages,
            page_size: self.page_size,
            journal: if self.wal_enabled {
                Journal::Wal
            } else {
                Journal::Default
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();
            assert_eq!(config.benchmarks, DEFAULT_BENCHMARKS);
            assert_eq!(config.num, 200_000);
            assert_eq!(config.reads(), 200_000);
            assert_eq!(config.value_size, 100);
            assert_eq!(config.compression_ratio, 0.5);
            assert!(config.transaction);
            assert!(config.wal_enabled);
            assert!(!config.use_existing_db);
            assert_eq!(
                config.storage,
                Storage::Sqlite {
                    path: PathBuf::from(".")
                }
            );
            assert_eq!(config.logging.level, LevelFilter::INFO);
            config.validate().unwrap();

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("DBBENCH__NUM", "1000");
            jail.set_env("DBBENCH__READS", "10");
            jail.set_env("DBBENCH__HISTOGRAM", "true");
            jail.set_env("DBBENCH__STORAGE__TYPE", "memory");
            jail.set_env("DBBENCH__LOGGING__LEVEL", "debug");
            jail.set_env("DBBENCH__LOGGING__FORMAT", "json");

            let config = Config::load(None).unwrap();
            assert_eq!(config.num, 1000);
            assert_eq!(config.reads(), 10);
            assert!(config.histogram);
            assert_eq!(config.storage, Storage::Memory);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            benchmarks: fillseq,readseq
            value_size: 400
            wal_enabled: false
            storage:
                type: sqlite
                path: /tmp/bench
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("DBBENCH__VALUE_SIZE", "200");

            let config = Config::load(Some(tempfile.path())).unwrap();
            assert_eq!(config.benchmarks, "fillseq,readseq");
            assert_eq!(config.value_size, 200);
            assert!(!config.wal_enabled);
            assert_eq!(config.options().journal, Journal::Default);
            assert_eq!(
                config.storage,
                Storage::Sqlite {
                    path: PathBuf::from("/tmp/bench")
                }
            );

            Ok(())
        });
    }

    #[test]
    fn rejects_unknown_log_format() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("DBBENCH__LOGGING__FORMAT", "xml");
            assert!(Config::load(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn parses_log_formats() {
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Auto);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(
            "simplified".parse::<LogFormat>().unwrap(),
            LogFormat::Simplified
        );

        let error = "xml".parse::<LogFormat>().unwrap_err();
        assert!(error.to_string().contains(r#""xml""#), "{error}");
    }

    #[test]
    fn validation() {
        let config = Config {
            value_size: PAYLOAD_CAPACITY,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            reads: Some(KEY_SPACE + 1),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            compression_ratio: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            num_pages: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            num: KEY_SPACE,
            reads: Some(0),
            ..Default::default()
        };
        config.validate().unwrap();
    }
}
