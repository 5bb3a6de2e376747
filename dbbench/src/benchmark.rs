//! The catalogue of benchmarks the harness knows how to run.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Benchmarks run when no explicit list is configured.
pub const DEFAULT_BENCHMARKS: &str = "fillseq,fillseqsync,fillseqbatch,fillrandom,fillrandsync,\
    fillrandbatch,overwrite,overwritebatch,readrandom,readseq,fillrand100K,fillseq100K,readseq,\
    readrand100K";

/// Value size of the large-value benchmarks.
const LARGE_VALUE_SIZE: usize = 100 * 1000;

/// Number of operations grouped into one transaction by the batched benchmarks.
const BATCH_SIZE: u64 = 1000;

/// Order in which keys are visited.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Order {
    Sequential,
    Random,
}

/// Which database a write benchmark runs against.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DbState {
    /// A newly created, empty database.
    Fresh,
    /// Whatever the previous benchmark left behind.
    Existing,
}

/// Parameters of a write benchmark.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WriteSpec {
    /// Whether every write is synced to disk.
    pub sync: bool,
    pub order: Order,
    pub state: DbState,
    /// The configured entry count is divided by this.
    pub divisor: u64,
    /// Overrides the configured value size.
    pub value_size: Option<usize>,
    /// Writes per transaction, `1` for no explicit transactions.
    pub batch_size: u64,
}

/// What a benchmark does, resolved against the configuration by the runner.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Workload {
    /// Upserts generated values.
    Write(WriteSpec),
    /// Point lookups. The configured read count is divided by `divisor`.
    Read {
        order: Order,
        divisor: u64,
        batch_size: u64,
    },
    /// One ordered pass over the table.
    Scan,
}

/// A named benchmark.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Benchmark {
    FillSeq,
    FillSeqSync,
    FillSeqBatch,
    FillRandom,
    FillRandSync,
    FillRandBatch,
    Overwrite,
    OverwriteBatch,
    FillRand100K,
    FillSeq100K,
    ReadSeq,
    ReadRandom,
    ReadRand100K,
}

impl Benchmark {
    /// Every benchmark, in catalogue order.
    pub const ALL: [Benchmark; 13] = [
        Self::FillSeq,
        Self::FillSeqSync,
        Self::FillSeqBatch,
        Self::FillRandom,
        Self::FillRandSync,
        Self::FillRandBatch,
        Self::Overwrite,
        Self::OverwriteBatch,
        Self::FillRand100K,
        Self::FillSeq100K,
        Self::ReadSeq,
        Self::ReadRandom,
        Self::ReadRand100K,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::FillSeq => "fillseq",
            Self::FillSeqSync => "fillseqsync",
            Self::FillSeqBatch => "fillseqbatch",
            Self::FillRandom => "fillrandom",
            Self::FillRandSync => "fillrandsync",
            Self::FillRandBatch => "fillrandbatch",
            Self::Overwrite => "overwrite",
            Self::OverwriteBatch => "overwritebatch",
            Self::FillRand100K => "fillrand100K",
            Self::FillSeq100K => "fillseq100K",
            Self::ReadSeq => "readseq",
            Self::ReadRandom => "readrandom",
            Self::ReadRand100K => "readrand100K",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::FillSeq => "write N values in sequential key order in async mode",
            Self::FillSeqSync => "write N/100 values in sequential key order in sync mode",
            Self::FillSeqBatch => "batch write N values in sequential key order in async mode",
            Self::FillRandom => "write N values in random key order in async mode",
            Self::FillRandSync => "write N/100 values in random key order in sync mode",
            Self::FillRandBatch => "batch write N values in random key order in async mode",
            Self::Overwrite => "overwrite N values in random key order in async mode",
            Self::OverwriteBatch => "batch overwrite N values in random key order in async mode",
            Self::FillRand100K => "write N/1000 100K values in random order in async mode",
            Self::FillSeq100K => "write N/1000 100K values in sequential order in async mode",
            Self::ReadSeq => "read N times sequentially",
            Self::ReadRandom => "read N times in random order",
            Self::ReadRand100K => "read N/1000 times in random order",
        }
    }

    pub fn workload(self) -> Workload {
        let write = |order, state| WriteSpec {
            sync: false,
            order,
            state,
            divisor: 1,
            value_size: None,
            batch_size: 1,
        };

        match self {
            Self::FillSeq => Workload::Write(write(Order::Sequential, DbState::Fresh)),
            Self::FillSeqSync => Workload::Write(WriteSpec {
                sync: true,
                divisor: 100,
                ..write(Order::Sequential, DbState::Fresh)
            }),
            Self::FillSeqBatch => Workload::Write(WriteSpec {
                batch_size: BATCH_SIZE,
                ..write(Order::Sequential, DbState::Fresh)
            }),
            Self::FillRandom => Workload::Write(write(Order::Random, DbState::Fresh)),
            Self::FillRandSync => Workload::Write(WriteSpec {
                sync: true,
                divisor: 100,
                ..write(Order::Random, DbState::Fresh)
            }),
            Self::FillRandBatch => Workload::Write(WriteSpec {
                batch_size: BATCH_SIZE,
                ..write(Order::Random, DbState::Fresh)
            }),
            Self::Overwrite => Workload::Write(write(Order::Random, DbState::Existing)),
            Self::OverwriteBatch => Workload::Write(WriteSpec {
                batch_size: BATCH_SIZE,
                ..write(Order::Random, DbState::Existing)
            }),
            Self::FillRand100K => Workload::Write(WriteSpec {
                divisor: 1000,
                value_size: Some(LARGE_VALUE_SIZE),
                ..write(Order::Random, DbState::Fresh)
            }),
            Self::FillSeq100K => Workload::Write(WriteSpec {
                divisor: 1000,
                value_size: Some(LARGE_VALUE_SIZE),
                ..write(Order::Sequential, DbState::Fresh)
            }),
            Self::ReadSeq => Workload::Scan,
            Self::ReadRandom => Workload::Read {
                order: Order::Random,
                divisor: 1,
                batch_size: 1,
            },
            Self::ReadRand100K => Workload::Read {
                order: Order::Random,
                divisor: 1000,
                batch_size: 1,
            },
        }
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A benchmark name that is not in the catalogue.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown benchmark '{0}'")]
pub struct UnknownBenchmark(pub String);

impl FromStr for Benchmark {
    type Err = UnknownBenchmark;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|benchmark| benchmark.name() == s)
            .ok_or_else(|| UnknownBenchmark(s.to_owned()))
    }
}

/// Splits a comma-separated list of benchmark names, skipping empty entries.
pub fn parse_list(list: &str) -> impl Iterator<Item = Result<Benchmark, UnknownBenchmark>> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for benchmark in Benchmark::ALL {
            assert_eq!(benchmark.name().parse::<Benchmark>(), Ok(benchmark));
            assert_eq!(benchmark.to_string(), benchmark.name());
        }
    }

    #[test]
    fn names_are_case_sensitive() {
        assert_eq!(
            "FillSeq".parse::<Benchmark>(),
            Err(UnknownBenchmark("FillSeq".into()))
        );
        assert!("fillrand100k".parse::<Benchmark>().is_err());
    }

    #[test]
    fn default_list_is_valid() {
        let parsed: Result<Vec<_>, _> = parse_list(DEFAULT_BENCHMARKS).collect();
        let parsed = parsed.unwrap();
        assert_eq!(parsed.len(), 14);
        assert_eq!(parsed[0], Benchmark::FillSeq);
        assert_eq!(parsed[13], Benchmark::ReadRand100K);
    }

    #[test]
    fn list_skips_empty_names() {
        let parsed: Vec<_> = parse_list(",fillseq,, bogus ,readseq,").collect();
        assert_eq!(
            parsed,
            [
                Ok(Benchmark::FillSeq),
                Err(UnknownBenchmark("bogus".into())),
                Ok(Benchmark::ReadSeq),
            ]
        );
    }

    #[test]
    fn every_write_writes_something() {
        for benchmark in Benchmark::ALL {
            if let Workload::Write(spec) = benchmark.workload() {
                assert!(spec.batch_size >= 1, "{benchmark}");
                assert!(spec.divisor >= 1, "{benchmark}");
            }
        }
    }

    #[test]
    fn catalogue_parameters() {
        let Workload::Write(spec) = Benchmark::FillSeqSync.workload() else {
            panic!("expected a write");
        };
        assert!(spec.sync);
        assert_eq!(spec.divisor, 100);
        assert_eq!(spec.order, Order::Sequential);

        let Workload::Write(spec) = Benchmark::OverwriteBatch.workload() else {
            panic!("expected a write");
        };
        assert_eq!(spec.state, DbState::Existing);
        assert_eq!(spec.batch_size, 1000);

        let Workload::Write(spec) = Benchmark::FillRand100K.workload() else {
            panic!("expected a write");
        };
        assert_eq!(spec.value_size, Some(100_000));
        assert_eq!(spec.divisor, 1000);

        assert_eq!(Benchmark::ReadSeq.workload(), Workload::Scan);
        assert_eq!(
            Benchmark::ReadRand100K.workload(),
            Workload::Read {
                order: Order::Random,
                divisor: 1000,
                batch_size: 1
            }
        );
    }
}
