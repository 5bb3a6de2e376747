//! Storage engines the harness can drive.

mod common;
mod in_memory;
mod sqlite;

pub use common::*;
pub use in_memory::InMemory;
pub use sqlite::{DB_FILE_PREFIX, Sqlite};
