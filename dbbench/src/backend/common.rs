use std::fmt::Debug;
use std::ops::ControlFlow;
use std::path::PathBuf;

use thiserror::Error;

/// Page size the storage engine uses unless told otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 1024;

/// A type-erased [`Backend`] instance.
pub type BoxedBackend = Box<dyn Backend>;

/// A type-erased [`Connection`] instance.
pub type BoxedConnection = Box<dyn Connection>;

/// A storage engine that can create and open numbered databases.
pub trait Backend: Debug {
    /// The backend name, used in reports.
    fn name(&self) -> &'static str;

    /// Version of the underlying storage engine.
    fn version(&self) -> String;

    /// Removes every database left behind by earlier runs.
    fn destroy(&self) -> BackendResult<()>;

    /// Opens the database with the given sequence number, creating it if necessary.
    fn open(&self, id: u32) -> BackendResult<BoxedConnection>;
}

/// An open database.
///
/// Operations are synchronous and run one at a time.
pub trait Connection: Debug {
    /// Applies engine tuning. Called once right after opening.
    fn configure(&mut self, options: &Options) -> BackendResult<()>;

    /// Creates the key/value table unless it already exists.
    ///
    /// With `without_rowid`, the key is the physical primary key of the table.
    fn create_table(&mut self, without_rowid: bool) -> BackendResult<()>;

    /// Sets whether writes wait until they are durable.
    fn set_sync(&mut self, sync: bool) -> BackendResult<()>;

    /// Inserts or replaces the value stored under `key`.
    fn upsert(&mut self, key: &[u8], value: &[u8]) -> BackendResult<()>;

    /// Looks up `key` and returns the number of matching rows.
    fn point_lookup(&mut self, key: &[u8]) -> BackendResult<usize>;

    /// Visits all rows in key order until `visit` breaks.
    fn ordered_scan(
        &mut self,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    ) -> BackendResult<()>;

    fn begin_transaction(&mut self) -> BackendResult<()>;

    fn end_transaction(&mut self) -> BackendResult<()>;

    /// Discards an open transaction.
    fn rollback_transaction(&mut self) -> BackendResult<()>;

    /// Flushes the write-ahead log into the database.
    fn checkpoint(&mut self) -> BackendResult<()>;

    /// Closes the database, reporting errors that would otherwise be lost on drop.
    fn close(self: Box<Self>) -> BackendResult<()>;
}

/// Journal mode of a database.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Journal {
    /// Write-ahead logging.
    Wal,
    /// Whatever the engine uses by default.
    Default,
}

/// Engine tuning applied to every opened database.
#[derive(Clone, Debug)]
pub struct Options {
    /// Number of pages held in the page cache.
    pub cache_pages: u32,
    /// Page size of newly created databases.
    pub page_size: u32,
    pub journal: Journal,
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// IO errors related to database files.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A database could not be opened.
    #[error("open error: {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error stemming from the storage engine, specific to an operation.
    #[error("storage backend error: {context}")]
    Generic {
        context: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BackendError {
    /// Creates a [`BackendError::Generic`] with the given context.
    pub fn generic<E>(context: impl Into<String>, cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Generic {
            context: context.into(),
            cause: cause.into(),
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
