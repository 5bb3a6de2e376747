//! SQLite via `rusqlite`.
//!
//! Every database is a file `dbbench_sqlite3-<id>.db` holding one `test (key, value)` table.

use std::fs;
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection as RawConnection, params};

use super::common::{
    Backend, BackendError, BackendResult, BoxedConnection, Connection, DEFAULT_PAGE_SIZE, Journal,
    Options,
};

/// File name prefix of every database created by the harness.
pub const DB_FILE_PREFIX: &str = "dbbench_sqlite3";

/// Pages written to the WAL before SQLite checkpoints on its own.
const WAL_AUTOCHECKPOINT: u32 = 4096;

const UPSERT: &str = "REPLACE INTO test (key, value) VALUES (?1, ?2)";
const LOOKUP: &str = "SELECT * FROM test WHERE key = ?1";
const SCAN: &str = "SELECT key, value FROM test ORDER BY key";
const BEGIN: &str = "BEGIN TRANSACTION";
const END: &str = "END TRANSACTION";

/// SQLite databases in a directory.
#[derive(Debug)]
pub struct Sqlite {
    dir: PathBuf,
}

impl Sqlite {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the database with the given sequence number.
    pub fn path(&self, id: u32) -> PathBuf {
        self.dir.join(format!("{DB_FILE_PREFIX}-{id}.db"))
    }
}

impl Backend for Sqlite {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn version(&self) -> String {
        rusqlite::version().to_owned()
    }

    fn destroy(&self) -> BackendResult<()> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if is_db_file(&path) {
                tracing::debug!(path = %path.display(), "removing stale database");
                fs::remove_file(&path)?;
            }
        }

        Ok(())
    }

    fn open(&self, id: u32) -> BackendResult<BoxedConnection> {
        let path = self.path(id);
        let conn = RawConnection::open(&path).map_err(|cause| BackendError::Open {
            path: path.clone(),
            cause: cause.into(),
        })?;

        tracing::debug!(path = %path.display(), "opened database");
        Ok(Box::new(SqliteConnection { conn }))
    }
}

#[derive(Debug)]
struct SqliteConnection {
    conn: RawConnection,
}

impl SqliteConnection {
    fn execute_batch(&self, sql: &str) -> BackendResult<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|cause| BackendError::generic(format!("SQL error in `{sql}`"), cause))
    }

    fn execute_cached(&self, sql: &str) -> BackendResult<()> {
        self.conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute([]))
            .map_err(|cause| BackendError::generic(format!("step error in `{sql}`"), cause))?;
        Ok(())
    }
}

impl Connection for SqliteConnection {
    fn configure(&mut self, options: &Options) -> BackendResult<()> {
        self.execute_batch(&format!("PRAGMA cache_size = {}", options.cache_pages))?;

        if options.page_size != DEFAULT_PAGE_SIZE {
            self.execute_batch(&format!("PRAGMA page_size = {}", options.page_size))?;
        }

        if options.journal == Journal::Wal {
            self.execute_batch("PRAGMA journal_mode = WAL")?;
            self.execute_batch(&format!("PRAGMA wal_autocheckpoint = {WAL_AUTOCHECKPOINT}"))?;
        }

        self.execute_batch("PRAGMA locking_mode = EXCLUSIVE")
    }

    fn create_table(&mut self, without_rowid: bool) -> BackendResult<()> {
        let suffix = if without_rowid { " WITHOUT ROWID" } else { "" };
        self.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS test (key blob, value blob, PRIMARY KEY (key)){suffix}"
        ))
    }

    fn set_sync(&mut self, sync: bool) -> BackendResult<()> {
        let mode = if sync { "FULL" } else { "OFF" };
        self.execute_batch(&format!("PRAGMA synchronous = {mode}"))
    }

    fn upsert(&mut self, key: &[u8], value: &[u8]) -> BackendResult<()> {
        self.conn
            .prepare_cached(UPSERT)
            .and_then(|mut stmt| stmt.execute(params![key, value]))
            .map_err(|cause| BackendError::generic("upsert", cause))?;
        Ok(())
    }

    fn point_lookup(&mut self, key: &[u8]) -> BackendResult<usize> {
        let lookup = || -> rusqlite::Result<usize> {
            let mut stmt = self.conn.prepare_cached(LOOKUP)?;
            let mut rows = stmt.query(params![key])?;
            let mut matched = 0;
            while rows.next()?.is_some() {
                matched += 1;
            }
            Ok(matched)
        };

        lookup().map_err(|cause| BackendError::generic("point lookup", cause))
    }

    fn ordered_scan(
        &mut self,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    ) -> BackendResult<()> {
        let mut scan = || -> rusqlite::Result<()> {
            // Not cached, the statement is finalized when the scan returns.
            let mut stmt = self.conn.prepare(SCAN)?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let key = as_bytes(row.get_ref(0)?);
                let value = as_bytes(row.get_ref(1)?);
                if visit(key, value).is_break() {
                    break;
                }
            }
            Ok(())
        };

        scan().map_err(|cause| BackendError::generic("ordered scan", cause))
    }

    fn begin_transaction(&mut self) -> BackendResult<()> {
        self.execute_cached(BEGIN)
    }

    fn end_transaction(&mut self) -> BackendResult<()> {
        self.execute_cached(END)
    }

    fn rollback_transaction(&mut self) -> BackendResult<()> {
        self.execute_batch("ROLLBACK")
    }

    fn checkpoint(&mut self) -> BackendResult<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(FULL)", [], |_| Ok(()))
            .map_err(|cause| BackendError::generic("wal checkpoint", cause))
    }

    fn close(self: Box<Self>) -> BackendResult<()> {
        self.conn
            .close()
            .map_err(|(_conn, cause)| BackendError::generic("close", cause))
    }
}

/// Returns the stored bytes of a blob or text column.
fn as_bytes(value: ValueRef<'_>) -> &[u8] {
    match value {
        ValueRef::Blob(bytes) | ValueRef::Text(bytes) => bytes,
        ValueRef::Null | ValueRef::Integer(_) | ValueRef::Real(_) => &[],
    }
}

/// Returns `true` if `path` looks like a database created by the harness.
fn is_db_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(DB_FILE_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Options {
        Options {
            cache_pages: 64,
            page_size: DEFAULT_PAGE_SIZE,
            journal: Journal::Wal,
        }
    }

    fn open(backend: &Sqlite, id: u32) -> BoxedConnection {
        let mut conn = backend.open(id).unwrap();
        conn.configure(&options()).unwrap();
        conn.create_table(true).unwrap();
        conn
    }

    #[test]
    fn upsert_replaces_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Sqlite::new(dir.path());
        let mut conn = open(&backend, 1);

        conn.upsert(b"0000000000000001", b"first").unwrap();
        conn.upsert(b"0000000000000001", b"second").unwrap();
        conn.upsert(b"0000000000000002", b"third").unwrap();

        let mut rows = Vec::new();
        conn.ordered_scan(&mut |key, value| {
            rows.push((key.to_vec(), value.to_vec()));
            ControlFlow::Continue(())
        })
        .unwrap();

        assert_eq!(
            rows,
            [
                (b"0000000000000001".to_vec(), b"second".to_vec()),
                (b"0000000000000002".to_vec(), b"third".to_vec()),
            ]
        );
        conn.close().unwrap();
    }

    #[test]
    fn lookups_count_matching_rows() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Sqlite::new(dir.path());
        let mut conn = open(&backend, 1);

        conn.upsert(b"a", b"1").unwrap();
        assert_eq!(conn.point_lookup(b"a").unwrap(), 1);
        assert_eq!(conn.point_lookup(b"b").unwrap(), 0);
    }

    #[test]
    fn scan_stops_when_visitor_breaks() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Sqlite::new(dir.path());
        let mut conn = open(&backend, 1);
        for key in [b"a", b"b", b"c"] {
            conn.upsert(key, b"").unwrap();
        }

        let mut visited = 0;
        conn.ordered_scan(&mut |_, _| {
            visited += 1;
            if visited == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
        assert_eq!(visited, 2);
    }

    #[test]
    fn transactions_commit_and_roll_back() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Sqlite::new(dir.path());
        let mut conn = open(&backend, 1);

        conn.begin_transaction().unwrap();
        conn.upsert(b"kept", b"").unwrap();
        conn.end_transaction().unwrap();

        conn.begin_transaction().unwrap();
        conn.upsert(b"dropped", b"").unwrap();
        conn.rollback_transaction().unwrap();

        assert_eq!(conn.point_lookup(b"kept").unwrap(), 1);
        assert_eq!(conn.point_lookup(b"dropped").unwrap(), 0);
        conn.checkpoint().unwrap();
    }

    #[test]
    fn create_table_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Sqlite::new(dir.path());
        let mut conn = open(&backend, 1);
        conn.upsert(b"a", b"1").unwrap();
        conn.close().unwrap();

        let conn = open(&backend, 1);
        drop(conn);

        let mut conn = backend.open(1).unwrap();
        conn.create_table(false).unwrap();
        assert_eq!(conn.point_lookup(b"a").unwrap(), 1);
    }

    #[test]
    fn destroy_removes_only_harness_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Sqlite::new(dir.path());
        open(&backend, 1).close().unwrap();
        open(&backend, 2).close().unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"keep me").unwrap();

        backend.destroy().unwrap();

        let remaining: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(remaining, [dir.path().join("unrelated.txt")]);
        assert!(!remaining.iter().any(|path| is_db_file(path)));
    }

    #[test]
    fn destroy_tolerates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Sqlite::new(dir.path().join("missing"));
        backend.destroy().unwrap();
    }

    #[test]
    fn open_fails_for_unusable_path() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Sqlite::new(dir.path().join("missing"));
        let err = backend.open(1).unwrap_err();
        assert!(matches!(err, BackendError::Open { .. }), "{err}");
    }
}
