//! In-memory backend for tests and dry runs.
//!
//! Databases are `BTreeMap`s keyed by their sequence number. The backend is [`Clone`] so tests
//! can keep a handle for inspection while the runner owns a boxed copy. Besides the data it
//! records which keys were looked up and counts upserts, transactions and checkpoints.

use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::common::{
    Backend, BackendError, BackendResult, BoxedConnection, Connection, Options,
};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Debug, Default)]
struct State {
    /// `None` until the table has been created.
    databases: HashMap<u32, Option<Table>>,
    latest: Option<u32>,
    lookups: Vec<Vec<u8>>,
    upserts: u64,
    transactions: u64,
    checkpoints: u64,
}

impl State {
    fn table(&mut self, id: u32) -> BackendResult<&mut Table> {
        self.databases
            .get_mut(&id)
            .and_then(Option::as_mut)
            .ok_or_else(|| BackendError::generic(format!("database {id}"), "no such table: test"))
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemory {
    state: Arc<Mutex<State>>,
}

impl InMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of rows in database `id`, or `None` if it has no table.
    pub fn len(&self, id: u32) -> Option<usize> {
        self.lock()
            .databases
            .get(&id)
            .and_then(Option::as_ref)
            .map(Table::len)
    }

    /// Keys stored in database `id`, in order.
    pub fn keys(&self, id: u32) -> Vec<Vec<u8>> {
        self.lock()
            .databases
            .get(&id)
            .and_then(Option::as_ref)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every key passed to a point lookup, in call order.
    pub fn lookups(&self) -> Vec<Vec<u8>> {
        self.lock().lookups.clone()
    }

    pub fn upserts(&self) -> u64 {
        self.lock().upserts
    }

    /// Number of committed transactions.
    pub fn transactions(&self) -> u64 {
        self.lock().transactions
    }

    pub fn checkpoints(&self) -> u64 {
        self.lock().checkpoints
    }

    /// Sequence number of the most recently opened database.
    pub fn latest(&self) -> Option<u32> {
        self.lock().latest
    }
}

impl Backend for InMemory {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_owned()
    }

    fn destroy(&self) -> BackendResult<()> {
        self.lock().databases.clear();
        Ok(())
    }

    fn open(&self, id: u32) -> BackendResult<BoxedConnection> {
        let mut state = self.lock();
        state.databases.entry(id).or_default();
        state.latest = Some(id);

        Ok(Box::new(InMemoryConnection {
            backend: self.clone(),
            id,
            pending: None,
        }))
    }
}

#[derive(Debug)]
struct InMemoryConnection {
    backend: InMemory,
    id: u32,
    /// Snapshot of the table taken when a transaction began.
    pending: Option<Table>,
}

impl Connection for InMemoryConnection {
    fn configure(&mut self, _options: &Options) -> BackendResult<()> {
        Ok(())
    }

    fn create_table(&mut self, _without_rowid: bool) -> BackendResult<()> {
        let mut state = self.backend.lock();
        let table = state.databases.entry(self.id).or_default();
        if table.is_none() {
            *table = Some(Table::new());
        }
        Ok(())
    }

    fn set_sync(&mut self, _sync: bool) -> BackendResult<()> {
        Ok(())
    }

    fn upsert(&mut self, key: &[u8], value: &[u8]) -> BackendResult<()> {
        let mut state = self.backend.lock();
        state.table(self.id)?.insert(key.to_vec(), value.to_vec());
        state.upserts += 1;
        Ok(())
    }

    fn point_lookup(&mut self, key: &[u8]) -> BackendResult<usize> {
        let mut state = self.backend.lock();
        let matched = usize::from(state.table(self.id)?.contains_key(key));
        state.lookups.push(key.to_vec());
        Ok(matched)
    }

    fn ordered_scan(
        &mut self,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    ) -> BackendResult<()> {
        // The visitor may take long, so it does not run under the lock.
        let rows = self.backend.lock().table(self.id)?.clone();
        for (key, value) in &rows {
            if visit(key, value).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn begin_transaction(&mut self) -> BackendResult<()> {
        if self.pending.is_some() {
            return Err(BackendError::generic(
                "begin transaction",
                "cannot start a transaction within a transaction",
            ));
        }
        let snapshot = self.backend.lock().table(self.id)?.clone();
        self.pending = Some(snapshot);
        Ok(())
    }

    fn end_transaction(&mut self) -> BackendResult<()> {
        if self.pending.take().is_none() {
            return Err(BackendError::generic(
                "end transaction",
                "cannot commit - no transaction is active",
            ));
        }
        self.backend.lock().transactions += 1;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> BackendResult<()> {
        let Some(snapshot) = self.pending.take() else {
            return Ok(());
        };
        *self.backend.lock().table(self.id)? = snapshot;
        Ok(())
    }

    fn checkpoint(&mut self) -> BackendResult<()> {
        self.backend.lock().checkpoints += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> BackendResult<()> {
        Ok(())
    }
}
