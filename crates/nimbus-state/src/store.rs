//! StateStore — redb-backed persistence for the nimbus model.
//!
//! All access goes through short-lived scopes:
//!
//! - [`StateStore::read`] runs a closure against a read transaction.
//! - [`StateStore::write`] runs a closure against a write transaction and
//!   commits only if the closure returns `Ok`. An `Err` aborts the
//!   transaction, so a failure between two writes never leaves a half-written
//!   model behind.
//!
//! Callers keep remote calls outside the closures; a scope brackets model
//! access only. Values are JSON-serialized into redb's `&[u8]` value columns.
//! The store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable, WriteTransaction};
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::tables::{self, Entity};
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in tables::ALL {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Run `f` inside a read-only transaction.
    pub fn read<T, E>(&self, f: impl FnOnce(&ReadScope<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StateError>,
    {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| StateError::Transaction(e.to_string()))?;
        f(&ReadScope { txn: &txn })
    }

    /// Run `f` inside a write transaction.
    ///
    /// Commits when `f` returns `Ok`, aborts when it returns `Err`.
    pub fn write<T, E>(&self, f: impl FnOnce(&WriteScope<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StateError>,
    {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| StateError::Transaction(e.to_string()))?;
        let result = f(&WriteScope { txn: &txn });
        match result {
            Ok(value) => {
                txn.commit()
                    .map_err(|e| StateError::Transaction(e.to_string()))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = txn.abort() {
                    warn!(error = %abort, "failed to abort write transaction");
                }
                Err(e)
            }
        }
    }

    /// Get a single value outside of an explicit scope.
    pub fn get<E: Entity>(&self, key: &str) -> StateResult<Option<E>> {
        self.read(|tx| tx.get(key))
    }

    /// Insert or update a single value outside of an explicit scope.
    pub fn put<E: Entity>(&self, value: &E) -> StateResult<()> {
        self.write(|tx| tx.put(value))
    }

    /// Import a whole model snapshot atomically. Returns the number of
    /// values written.
    pub fn import(&self, snapshot: &ModelSnapshot) -> StateResult<usize> {
        let count = self.write(|tx| {
            let mut count = 0;
            count += tx.put_all(&snapshot.virtual_machines)?;
            count += tx.put_all(&snapshot.components)?;
            count += tx.put_all(&snapshot.applications)?;
            count += tx.put_all(&snapshot.application_instances)?;
            count += tx.put_all(&snapshot.instances)?;
            count += tx.put_all(&snapshot.hardware)?;
            count += tx.put_all(&snapshot.images)?;
            Ok::<_, StateError>(count)
        })?;
        debug!(count, "model snapshot imported");
        Ok(count)
    }
}

// ── Scopes ─────────────────────────────────────────────────────────

/// Model access inside a read transaction.
pub struct ReadScope<'a> {
    txn: &'a ReadTransaction,
}

impl ReadScope<'_> {
    /// Get a value by key.
    pub fn get<E: Entity>(&self, key: &str) -> StateResult<Option<E>> {
        let table = self.txn.open_table(E::TABLE).map_err(map_err!(Table))?;
        get_from(&table, key)
    }

    /// Get a value by key, failing with [`StateError::NotFound`] if absent.
    pub fn require<E: Entity>(&self, key: &str) -> StateResult<E> {
        self.get(key)?.ok_or_else(|| not_found::<E>(key))
    }

    /// List every value of a table.
    pub fn list<E: Entity>(&self) -> StateResult<Vec<E>> {
        let table = self.txn.open_table(E::TABLE).map_err(map_err!(Table))?;
        list_from(&table)
    }

    /// Look up a hardware flavor by its natural key.
    pub fn hardware_in_cloud(&self, base_id: &str, cloud: &str) -> StateResult<Option<Hardware>> {
        self.get(&cloud_resource_key(cloud, base_id))
    }

    /// Look up an image by its natural key.
    pub fn image_in_cloud(&self, base_id: &str, cloud: &str) -> StateResult<Option<Image>> {
        self.get(&cloud_resource_key(cloud, base_id))
    }
}

/// Model access inside a write transaction.
pub struct WriteScope<'a> {
    txn: &'a WriteTransaction,
}

impl WriteScope<'_> {
    /// Get a value by key, seeing writes made earlier in this scope.
    pub fn get<E: Entity>(&self, key: &str) -> StateResult<Option<E>> {
        let table = self.txn.open_table(E::TABLE).map_err(map_err!(Table))?;
        get_from(&table, key)
    }

    /// Get a value by key, failing with [`StateError::NotFound`] if absent.
    pub fn require<E: Entity>(&self, key: &str) -> StateResult<E> {
        self.get(key)?.ok_or_else(|| not_found::<E>(key))
    }

    /// List every value of a table.
    pub fn list<E: Entity>(&self) -> StateResult<Vec<E>> {
        let table = self.txn.open_table(E::TABLE).map_err(map_err!(Table))?;
        list_from(&table)
    }

    /// Insert or update a value.
    pub fn put<E: Entity>(&self, value: &E) -> StateResult<()> {
        let key = value.table_key();
        let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let mut table = self.txn.open_table(E::TABLE).map_err(map_err!(Table))?;
        table
            .insert(key.as_str(), bytes.as_slice())
            .map_err(map_err!(Write))?;
        debug!(kind = E::KIND, %key, "stored");
        Ok(())
    }

    /// Insert or update several values. Returns how many were written.
    pub fn put_all<E: Entity>(&self, values: &[E]) -> StateResult<usize> {
        for value in values {
            self.put(value)?;
        }
        Ok(values.len())
    }

    /// Delete a value by key. Returns true if it existed.
    pub fn delete<E: Entity>(&self, key: &str) -> StateResult<bool> {
        let mut table = self.txn.open_table(E::TABLE).map_err(map_err!(Table))?;
        let existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        debug!(kind = E::KIND, %key, existed, "deleted");
        Ok(existed)
    }
}

fn get_from<E, T>(table: &T, key: &str) -> StateResult<Option<E>>
where
    E: Entity,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let value: E =
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn list_from<E, T>(table: &T) -> StateResult<Vec<E>>
where
    E: Entity,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let value: E = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        results.push(value);
    }
    Ok(results)
}

fn not_found<E: Entity>(key: &str) -> StateError {
    StateError::NotFound {
        kind: E::KIND,
        key: key.to_string(),
    }
}
