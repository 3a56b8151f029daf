use crate::error::StoreError;
use crate::metrics::record_store_error;
use crate::record::{PlayerId, PlayerRecord};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

const STORE_LABEL: &str = "memory";

/// Document store holding one record per player, keyed by identity.
///
/// Implementations must make `insert_if_absent` atomic; the ledger relies on
/// it so two creates for the same player cannot both succeed.
///
/// Reads validate what they return: `get` fails with `StoreError::Corrupt` for
/// a record that breaks the ledger's rules, and `all` logs and skips it.
pub trait PlayerStore: Send + Sync {
    /// Insert `record` unless its id is already present. Returns whether it was inserted.
    fn insert_if_absent(&self, record: &PlayerRecord) -> Result<bool, StoreError>;

    fn get(&self, id: PlayerId) -> Result<Option<PlayerRecord>, StoreError>;

    /// Overwrite the record stored under `record.id`.
    fn put(&self, record: &PlayerRecord) -> Result<(), StoreError>;

    /// Remove the record for `id`. Returns whether one existed.
    fn remove(&self, id: PlayerId) -> Result<bool, StoreError>;

    /// Every valid stored record, in no particular order.
    fn all(&self) -> Result<Vec<PlayerRecord>, StoreError>;

    /// Make pending writes durable. A no-op for stores that are not persistent.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl<T: PlayerStore + ?Sized> PlayerStore for Box<T> {
    fn insert_if_absent(&self, record: &PlayerRecord) -> Result<bool, StoreError> {
        (**self).insert_if_absent(record)
    }

    fn get(&self, id: PlayerId) -> Result<Option<PlayerRecord>, StoreError> {
        (**self).get(id)
    }

    fn put(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        (**self).put(record)
    }

    fn remove(&self, id: PlayerId) -> Result<bool, StoreError> {
        (**self).remove(id)
    }

    fn all(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        (**self).all()
    }

    fn flush(&self) -> Result<(), StoreError> {
        (**self).flush()
    }
}

/// Check a record read back from `store`, counting a failure against it.
pub(crate) fn validated(store: &str, record: PlayerRecord) -> Result<PlayerRecord, StoreError> {
    match record.validate() {
        Ok(()) => Ok(record),
        Err(e) => {
            record_store_error(store, "validate");
            Err(StoreError::Corrupt {
                id: record.id.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Non-persistent store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct InMemoryPlayerStore {
    records: RwLock<HashMap<PlayerId, PlayerRecord>>,
}

impl InMemoryPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayerStore for InMemoryPlayerStore {
    fn insert_if_absent(&self, record: &PlayerRecord) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        if records.contains_key(&record.id) {
            return Ok(false);
        }
        records.insert(record.id, record.clone());
        Ok(true)
    }

    fn get(&self, id: PlayerId) -> Result<Option<PlayerRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        records
            .get(&id)
            .cloned()
            .map(|record| validated(STORE_LABEL, record))
            .transpose()
    }

    fn put(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn remove(&self, id: PlayerId) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        Ok(records.remove(&id).is_some())
    }

    fn all(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records
            .values()
            .cloned()
            .filter_map(|record| match validated(STORE_LABEL, record) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupt player record");
                    None
                }
            })
            .collect())
    }
}
