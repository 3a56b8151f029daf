use crate::error::StoreError;
use crate::metrics::record_store_error;
use crate::record::{PlayerId, PlayerRecord};
use crate::store::{validated, PlayerStore};
use sled::{Db, IVec, Tree};
use std::path::Path;
use tracing::{debug, error, warn};

const PLAYER_TREE_NAME: &str = "players";
const STORE_LABEL: &str = "sled";

/// A PlayerStore backed by a Sled embedded database.
#[derive(Clone)] // sled::Db and sled::Tree are Arc internally
pub struct SledPlayerStore {
    db: Db,
    players: Tree,
}

impl SledPlayerStore {
    /// Opens or creates a Sled database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        tracing::info!("Opening player store at: {:?}", path);
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store in a temporary directory that is removed when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let players = db.open_tree(PLAYER_TREE_NAME)?;
        Ok(Self { db, players })
    }

    fn encode(record: &PlayerRecord) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(record).map_err(|e| {
            record_store_error(STORE_LABEL, "encode");
            error!(id = %record.id, error = %e, "Failed to serialize PlayerRecord");
            StoreError::from(e)
        })
    }

    fn decode(bytes: &IVec) -> Result<PlayerRecord, StoreError> {
        let record: PlayerRecord = bincode::deserialize(bytes).map_err(|e| {
            record_store_error(STORE_LABEL, "decode");
            error!(error = %e, "Failed to deserialize PlayerRecord");
            StoreError::from(e)
        })?;
        validated(STORE_LABEL, record)
    }

    fn io_error(operation: &str, id: Option<PlayerId>, e: sled::Error) -> StoreError {
        record_store_error(STORE_LABEL, operation);
        match id {
            Some(id) => error!(%id, error = %e, "Player store {} failed", operation),
            None => error!(error = %e, "Player store {} failed", operation),
        }
        StoreError::Io(e)
    }
}

impl PlayerStore for SledPlayerStore {
    fn insert_if_absent(&self, record: &PlayerRecord) -> Result<bool, StoreError> {
        let value = Self::encode(record)?;
        let swapped = self
            .players
            .compare_and_swap(record.id.to_key(), None as Option<&[u8]>, Some(value))
            .map_err(|e| Self::io_error("insert", Some(record.id), e))?;
        debug!(id = %record.id, inserted = swapped.is_ok(), "Insert player record");
        Ok(swapped.is_ok())
    }

    fn get(&self, id: PlayerId) -> Result<Option<PlayerRecord>, StoreError> {
        match self.players.get(id.to_key()) {
            Ok(Some(ivec)) => Self::decode(&ivec).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(Self::io_error("get", Some(id), e)),
        }
    }

    fn put(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        let value = Self::encode(record)?;
        self.players
            .insert(record.id.to_key(), value)
            .map_err(|e| Self::io_error("put", Some(record.id), e))?;
        debug!(id = %record.id, "Stored player record");
        Ok(())
    }

    fn remove(&self, id: PlayerId) -> Result<bool, StoreError> {
        let previous = self
            .players
            .remove(id.to_key())
            .map_err(|e| Self::io_error("remove", Some(id), e))?;
        Ok(previous.is_some())
    }

    fn all(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        let mut records = Vec::new();
        for item in self.players.iter() {
            let (key, value) = item.map_err(|e| Self::io_error("scan", None, e))?;
            match Self::decode(&value) {
                Ok(record) => records.push(record),
                Err(e) => warn!(key = ?key, error = %e, "Skipping corrupt player record"),
            }
        }
        Ok(records)
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map(|_| ()).map_err(|e| {
            record_store_error(STORE_LABEL, "flush");
            error!(error = %e, "Failed to flush player store");
            StoreError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sled_player_store_put_get() -> Result<(), StoreError> {
        let store = SledPlayerStore::temporary()?;
        let mut record = PlayerRecord::new(PlayerId(11), "Kestrel", 1500);
        record.talents = 2;

        store.put(&record)?;
        assert_eq!(store.get(PlayerId(11))?, Some(record));
        assert_eq!(store.get(PlayerId(12))?, None);
        Ok(())
    }

    #[test]
    fn test_sled_player_store_insert_if_absent() -> Result<(), StoreError> {
        let store = SledPlayerStore::temporary()?;
        let record = PlayerRecord::new(PlayerId(5), "Osprey", 0);

        assert!(store.insert_if_absent(&record)?);
        assert!(!store.insert_if_absent(&PlayerRecord::new(PlayerId(5), "Other", 10))?);
        assert_eq!(store.get(PlayerId(5))?.map(|r| r.callsign), Some("Osprey".to_string()));
        Ok(())
    }

    #[test]
    fn test_sled_player_store_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        {
            let store = SledPlayerStore::open(dir.path())?;
            store.put(&PlayerRecord::new(PlayerId(1), "Wren", 700))?;
            store.put(&PlayerRecord::new(PlayerId(2), "Lark", 300))?;
            store.flush()?;
        }

        let store = SledPlayerStore::open(dir.path())?;
        let mut all = store.all()?;
        all.sort_by_key(|r| r.id);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].callsign, "Wren");
        assert_eq!(all[1].granted, 300);
        Ok(())
    }

    #[test]
    fn test_sled_player_store_rejects_corrupt_counts() -> Result<(), StoreError> {
        let store = SledPlayerStore::temporary()?;
        let mut record = PlayerRecord::new(PlayerId(9), "Rook", 100_000);
        record.training = 40;
        store.put(&record)?;

        let err = store.get(PlayerId(9)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        Ok(())
    }

    #[test]
    fn test_sled_player_store_scan_skips_corrupt_entries() -> Result<(), StoreError> {
        let store = SledPlayerStore::temporary()?;
        let mut over_cap = PlayerRecord::new(PlayerId(9), "Rook", 100_000);
        over_cap.licences = 13;
        store.put(&over_cap)?;
        store.players.insert(PlayerId(10).to_key(), &b"not bincode"[..])?;
        store.put(&PlayerRecord::new(PlayerId(11), "Finch", 50))?;

        let all = store.all()?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].callsign, "Finch");
        Ok(())
    }
}
