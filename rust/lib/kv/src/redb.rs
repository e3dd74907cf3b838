use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::batch::{WriteBatch, WriteOp};
use crate::error::KVError;
use crate::traits::KVStore;

const ROWS: TableDefinition<&str, &[u8]> = TableDefinition::new("rows");

/// KVStore backed by a redb database file.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(KVError::storage)?;

        // Create the table up front so read transactions never miss it.
        let txn = db.begin_write().map_err(KVError::storage)?;
        txn.open_table(ROWS).map_err(KVError::storage)?;
        txn.commit().map_err(KVError::storage)?;

        debug!("RedbStore: opened {}", path.display());
        Ok(Self { db })
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let txn = self.db.begin_read().map_err(KVError::storage)?;
        let table = txn.open_table(ROWS).map_err(KVError::storage)?;
        let value = table.get(key).map_err(KVError::storage)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let txn = self.db.begin_read().map_err(KVError::storage)?;
        let table = txn.open_table(ROWS).map_err(KVError::storage)?;

        let mut results = Vec::new();
        for entry in table.range(prefix..).map_err(KVError::storage)? {
            let (key, value) = entry.map_err(KVError::storage)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_string(), value.value().to_vec()));
        }
        Ok(results)
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), KVError> {
        if batch.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write().map_err(KVError::storage)?;
        {
            let mut table = txn.open_table(ROWS).map_err(KVError::storage)?;
            for op in batch.into_ops() {
                match op {
                    WriteOp::Put { key, value } => {
                        table
                            .insert(key.as_str(), value.as_slice())
                            .map_err(KVError::storage)?;
                    }
                    WriteOp::Delete { key } => {
                        table.remove(key.as_str()).map_err(KVError::storage)?;
                    }
                }
            }
        }
        txn.commit().map_err(KVError::storage)
    }
}
