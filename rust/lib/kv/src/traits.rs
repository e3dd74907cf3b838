use crate::batch::WriteBatch;
use crate::error::KVError;

/// Byte-oriented key-value storage with ordered prefix scans.
///
/// Implementations must apply a [`WriteBatch`] atomically: either every
/// operation in it is visible afterwards or none is.
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Scan all keys starting with `prefix`. Returns (key, value) pairs sorted by key.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;

    /// Apply all puts and deletes in `batch` in one transaction.
    fn apply(&self, batch: WriteBatch) -> Result<(), KVError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        let mut batch = WriteBatch::new();
        batch.put(key, value.to_vec());
        self.apply(batch)
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.apply(batch)
    }
}
