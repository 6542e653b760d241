//! In-memory record store for testing.

use crate::error::StorageResult;
use crate::name::{validate_name, Namespace};
use crate::store::RecordStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::SystemTime;

#[derive(Debug, Clone)]
struct Slot {
    data: Vec<u8>,
    modified: SystemTime,
}

/// An in-memory record store.
///
/// This store keeps all records in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral engines that don't need persistence
///
/// Names are validated exactly like [`super::FileRecordStore`] does, so a
/// test against this store rejects the same names a real store would.
///
/// # Example
///
/// ```rust
/// use hoard_storage::{InMemoryRecordStore, Namespace, RecordStore};
///
/// let mut store = InMemoryRecordStore::new();
/// store.write(Namespace::Index, "user.email", b"{}").unwrap();
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<(Namespace, String), Slot>>,
}

impl InMemoryRecordStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records across all namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.write().clear();
    }
}

impl RecordStore for InMemoryRecordStore {
    fn exists(&self, namespace: Namespace, name: &str) -> StorageResult<bool> {
        validate_name(name)?;
        Ok(self
            .records
            .read()
            .contains_key(&(namespace, name.to_string())))
    }

    fn read(&self, namespace: Namespace, name: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_name(name)?;
        Ok(self
            .records
            .read()
            .get(&(namespace, name.to_string()))
            .map(|slot| slot.data.clone()))
    }

    fn write(&mut self, namespace: Namespace, name: &str, data: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        self.records.write().insert(
            (namespace, name.to_string()),
            Slot {
                data: data.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn delete(&mut self, namespace: Namespace, name: &str) -> StorageResult<bool> {
        validate_name(name)?;
        Ok(self
            .records
            .write()
            .remove(&(namespace, name.to_string()))
            .is_some())
    }

    fn modified(&self, namespace: Namespace, name: &str) -> StorageResult<Option<SystemTime>> {
        validate_name(name)?;
        Ok(self
            .records
            .read()
            .get(&(namespace, name.to_string()))
            .map(|slot| slot.modified))
    }

    fn list(&self, namespace: Namespace) -> StorageResult<Vec<String>> {
        Ok(self
            .records
            .read()
            .keys()
            .filter(|(ns, _)| *ns == namespace)
            .map(|(_, name)| name.clone())
            .collect())
    }

    fn sync(&mut self) -> StorageResult<()> {
        // Nothing is pending in memory
        Ok(())
    }
}
