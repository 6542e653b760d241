//! Write-back record cache.
//!
//! Every logical read and write of the engine goes through a [`Cache`].
//! The cache is authoritative while the engine runs: a record is read from
//! the store once, on first access, and never re-validated afterwards.
//! Writes only touch memory and mark the record dirty; [`Cache::flush`]
//! writes the dirty records back. Deletions are write-back too: a removed
//! record leaves a tombstone that hides the stored copy until the flush
//! deletes it. There is no background flush, so writes that were never
//! flushed are lost if the process dies.

use crate::codec::Encoding;
use crate::error::{CoreError, CoreResult};
use crate::stats::EngineStats;
use hoard_storage::{Namespace, RecordStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Write-back cache of one namespace of the record store.
///
/// Ordinary records use `Cache<Value>` and are handed out as clones.
/// Internal records use their typed form and are mutated in place through
/// [`Cache::get_mut`].
pub(crate) struct Cache<T> {
    namespace: Namespace,
    entries: HashMap<String, T>,
    dirty: BTreeSet<String>,
    tombstones: BTreeSet<String>,
    stats: Arc<EngineStats>,
}

impl<T> Cache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(namespace: Namespace, stats: Arc<EngineStats>) -> Self {
        Self {
            namespace,
            entries: HashMap::new(),
            dirty: BTreeSet::new(),
            tombstones: BTreeSet::new(),
            stats,
        }
    }

    /// Makes sure `name` is resident if it exists anywhere.
    ///
    /// Returns whether the record is now resident.
    fn fault_in(
        &mut self,
        store: &dyn RecordStore,
        encoding: Encoding,
        name: &str,
    ) -> CoreResult<bool> {
        if self.entries.contains_key(name) {
            self.stats.record_cache_hit();
            return Ok(true);
        }
        if self.tombstones.contains(name) {
            self.stats.record_cache_hit();
            return Ok(false);
        }
        self.stats.record_cache_miss();
        match store.read(self.namespace, name)? {
            Some(bytes) => {
                let value: T = encoding.decode(&bytes)?;
                debug!(namespace = %self.namespace, name, "loaded record into cache");
                self.entries.insert(name.to_string(), value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns the cached record, loading it on first access.
    pub(crate) fn load(
        &mut self,
        store: &dyn RecordStore,
        encoding: Encoding,
        name: &str,
    ) -> CoreResult<Option<&T>> {
        if self.fault_in(store, encoding, name)? {
            Ok(self.entries.get(name))
        } else {
            Ok(None)
        }
    }

    /// Returns a mutable handle to a cached record and marks it dirty.
    pub(crate) fn get_mut(
        &mut self,
        store: &dyn RecordStore,
        encoding: Encoding,
        name: &str,
    ) -> CoreResult<Option<&mut T>> {
        if !self.fault_in(store, encoding, name)? {
            return Ok(None);
        }
        self.dirty.insert(name.to_string());
        Ok(self.entries.get_mut(name))
    }

    /// Returns true if the record is cached or stored.
    pub(crate) fn contains(&self, store: &dyn RecordStore, name: &str) -> CoreResult<bool> {
        if self.entries.contains_key(name) {
            return Ok(true);
        }
        if self.tombstones.contains(name) {
            return Ok(false);
        }
        Ok(store.exists(self.namespace, name)?)
    }

    /// Inserts a new record; fails if the name is already taken in memory or on disk.
    pub(crate) fn create(
        &mut self,
        store: &dyn RecordStore,
        name: &str,
        value: T,
    ) -> CoreResult<&T> {
        if self.contains(store, name)? {
            return Err(CoreError::already_exists(name));
        }
        hoard_storage::validate_name(name)?;
        self.tombstones.remove(name);
        self.dirty.insert(name.to_string());
        Ok(self.entries.entry(name.to_string()).or_insert(value))
    }

    /// Replaces (or inserts) a record and marks it dirty.
    pub(crate) fn put(&mut self, name: &str, value: T) -> CoreResult<()> {
        hoard_storage::validate_name(name)?;
        self.tombstones.remove(name);
        self.entries.insert(name.to_string(), value);
        self.dirty.insert(name.to_string());
        Ok(())
    }

    /// Removes a record and leaves a tombstone; the stored copy is deleted
    /// at the next flush.
    ///
    /// Returns whether the record existed.
    pub(crate) fn remove(&mut self, store: &dyn RecordStore, name: &str) -> CoreResult<bool> {
        let existed = self.contains(store, name)?;
        if existed {
            self.entries.remove(name);
            self.tombstones.insert(name.to_string());
            self.dirty.insert(name.to_string());
        }
        Ok(existed)
    }

    /// Names of every record in the namespace, cached or stored.
    pub(crate) fn names(&self, store: &dyn RecordStore) -> CoreResult<BTreeSet<String>> {
        let mut names: BTreeSet<String> = store
            .list(self.namespace)?
            .into_iter()
            .filter(|name| !self.tombstones.contains(name))
            .collect();
        names.extend(self.entries.keys().cloned());
        Ok(names)
    }

    /// Writes every dirty record to the store and deletes tombstoned ones.
    ///
    /// A record stays dirty until its write succeeds, so a failed flush can
    /// simply be retried.
    pub(crate) fn flush(
        &mut self,
        store: &mut dyn RecordStore,
        encoding: Encoding,
    ) -> CoreResult<usize> {
        let pending: Vec<String> = self.dirty.iter().cloned().collect();
        let mut written = 0;
        for name in pending {
            if let Some(value) = self.entries.get(&name) {
                let bytes = encoding.encode(value)?;
                store.write(self.namespace, &name, &bytes)?;
                written += 1;
            } else if self.tombstones.contains(&name) {
                store.delete(self.namespace, &name)?;
                self.tombstones.remove(&name);
                written += 1;
            }
            self.dirty.remove(&name);
        }
        if written > 0 {
            debug!(namespace = %self.namespace, written, "flushed cache");
        }
        self.stats.record_flushed(written as u64);
        Ok(written)
    }

    /// Number of records waiting to be flushed.
    pub(crate) fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    /// Number of resident records.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
