//! The engine: record lifecycle and derived-structure maintenance.

mod shared;

pub use shared::SharedEngine;

use crate::cache::Cache;
use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeType};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::grouping::GroupingRecord;
use crate::index::{IndexRecord, UniquenessPolicy};
use crate::lock::StoreLock;
use crate::record::{
    field_key, get_path, id_matches_type, type_of_id, validate_type_name, Record, ID_FIELD,
};
use crate::registry::Registry;
use crate::rel::{Direction, RelRecord};
use crate::schema::RelDecl;
use crate::stats::{EngineStats, StatsSnapshot};
use crate::system::SystemRecord;
use hoard_storage::{FileRecordStore, InMemoryRecordStore, Namespace, RecordStore};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// An object-persistence engine over one record store.
///
/// The engine owns its write-back caches, its configuration registry and
/// its counters. Methods take `&mut self`, so one engine has one writer at
/// a time; wrap it in a [`SharedEngine`] to call it from several threads.
///
/// Writes stay in memory until [`Engine::flush`] or [`Engine::shut_down`].
/// Dropping an engine does not flush it.
///
/// ```rust
/// use hoard_core::{Engine, TypeDecl};
/// use serde_json::json;
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut engine = Engine::open(dir.path(), Default::default()).unwrap();
/// engine.declare(&TypeDecl::new("task").index("title")).unwrap();
/// let task = engine.create("task", json!({ "title": "write docs" })).unwrap();
/// engine.shut_down().unwrap();
///
/// let mut engine = Engine::open(dir.path(), Default::default()).unwrap();
/// assert_eq!(engine.get(task["id"].as_str().unwrap()).unwrap(), task);
/// ```
pub struct Engine {
    pub(crate) config: Config,
    pub(crate) store: Box<dyn RecordStore>,
    lock: Option<StoreLock>,
    pub(crate) objects: Cache<Value>,
    pub(crate) indexes: Cache<IndexRecord>,
    pub(crate) groupings: Cache<GroupingRecord>,
    pub(crate) rels: Cache<RelRecord>,
    pub(crate) system: Cache<SystemRecord>,
    pub(crate) registry: Registry,
    feed: ChangeFeed,
    pub(crate) stats: Arc<EngineStats>,
    is_open: bool,
}

impl Engine {
    /// Opens the store directory at `path`.
    ///
    /// # Errors
    ///
    /// - the directory is missing and `create_if_missing` is off
    /// - `StoreLocked` if `use_lock` is on and another engine holds the lock
    /// - stored configuration records cannot be read
    pub fn open(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_operation(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }
        let lock = if config.use_lock {
            Some(StoreLock::acquire(path)?)
        } else {
            None
        };
        let store = FileRecordStore::open(path)?;
        info!(path = %path.display(), encoding = ?config.encoding, "opening engine");
        let mut engine = Self::build(config, Box::new(store), lock);
        engine.init()?;
        Ok(engine)
    }

    /// Opens an engine over an empty in-memory store.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::with_store(Config::default(), Box::new(InMemoryRecordStore::new()))
    }

    /// Opens an engine over any record store.
    pub fn with_store(config: Config, store: Box<dyn RecordStore>) -> CoreResult<Self> {
        let mut engine = Self::build(config, store, None);
        engine.init()?;
        Ok(engine)
    }

    fn build(config: Config, store: Box<dyn RecordStore>, lock: Option<StoreLock>) -> Self {
        let stats = Arc::new(EngineStats::new());
        Self {
            config,
            store,
            lock,
            objects: Cache::new(Namespace::Object, Arc::clone(&stats)),
            indexes: Cache::new(Namespace::Index, Arc::clone(&stats)),
            groupings: Cache::new(Namespace::Grouping, Arc::clone(&stats)),
            rels: Cache::new(Namespace::Rel, Arc::clone(&stats)),
            system: Cache::new(Namespace::System, Arc::clone(&stats)),
            registry: Registry::new(),
            feed: ChangeFeed::new(),
            stats,
            is_open: true,
        }
    }

    /// Rebuilds the configuration registry from the stored index, grouping
    /// and rel records.
    pub fn init(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        let encoding = self.config.encoding;
        self.registry.clear();

        for name in self.indexes.names(&*self.store)? {
            if let Some(index) = self.indexes.load(&*self.store, encoding, &name)? {
                if let Some(existing) = self.registry.index_field(&index.type_name) {
                    warn!(
                        type_name = %index.type_name,
                        kept = existing,
                        ignored = %index.field,
                        "type has more than one stored index"
                    );
                    continue;
                }
                self.registry.add_index(&index.type_name, &index.field);
            }
        }
        for name in self.groupings.names(&*self.store)? {
            if let Some(grouping) = self.groupings.load(&*self.store, encoding, &name)? {
                self.registry
                    .add_grouping(&name, &grouping.type_name, &grouping.field);
            }
        }
        for name in self.rels.names(&*self.store)? {
            if let Some(rel) = self.rels.load(&*self.store, encoding, &name)? {
                if rel.direction == Direction::LeftToRight {
                    self.registry.add_rel(rel.decl());
                }
            }
        }

        info!(
            indexes = self.registry.indexed_types().len(),
            groupings = self.registry.grouping_names().len(),
            rels = self.registry.rels().len(),
            "engine initialized"
        );
        Ok(())
    }

    /// Writes every dirty record to the store. Returns how many were written.
    pub fn flush(&mut self) -> CoreResult<usize> {
        self.ensure_open()?;
        let encoding = self.config.encoding;
        let written = self.objects.flush(&mut *self.store, encoding)?
            + self.indexes.flush(&mut *self.store, encoding)?
            + self.groupings.flush(&mut *self.store, encoding)?
            + self.rels.flush(&mut *self.store, encoding)?
            + self.system.flush(&mut *self.store, encoding)?;
        self.stats.record_flush();
        debug!(written, "flushed engine");
        Ok(written)
    }

    /// Flushes, syncs the store and releases the directory lock.
    ///
    /// Every later call fails with `EngineClosed`. Shutting down twice is a
    /// no-op.
    pub fn shut_down(&mut self) -> CoreResult<()> {
        if !self.is_open {
            return Ok(());
        }
        let written = self.flush()?;
        self.store.sync()?;
        self.lock = None;
        self.is_open = false;
        info!(written, "engine shut down");
        Ok(())
    }

    /// Returns true until [`Engine::shut_down`] succeeds.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub(crate) fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open {
            Ok(())
        } else {
            Err(CoreError::EngineClosed)
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Identifiers of every ordinary record, cached or stored, sorted.
    pub fn list_all_identifiers(&self) -> CoreResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.objects.names(&*self.store)?.into_iter().collect())
    }

    /// Creates a record of a type and returns it with its new `id`.
    ///
    /// The type's indexed field is required and must be free. Every check
    /// (index, rel array fields) runs before anything is written, so a
    /// rejected create changes nothing.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if `values` is not an object or carries an `id`
    /// - `MissingField` if the indexed field has no indexable value
    /// - `DuplicateValue` if another record owns the indexed value
    pub fn create(&mut self, type_name: &str, values: Value) -> CoreResult<Record> {
        self.ensure_open()?;
        validate_type_name(type_name)?;
        let Value::Object(mut fields) = values else {
            return Err(CoreError::invalid_operation(format!(
                "{type_name} records must be JSON objects"
            )));
        };
        if fields.contains_key(ID_FIELD) {
            return Err(CoreError::invalid_operation(format!(
                "{type_name} records get their {ID_FIELD} from the engine"
            )));
        }

        let id = self.peek_id(type_name)?;
        if self.objects.contains(&*self.store, &id)? {
            return Err(CoreError::already_exists(id));
        }
        fields.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        let record = Value::Object(fields);

        let index_key = match self.registry.index_field(type_name).map(str::to_string) {
            Some(field) => {
                let key = field_key(&record, &field)
                    .ok_or_else(|| CoreError::missing_field(&id, &field))?;
                self.index_ref(type_name)?.check_free(&key)?;
                Some(key)
            }
            None => None,
        };
        let rel_changes = self.plan_rel_sync(type_name, &id, None, &record)?;

        self.next_number(type_name)?;
        let tick = self.logical_timestamp()?;
        self.objects.create(&*self.store, &id, record.clone())?;
        if let Some(key) = index_key {
            self.index_mut(type_name)?
                .insert(&key, &id, UniquenessPolicy::Strict)?;
        }
        self.update_grouping(type_name, &id)?;
        self.apply_rel_sync(&rel_changes)?;

        self.stats.record_create();
        debug!(%id, tick, "created record");
        self.emit(tick, &id, type_name, ChangeType::Created, Some(&record));
        Ok(record)
    }

    /// Returns a copy of a record.
    ///
    /// With `allow_missing`, a record that does not exist yields `None`
    /// instead of `NotFound`.
    pub fn load(&mut self, id: &str, allow_missing: bool) -> CoreResult<Option<Record>> {
        self.ensure_open()?;
        let encoding = self.config.encoding;
        match self.objects.load(&*self.store, encoding, id)? {
            Some(record) => Ok(Some(record.clone())),
            None if allow_missing => Ok(None),
            None => Err(CoreError::not_found(id)),
        }
    }

    /// Returns a copy of a record that must exist.
    pub fn get(&mut self, id: &str) -> CoreResult<Record> {
        self.load(id, false)?
            .ok_or_else(|| CoreError::not_found(id))
    }

    /// Merges `values` into a record and returns the result.
    ///
    /// The merge is shallow: each top-level key of `values` replaces the
    /// record's value for that key. Indexes, groupings and mirrored rels
    /// follow the change, and every check runs before anything is written.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the record does not exist
    /// - `InvalidOperation` if `values` is not an object or changes `id`
    /// - `MissingField` / `DuplicateValue` for an unusable indexed value
    pub fn update(&mut self, id: &str, values: Value) -> CoreResult<Record> {
        self.ensure_open()?;
        let type_name = type_of_id(id)?;
        let Value::Object(patch) = values else {
            return Err(CoreError::invalid_operation(format!(
                "update of {id} must be a JSON object"
            )));
        };
        if let Some(new_id) = patch.get(ID_FIELD) {
            if new_id.as_str() != Some(id) {
                return Err(CoreError::invalid_operation(format!(
                    "the {ID_FIELD} of {id} cannot change"
                )));
            }
        }

        let before = self.get(id)?;
        let mut after = before.clone();
        if let Value::Object(fields) = &mut after {
            fields.extend(patch);
        }

        let indexed_field = self.registry.index_field(&type_name).map(str::to_string);
        if let Some(field) = &indexed_field {
            if get_path(&before, field) != get_path(&after, field) {
                let key = field_key(&after, field)
                    .ok_or_else(|| CoreError::missing_field(id, field))?;
                self.index_ref(&type_name)?.check_change(id, Some(&key))?;
            }
        }
        let rel_changes = self.plan_rel_sync(&type_name, id, Some(&before), &after)?;

        let tick = self.logical_timestamp()?;
        let encoding = self.config.encoding;
        match self.objects.get_mut(&*self.store, encoding, id)? {
            Some(cached) => *cached = after.clone(),
            None => return Err(CoreError::not_found(id)),
        }
        if let Some(field) = &indexed_field {
            self.update_indexed_field(
                id,
                &type_name,
                field,
                get_path(&before, field),
                get_path(&after, field),
            )?;
        }
        for field in self.registry.grouped_fields(&type_name) {
            self.update_grouping_for_field_change(
                &type_name,
                id,
                &field,
                get_path(&before, &field),
                get_path(&after, &field),
            )?;
        }
        self.apply_rel_sync(&rel_changes)?;

        self.stats.record_update();
        debug!(id, tick, "updated record");
        self.emit(tick, id, &type_name, ChangeType::Updated, Some(&after));
        Ok(after)
    }

    /// Deletes a record and every index, grouping and rel entry naming it.
    ///
    /// Like every other write, the removal reaches the store at the next
    /// flush.
    pub fn delete(&mut self, type_name: &str, id: &str) -> CoreResult<()> {
        self.ensure_open()?;
        if !id_matches_type(id, type_name) {
            return Err(CoreError::invalid_operation(format!(
                "{id} is not a {type_name} record"
            )));
        }
        let record = self.get(id)?;

        if let Some(field) = self.registry.index_field(type_name).map(str::to_string) {
            let index = self.index_mut(type_name)?;
            let removed = field_key(&record, &field).map_or(false, |key| index.remove(&key, id));
            if !removed {
                index.remove_id(id);
            }
        }
        self.remove_from_grouping(type_name, id)?;
        self.remove_object_from_all_rels(id)?;
        self.objects.remove(&*self.store, id)?;

        let tick = self.logical_timestamp()?;
        self.stats.record_delete();
        debug!(id, tick, "deleted record");
        self.emit(tick, id, type_name, ChangeType::Deleted, None);
        Ok(())
    }

    /// Returns true if the record exists in the cache or the store.
    pub fn exists(&self, id: &str) -> CoreResult<bool> {
        self.ensure_open()?;
        self.objects.contains(&*self.store, id)
    }

    /// Time the record was last written to the store.
    ///
    /// Changes that were not flushed yet are not reflected.
    pub fn last_modified(&self, id: &str) -> CoreResult<Option<SystemTime>> {
        self.ensure_open()?;
        if !self.objects.contains(&*self.store, id)? {
            return Ok(None);
        }
        Ok(self.store.modified(Namespace::Object, id)?)
    }

    /// Every record of a type, in index key order.
    ///
    /// # Errors
    ///
    /// Fails with `NotConfigured` if the type has no index.
    pub fn list(&mut self, type_name: &str) -> CoreResult<Vec<Record>> {
        self.ensure_open()?;
        let mut records = Vec::new();
        for id in self.type_ids(type_name)? {
            if let Some(record) = self.load(&id, true)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Loads every record whose identifier belongs to a type, oldest
    /// first. Records that fail to load are logged and skipped.
    pub(crate) fn scan_type(&mut self, type_name: &str) -> CoreResult<Vec<(String, Value)>> {
        let mut ids: Vec<String> = self
            .objects
            .names(&*self.store)?
            .into_iter()
            .filter(|id| id_matches_type(id, type_name))
            .collect();
        // Base-36 counters of one type order by length, then by digits
        ids.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load(&id, true) {
                Ok(Some(record)) => records.push((id, record)),
                Ok(None) => {}
                Err(error) => {
                    warn!(%id, %error, "record failed to load, skipped");
                    self.stats.record_population_skip();
                }
            }
        }
        Ok(records)
    }

    fn emit(
        &self,
        tick: u64,
        id: &str,
        type_name: &str,
        change: ChangeType,
        record: Option<&Record>,
    ) {
        self.feed.emit(ChangeEvent {
            tick,
            id: id.to_string(),
            type_name: type_name.to_string(),
            change,
            record: record.cloned(),
        });
    }

    /// Subscribes to changes of ordinary records.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// The change feed, for polling recent events.
    #[must_use]
    pub fn change_feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// A snapshot of the engine counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The live engine counters, readable without access to the engine.
    #[must_use]
    pub fn stats_handle(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// Types that have an index.
    #[must_use]
    pub fn indexed_types(&self) -> Vec<String> {
        self.registry.indexed_types()
    }

    /// Indexed field of a type.
    #[must_use]
    pub fn index_field(&self, type_name: &str) -> Option<&str> {
        self.registry.index_field(type_name)
    }

    /// Names of every grouping.
    #[must_use]
    pub fn grouping_names(&self) -> Vec<String> {
        self.registry.grouping_names()
    }

    /// Every configured rel.
    #[must_use]
    pub fn rels(&self) -> Vec<RelDecl> {
        self.registry.rels()
    }

    /// Number of records waiting to be flushed.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.objects.dirty_len()
            + self.indexes.dirty_len()
            + self.groupings.dirty_len()
            + self.rels.dirty_len()
            + self.system.dirty_len()
    }

    /// Number of records resident in memory.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.objects.len()
            + self.indexes.len()
            + self.groupings.len()
            + self.rels.len()
            + self.system.len()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("is_open", &self.is_open)
            .field("locked", &self.lock.is_some())
            .field("cached", &self.cached_count())
            .field("dirty", &self.dirty_count())
            .finish_non_exhaustive()
    }
}
