//! Groupings: non-unique buckets of records by field value.
//!
//! A grouping is bound to one field of one type; a type may have any
//! number of groupings. Bucket membership is authoritative in the ordered
//! `items` lists. The per-bucket sets in `item_sets` only speed up
//! membership checks: they are never persisted and are rebuilt from the
//! lists whenever they are missing or disagree with them.

use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::query::{Page, SelectOptions};
use crate::record::{field_key, validate_field, validate_type_name, value_key};
use hoard_storage::validate_name;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Stored form of a grouping: value key → ordered member identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingRecord {
    /// Name of the grouping.
    pub name: String,
    /// The grouped type.
    pub type_name: String,
    /// The grouped field (dot path).
    pub field: String,
    /// Value key → members, in insertion order. Only changed through
    /// [`GroupingRecord::add`] and [`GroupingRecord::remove`] so the
    /// membership sets stay in step.
    items: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    item_sets: HashMap<String, HashSet<String>>,
}

impl PartialEq for GroupingRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.type_name == other.type_name
            && self.field == other.field
            && self.items == other.items
    }
}

impl GroupingRecord {
    /// Creates an empty grouping.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            field: field.into(),
            items: BTreeMap::new(),
            item_sets: HashMap::new(),
        }
    }

    /// Members of a bucket, in insertion order.
    #[must_use]
    pub fn bucket(&self, key: &str) -> &[String] {
        self.items.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Keys of every non-empty bucket, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Returns true if `id` is in the bucket of `key`.
    pub fn contains(&mut self, key: &str, id: &str) -> bool {
        let Some(list) = self.items.get(key) else {
            self.item_sets.remove(key);
            return false;
        };
        let stale = self
            .item_sets
            .get(key)
            .map_or(true, |set| set.len() != list.len());
        if stale {
            self.item_sets
                .insert(key.to_string(), list.iter().cloned().collect());
        }
        self.item_sets
            .get(key)
            .map_or(false, |set| set.contains(id))
    }

    /// Appends `id` to the bucket of `key` unless it is already there.
    ///
    /// Returns whether it was added.
    pub fn add(&mut self, key: &str, id: &str) -> bool {
        if self.contains(key, id) {
            return false;
        }
        self.items
            .entry(key.to_string())
            .or_default()
            .push(id.to_string());
        self.item_sets
            .entry(key.to_string())
            .or_default()
            .insert(id.to_string());
        true
    }

    /// Removes `id` from the bucket of `key`, dropping the bucket once empty.
    ///
    /// Returns whether it was removed.
    pub fn remove(&mut self, key: &str, id: &str) -> bool {
        let Some(list) = self.items.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|member| member != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.items.remove(key);
            self.item_sets.remove(key);
        } else if let Some(set) = self.item_sets.get_mut(key) {
            set.remove(id);
        }
        removed
    }

    /// Moves `id` from the `old` bucket to the `new` bucket.
    pub fn move_member(&mut self, id: &str, old: Option<&str>, new: Option<&str>) {
        if old == new {
            return;
        }
        if let Some(old) = old {
            self.remove(old, id);
        }
        if let Some(new) = new {
            self.add(new, id);
        }
    }

    /// Removes `id` from every bucket. Returns how many buckets held it.
    pub fn remove_everywhere(&mut self, id: &str) -> usize {
        let keys: Vec<String> = self
            .items
            .iter()
            .filter(|(_, members)| members.iter().any(|m| m == id))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.remove(key, id);
        }
        keys.len()
    }

    /// Drops the membership sets; they are rebuilt on the next check.
    pub fn invalidate(&mut self) {
        self.item_sets.clear();
    }
}

impl Engine {
    fn grouping_mut(&mut self, name: &str) -> CoreResult<&mut GroupingRecord> {
        let encoding = self.config.encoding;
        self.groupings
            .get_mut(&*self.store, encoding, name)?
            .ok_or_else(|| CoreError::not_configured(format!("grouping {name} does not exist")))
    }

    fn grouping_ref(&mut self, name: &str) -> CoreResult<&GroupingRecord> {
        let encoding = self.config.encoding;
        self.groupings
            .load(&*self.store, encoding, name)?
            .ok_or_else(|| CoreError::not_configured(format!("grouping {name} does not exist")))
    }

    /// Creates a grouping of `type_name` records by `field` and backfills it.
    ///
    /// A type can have several groupings. Records that fail to load or have
    /// no usable value are logged and skipped.
    ///
    /// # Errors
    ///
    /// Fails if a grouping with this name already exists or a name is invalid.
    pub fn create_grouping(&mut self, name: &str, type_name: &str, field: &str) -> CoreResult<()> {
        self.ensure_open()?;
        validate_name(name)?;
        validate_type_name(type_name)?;
        validate_field(field)?;
        if let Some(existing) = self.registry.grouping(name) {
            return Err(CoreError::already_configured(format!(
                "grouping {name} already groups {} by {}",
                existing.type_name, existing.field
            )));
        }

        let encoding = self.config.encoding;
        let mut grouping = match self.groupings.load(&*self.store, encoding, name)? {
            Some(stored) => stored.clone(),
            None => GroupingRecord::new(name, type_name, field),
        };
        for (id, record) in self.scan_type(type_name)? {
            match field_key(&record, field) {
                Some(key) => {
                    grouping.add(&key, &id);
                }
                None => {
                    warn!(%id, grouping = name, field, "record has no groupable value, not grouped");
                    self.stats.record_population_skip();
                }
            }
        }

        info!(name, type_name, field, buckets = grouping.items.len(), "created grouping");
        self.groupings.put(name, grouping)?;
        self.registry.add_grouping(name, type_name, field);
        Ok(())
    }

    /// Adds a record to the bucket of its current value in every grouping
    /// of its type. Calling it again for the same bucket changes nothing.
    pub fn update_grouping(&mut self, type_name: &str, id: &str) -> CoreResult<()> {
        self.ensure_open()?;
        let record = self.get(id)?;
        for (name, field) in self.registry.groupings_for_type(type_name) {
            if let Some(key) = field_key(&record, &field) {
                if self.grouping_mut(&name)?.add(&key, id) {
                    debug!(id, grouping = %name, %key, "added to bucket");
                }
            }
        }
        Ok(())
    }

    /// Moves a record between buckets of every grouping of its type bound
    /// to `field`, after that field changed from `old` to `new`.
    pub fn update_grouping_for_field_change(
        &mut self,
        type_name: &str,
        id: &str,
        field: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> CoreResult<()> {
        self.ensure_open()?;
        let old_key = old.and_then(value_key);
        let new_key = new.and_then(value_key);
        if old_key == new_key {
            return Ok(());
        }
        for (name, bound) in self.registry.groupings_for_type(type_name) {
            if bound != field {
                continue;
            }
            debug!(id, grouping = %name, ?old_key, ?new_key, "moving between buckets");
            self.grouping_mut(&name)?
                .move_member(id, old_key.as_deref(), new_key.as_deref());
        }
        Ok(())
    }

    /// Removes a record from every grouping of its type.
    ///
    /// Uses the record's current values when it is still loadable and
    /// falls back to scanning every bucket otherwise (or when the expected
    /// bucket did not hold it).
    pub fn remove_from_grouping(&mut self, type_name: &str, id: &str) -> CoreResult<()> {
        self.ensure_open()?;
        let record = self.load(id, true)?;
        for (name, field) in self.registry.groupings_for_type(type_name) {
            let key = record.as_ref().and_then(|r| field_key(r, &field));
            let grouping = self.grouping_mut(&name)?;
            let removed = key.map_or(false, |key| grouping.remove(&key, id));
            if !removed {
                grouping.remove_everywhere(id);
            }
        }
        Ok(())
    }

    /// Members of a grouping bucket, in insertion order.
    pub fn bucket(&mut self, name: &str, value: &Value) -> CoreResult<Vec<String>> {
        self.ensure_open()?;
        let Some(key) = value_key(value) else {
            return Ok(Vec::new());
        };
        Ok(self.grouping_ref(name)?.bucket(&key).to_vec())
    }

    /// Members of a grouping bucket, loaded, sorted and paginated.
    pub fn bucket_data(
        &mut self,
        name: &str,
        value: &Value,
        options: &SelectOptions,
    ) -> CoreResult<Page> {
        let ids = self.bucket(name, value)?;
        self.load_range(ids, None, options)
    }

    /// Keys of every non-empty bucket of a grouping.
    pub fn bucket_keys(&mut self, name: &str) -> CoreResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.grouping_ref(name)?.keys().map(str::to_string).collect())
    }
}
