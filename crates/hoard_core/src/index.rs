//! Unique secondary indexes.
//!
//! Each type has at most one index. The index maps the string key of one
//! field to the single record holding that value, and its set of values is
//! the only way the engine enumerates the records of a type: a type
//! without an index cannot be listed or selected.
//!
//! Two uniqueness policies coexist on purpose:
//!
//! - [`UniquenessPolicy::Strict`] on the live create/update path, where a
//!   collision is an error and the index is left untouched;
//! - [`UniquenessPolicy::FirstWriterWins`] while backfilling an index over
//!   records that existed before it, where the first record keeps the value
//!   and later ones are logged and skipped.

use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::record::{field_key, validate_field, validate_type_name, value_key, Record};
use hoard_storage::validate_name;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// How an index reacts to a value that already belongs to another record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniquenessPolicy {
    /// Fail with [`CoreError::DuplicateValue`].
    Strict,
    /// Keep the existing owner and report the insertion as skipped.
    FirstWriterWins,
}

/// Outcome of [`IndexRecord::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    /// The value now maps to the record.
    Inserted,
    /// The value already mapped to the record.
    AlreadyPresent,
    /// The value belongs to another record and was left alone.
    Skipped {
        /// The record that keeps the value.
        owner: String,
    },
}

/// Stored form of a unique index: value key → record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    /// The indexed type.
    pub type_name: String,
    /// The indexed field (dot path).
    pub field: String,
    /// Value key → owning record.
    pub ids: BTreeMap<String, String>,
}

impl IndexRecord {
    /// Creates an empty index.
    #[must_use]
    pub fn new(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field: field.into(),
            ids: BTreeMap::new(),
        }
    }

    /// Store name of the index of `type_name` on `field`.
    #[must_use]
    pub fn record_name(type_name: &str, field: &str) -> String {
        format!("{type_name}.{field}")
    }

    /// Returns the record owning a value key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.ids.get(key).map(String::as_str)
    }

    /// Returns true if some record owns the value key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.ids.contains_key(key)
    }

    /// Number of indexed values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn duplicate(&self, key: &str, owner: &str) -> CoreError {
        CoreError::DuplicateValue {
            type_name: self.type_name.clone(),
            field: self.field.clone(),
            value: key.to_string(),
            owner: owner.to_string(),
        }
    }

    /// Maps `key` to `id` under the given policy.
    pub fn insert(&mut self, key: &str, id: &str, policy: UniquenessPolicy) -> CoreResult<Insertion> {
        match self.ids.get(key) {
            Some(owner) if owner == id => Ok(Insertion::AlreadyPresent),
            Some(owner) => match policy {
                UniquenessPolicy::Strict => Err(self.duplicate(key, owner)),
                UniquenessPolicy::FirstWriterWins => Ok(Insertion::Skipped {
                    owner: owner.clone(),
                }),
            },
            None => {
                self.ids.insert(key.to_string(), id.to_string());
                Ok(Insertion::Inserted)
            }
        }
    }

    /// Fails if any record owns `key`.
    pub fn check_free(&self, key: &str) -> CoreResult<()> {
        match self.ids.get(key) {
            Some(owner) => Err(self.duplicate(key, owner)),
            None => Ok(()),
        }
    }

    /// Fails if moving `id` from `old` to `new` would break uniqueness.
    pub fn check_change(&self, id: &str, new: Option<&str>) -> CoreResult<()> {
        match new.and_then(|key| self.ids.get(key).map(|owner| (key, owner))) {
            Some((key, owner)) if owner != id => Err(self.duplicate(key, owner)),
            _ => Ok(()),
        }
    }

    /// Moves `id` from the `old` key to the `new` key.
    ///
    /// A no-op when both keys are equal. On a uniqueness violation nothing
    /// is changed.
    pub fn change(&mut self, id: &str, old: Option<&str>, new: Option<&str>) -> CoreResult<()> {
        if old == new {
            return Ok(());
        }
        self.check_change(id, new)?;
        if let Some(old) = old {
            self.remove(old, id);
        }
        if let Some(new) = new {
            self.insert(new, id, UniquenessPolicy::Strict)?;
        }
        Ok(())
    }

    /// Removes `key` if it maps to `id`. Returns whether it did.
    pub fn remove(&mut self, key: &str, id: &str) -> bool {
        if self.get(key) == Some(id) {
            self.ids.remove(key);
            true
        } else {
            false
        }
    }

    /// Removes every key owned by `id`. Returns how many were removed.
    pub fn remove_id(&mut self, id: &str) -> usize {
        let before = self.ids.len();
        self.ids.retain(|_, owner| owner != id);
        before - self.ids.len()
    }
}

impl Engine {
    fn index_name_of(&self, type_name: &str) -> CoreResult<String> {
        let field = self
            .registry
            .index_field(type_name)
            .ok_or_else(|| CoreError::not_configured(format!("type {type_name} has no index")))?;
        Ok(IndexRecord::record_name(type_name, field))
    }

    pub(crate) fn index_ref(&mut self, type_name: &str) -> CoreResult<&IndexRecord> {
        let name = self.index_name_of(type_name)?;
        let encoding = self.config.encoding;
        self.indexes
            .load(&*self.store, encoding, &name)?
            .ok_or_else(|| CoreError::not_found(name))
    }

    pub(crate) fn index_mut(&mut self, type_name: &str) -> CoreResult<&mut IndexRecord> {
        let name = self.index_name_of(type_name)?;
        let encoding = self.config.encoding;
        self.indexes
            .get_mut(&*self.store, encoding, &name)?
            .ok_or_else(|| CoreError::not_found(name))
    }

    /// Creates the unique index of a type and backfills it.
    ///
    /// Every existing record of the type is scanned. Records whose value
    /// collides with an earlier one, records without a usable value and
    /// records that fail to load are logged and skipped.
    ///
    /// # Errors
    ///
    /// Fails if the type already has an index or a name is invalid.
    pub fn create_index(&mut self, type_name: &str, field: &str) -> CoreResult<()> {
        self.ensure_open()?;
        validate_type_name(type_name)?;
        validate_field(field)?;
        if let Some(existing) = self.registry.index_field(type_name) {
            return Err(CoreError::already_configured(format!(
                "type {type_name} already has an index on {existing}"
            )));
        }
        let name = IndexRecord::record_name(type_name, field);
        validate_name(&name)?;

        let mut index = IndexRecord::new(type_name, field);
        for (id, record) in self.scan_type(type_name)? {
            let Some(key) = field_key(&record, field) else {
                warn!(%id, field, "record has no indexable value, not indexed");
                self.stats.record_population_skip();
                continue;
            };
            if let Insertion::Skipped { owner } =
                index.insert(&key, &id, UniquenessPolicy::FirstWriterWins)?
            {
                warn!(%id, %owner, value = %key, "duplicate value while backfilling index, skipped");
                self.stats.record_population_skip();
            }
        }

        info!(type_name, field, entries = index.len(), "created index");
        self.indexes.put(&name, index)?;
        self.registry.add_index(type_name, field);
        Ok(())
    }

    /// Moves a record's entry in its type's index from `old` to `new`.
    ///
    /// A no-op when the values are equal.
    ///
    /// # Errors
    ///
    /// - `NotConfigured` if `field` is not the type's indexed field
    /// - `MissingField` if `new` is not an indexable value
    /// - `DuplicateValue` if `new` belongs to another record; the index is
    ///   left unchanged
    pub fn update_indexed_field(
        &mut self,
        id: &str,
        type_name: &str,
        field: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> CoreResult<()> {
        self.ensure_open()?;
        if old == new {
            return Ok(());
        }
        match self.registry.index_field(type_name) {
            Some(indexed) if indexed == field => {}
            _ => {
                return Err(CoreError::not_configured(format!(
                    "{field} is not the indexed field of {type_name}"
                )))
            }
        }
        let old_key = old.and_then(value_key);
        let new_key = new
            .and_then(value_key)
            .ok_or_else(|| CoreError::missing_field(id, field))?;
        debug!(id, type_name, field, ?old_key, %new_key, "updating index entry");
        self.index_mut(type_name)?
            .change(id, old_key.as_deref(), Some(&new_key))
    }

    /// Looks a record up by the value of its type's indexed field.
    ///
    /// # Errors
    ///
    /// Fails with `NotConfigured` if `field` is not the type's indexed field.
    pub fn get_by_field(
        &mut self,
        type_name: &str,
        field: &str,
        value: &Value,
    ) -> CoreResult<Option<Record>> {
        self.ensure_open()?;
        match self.registry.index_field(type_name) {
            Some(indexed) if indexed == field => {}
            _ => {
                return Err(CoreError::not_configured(format!(
                    "{field} is not the indexed field of {type_name}"
                )))
            }
        }
        let Some(key) = value_key(value) else {
            return Ok(None);
        };
        let Some(id) = self.index_ref(type_name)?.get(&key).map(str::to_string) else {
            return Ok(None);
        };
        self.load(&id, true)
    }

    /// Returns true if some record of the type owns `value`.
    pub fn key_exists(&mut self, type_name: &str, value: &Value) -> CoreResult<bool> {
        self.ensure_open()?;
        let Some(key) = value_key(value) else {
            return Ok(false);
        };
        Ok(self.index_ref(type_name)?.contains(&key))
    }

    /// Every indexed value of a type, in key order.
    pub fn all_indexed_values(&mut self, type_name: &str) -> CoreResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.index_ref(type_name)?.ids.keys().cloned().collect())
    }

    /// Identifiers of every record of a type, in index key order.
    pub(crate) fn type_ids(&mut self, type_name: &str) -> CoreResult<Vec<String>> {
        Ok(self.index_ref(type_name)?.ids.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> IndexRecord {
        IndexRecord::new("user", "email")
    }

    #[test]
    fn insert_and_get() {
        let mut index = index();
        assert_eq!(
            index.insert("a@x", "USER.1", UniquenessPolicy::Strict).unwrap(),
            Insertion::Inserted
        );
        assert_eq!(index.get("a@x"), Some("USER.1"));
        assert!(index.contains("a@x"));
        assert_eq!(
            index.insert("a@x", "USER.1", UniquenessPolicy::Strict).unwrap(),
            Insertion::AlreadyPresent
        );
    }

    #[test]
    fn strict_policy_rejects_collision() {
        let mut index = index();
        index.insert("a@x", "USER.1", UniquenessPolicy::Strict).unwrap();
        let result = index.insert("a@x", "USER.2", UniquenessPolicy::Strict);
        assert!(matches!(result, Err(CoreError::DuplicateValue { ref owner, .. }) if owner == "USER.1"));
        assert_eq!(index.get("a@x"), Some("USER.1"));
    }

    #[test]
    fn first_writer_wins_policy_skips_collision() {
        let mut index = index();
        index
            .insert("a@x", "USER.1", UniquenessPolicy::FirstWriterWins)
            .unwrap();
        let outcome = index
            .insert("a@x", "USER.2", UniquenessPolicy::FirstWriterWins)
            .unwrap();
        assert_eq!(
            outcome,
            Insertion::Skipped {
                owner: "USER.1".to_string()
            }
        );
        assert_eq!(index.get("a@x"), Some("USER.1"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn change_moves_key() {
        let mut index = index();
        index.insert("a@x", "USER.1", UniquenessPolicy::Strict).unwrap();
        index.change("USER.1", Some("a@x"), Some("b@x")).unwrap();
        assert!(!index.contains("a@x"));
        assert_eq!(index.get("b@x"), Some("USER.1"));
    }

    #[test]
    fn change_to_owned_value_leaves_index_unchanged() {
        let mut index = index();
        index.insert("a@x", "USER.1", UniquenessPolicy::Strict).unwrap();
        index.insert("b@x", "USER.2", UniquenessPolicy::Strict).unwrap();

        let result = index.change("USER.2", Some("b@x"), Some("a@x"));
        assert!(matches!(result, Err(CoreError::DuplicateValue { .. })));
        assert_eq!(index.get("a@x"), Some("USER.1"));
        assert_eq!(index.get("b@x"), Some("USER.2"));
    }

    #[test]
    fn change_same_value_is_noop() {
        let mut index = index();
        index.insert("a@x", "USER.1", UniquenessPolicy::Strict).unwrap();
        index.change("USER.1", Some("a@x"), Some("a@x")).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_only_for_owner() {
        let mut index = index();
        index.insert("a@x", "USER.1", UniquenessPolicy::Strict).unwrap();
        assert!(!index.remove("a@x", "USER.2"));
        assert!(index.remove("a@x", "USER.1"));
        assert!(index.is_empty());
    }

    #[test]
    fn remove_id_scans_all_keys() {
        let mut index = index();
        index.insert("a@x", "USER.1", UniquenessPolicy::Strict).unwrap();
        index.insert("b@x", "USER.2", UniquenessPolicy::Strict).unwrap();
        assert_eq!(index.remove_id("USER.1"), 1);
        assert_eq!(index.len(), 1);
    }
}
