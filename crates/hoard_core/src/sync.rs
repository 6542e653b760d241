//! Keeps rel edges in step with the array fields that mirror them.
//!
//! A rel may declare an array field on either side. Whenever a record of
//! that side is created or updated, the identifiers that appeared in the
//! array become edges and the ones that disappeared stop being edges.
//! Mirroring is one-way: editing edges through `add_rel`/`remove_rel`
//! does not rewrite the arrays.

use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::record::get_path;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// One edge to add or remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RelChange {
    pub(crate) rel: String,
    pub(crate) left_id: String,
    pub(crate) right_id: String,
    pub(crate) add: bool,
}

/// Reads the identifiers listed in an array field.
///
/// A missing or null field lists nothing. Anything other than an array of
/// strings is rejected.
fn listed_ids(id: &str, record: Option<&Value>, field: &str) -> CoreResult<Vec<String>> {
    let Some(value) = record.and_then(|r| get_path(r, field)) else {
        return Ok(Vec::new());
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    CoreError::invalid_operation(format!(
                        "{id}.{field} must only hold identifiers, found {item}"
                    ))
                })
            })
            .collect(),
        other => Err(CoreError::invalid_operation(format!(
            "{id}.{field} must be an array of identifiers, found {other}"
        ))),
    }
}

/// Splits two identifier lists into `(added, removed)`, keeping the order
/// of the list each identifier comes from and dropping repeats.
pub(crate) fn diff_ids(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old_set: HashSet<&str> = old.iter().map(String::as_str).collect();
    let new_set: HashSet<&str> = new.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    let added = new
        .iter()
        .filter(|id| !old_set.contains(id.as_str()) && seen.insert(id.as_str()))
        .cloned()
        .collect();

    let mut seen = HashSet::new();
    let removed = old
        .iter()
        .filter(|id| !new_set.contains(id.as_str()) && seen.insert(id.as_str()))
        .cloned()
        .collect();

    (added, removed)
}

impl Engine {
    /// Works out, and validates, the edge changes implied by a record going
    /// from `old` to `new`. Nothing is written.
    pub(crate) fn plan_rel_sync(
        &self,
        type_name: &str,
        id: &str,
        old: Option<&Value>,
        new: &Value,
    ) -> CoreResult<Vec<RelChange>> {
        let mut changes = Vec::new();
        for decl in self.registry.rels_for_type(type_name) {
            let sides = [
                (decl.left_type == type_name, decl.left_field.as_deref(), true),
                (decl.right_type == type_name, decl.right_field.as_deref(), false),
            ];
            for (matches, field, is_left) in sides {
                let (true, Some(field)) = (matches, field) else {
                    continue;
                };
                let before = listed_ids(id, old, field)?;
                let after = listed_ids(id, Some(new), field)?;
                let (added, removed) = diff_ids(&before, &after);

                let edge = |other: String, add: bool| {
                    let (left_id, right_id) = if is_left {
                        (id.to_string(), other)
                    } else {
                        (other, id.to_string())
                    };
                    RelChange {
                        rel: decl.name.clone(),
                        left_id,
                        right_id,
                        add,
                    }
                };
                for other in added {
                    let change = edge(other, true);
                    self.check_rel_edge(&change.rel, &change.left_id, &change.right_id)?;
                    changes.push(change);
                }
                changes.extend(removed.into_iter().map(|other| edge(other, false)));
            }
        }
        Ok(changes)
    }

    /// Applies a plan made by [`Engine::plan_rel_sync`].
    pub(crate) fn apply_rel_sync(&mut self, changes: &[RelChange]) -> CoreResult<()> {
        for change in changes {
            debug!(
                rel = %change.rel,
                left = %change.left_id,
                right = %change.right_id,
                add = change.add,
                "syncing rel from array field"
            );
            if change.add {
                self.add_rel(&change.rel, &change.left_id, &change.right_id)?;
            } else {
                self.remove_rel(&change.rel, &change.left_id, &change.right_id)?;
            }
        }
        Ok(())
    }
}
