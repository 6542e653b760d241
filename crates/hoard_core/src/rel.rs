//! Rels: symmetric many-to-many edges between two types.
//!
//! A rel named `n` is stored as two adjacency records, `n_left_to_right`
//! and `n_right_to_left`. Every mutation touches both, so the edge
//! `(a, b)` is in the first exactly when `(b, a)` is in the second.

use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::query::{Page, SelectOptions};
use crate::record::id_matches_type;
use crate::schema::RelDecl;
use hoard_storage::validate_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Direction of traversal through a rel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// From left-type records to right-type records.
    LeftToRight,
    /// From right-type records to left-type records.
    RightToLeft,
}

impl Direction {
    /// Suffix of the adjacency record for this direction.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::LeftToRight => "left_to_right",
            Direction::RightToLeft => "right_to_left",
        }
    }

    /// The opposite direction.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Direction::LeftToRight => Direction::RightToLeft,
            Direction::RightToLeft => Direction::LeftToRight,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left_to_right" => Ok(Direction::LeftToRight),
            "right_to_left" => Ok(Direction::RightToLeft),
            other => Err(CoreError::invalid_operation(format!(
                "unknown rel direction {other:?}"
            ))),
        }
    }
}

/// Stored form of one direction of a rel: identifier → related identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelRecord {
    /// Name of the rel.
    pub name: String,
    /// Which direction this record holds.
    pub direction: Direction,
    /// Type on the left side.
    pub left_type: String,
    /// Type on the right side.
    pub right_type: String,
    /// Array field of left records mirroring the rel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_field: Option<String>,
    /// Array field of right records mirroring the rel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_field: Option<String>,
    /// Adjacency lists, in insertion order.
    pub edges: BTreeMap<String, Vec<String>>,
}

impl RelRecord {
    /// Creates an empty adjacency record for one direction of a rel.
    #[must_use]
    pub fn new(decl: &RelDecl, direction: Direction) -> Self {
        Self {
            name: decl.name.clone(),
            direction,
            left_type: decl.left_type.clone(),
            right_type: decl.right_type.clone(),
            left_field: decl.left_field.clone(),
            right_field: decl.right_field.clone(),
            edges: BTreeMap::new(),
        }
    }

    /// Store name of one direction of a rel.
    #[must_use]
    pub fn record_name(name: &str, direction: Direction) -> String {
        format!("{name}_{direction}")
    }

    /// The declaration this record was created from.
    #[must_use]
    pub fn decl(&self) -> RelDecl {
        RelDecl {
            name: self.name.clone(),
            left_type: self.left_type.clone(),
            right_type: self.right_type.clone(),
            left_field: self.left_field.clone(),
            right_field: self.right_field.clone(),
        }
    }

    /// Identifiers related to `id` in this direction.
    #[must_use]
    pub fn neighbors(&self, id: &str) -> &[String] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Adds the edge `from → to`. Returns whether it was new.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        let list = self.edges.entry(from.to_string()).or_default();
        if list.iter().any(|existing| existing == to) {
            return false;
        }
        list.push(to.to_string());
        true
    }

    /// Removes the edge `from → to`, dropping the list once empty.
    pub fn remove_edge(&mut self, from: &str, to: &str) -> bool {
        let Some(list) = self.edges.get_mut(from) else {
            return false;
        };
        let before = list.len();
        list.retain(|existing| existing != to);
        let removed = list.len() != before;
        if list.is_empty() {
            self.edges.remove(from);
        }
        removed
    }

    /// Removes every edge leaving `id` and returns its former neighbors.
    pub fn remove_node(&mut self, id: &str) -> Vec<String> {
        self.edges.remove(id).unwrap_or_default()
    }

    /// Number of edges in this direction.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }
}

impl Engine {
    fn rel_decl(&self, name: &str) -> CoreResult<RelDecl> {
        self.registry
            .rel(name)
            .cloned()
            .ok_or_else(|| CoreError::not_configured(format!("rel {name} does not exist")))
    }

    fn rel_mut(&mut self, name: &str, direction: Direction) -> CoreResult<&mut RelRecord> {
        let record_name = RelRecord::record_name(name, direction);
        let encoding = self.config.encoding;
        self.rels
            .get_mut(&*self.store, encoding, &record_name)?
            .ok_or_else(|| CoreError::not_found(record_name))
    }

    fn rel_ref(&mut self, name: &str, direction: Direction) -> CoreResult<&RelRecord> {
        let record_name = RelRecord::record_name(name, direction);
        let encoding = self.config.encoding;
        self.rels
            .load(&*self.store, encoding, &record_name)?
            .ok_or_else(|| CoreError::not_found(record_name))
    }

    /// Creates a rel between two types, without mirrored array fields.
    pub fn create_rel(&mut self, name: &str, left_type: &str, right_type: &str) -> CoreResult<()> {
        self.create_rel_with(&RelDecl::new(name, left_type, right_type))
    }

    /// Creates a rel from a full declaration.
    ///
    /// # Errors
    ///
    /// Fails if a rel with this name already exists or a name is invalid.
    pub fn create_rel_with(&mut self, decl: &RelDecl) -> CoreResult<()> {
        self.ensure_open()?;
        decl.validate()?;
        if self.registry.rel(&decl.name).is_some() {
            return Err(CoreError::already_configured(format!(
                "rel {} already exists",
                decl.name
            )));
        }
        for direction in [Direction::LeftToRight, Direction::RightToLeft] {
            let record_name = RelRecord::record_name(&decl.name, direction);
            validate_name(&record_name)?;
            self.rels.put(&record_name, RelRecord::new(decl, direction))?;
        }
        info!(
            name = %decl.name,
            left = %decl.left_type,
            right = %decl.right_type,
            "created rel"
        );
        self.registry.add_rel(decl.clone());
        Ok(())
    }

    fn check_endpoints(decl: &RelDecl, left_id: &str, right_id: &str) -> CoreResult<()> {
        if !id_matches_type(left_id, &decl.left_type) {
            return Err(CoreError::invalid_operation(format!(
                "{left_id} is not a {} record (left side of rel {})",
                decl.left_type, decl.name
            )));
        }
        if !id_matches_type(right_id, &decl.right_type) {
            return Err(CoreError::invalid_operation(format!(
                "{right_id} is not a {} record (right side of rel {})",
                decl.right_type, decl.name
            )));
        }
        Ok(())
    }

    pub(crate) fn check_rel_edge(&self, name: &str, left_id: &str, right_id: &str) -> CoreResult<()> {
        let decl = self.rel_decl(name)?;
        Self::check_endpoints(&decl, left_id, right_id)
    }

    /// Adds the edge `left_id`-`right_id` in both directions.
    ///
    /// Returns whether the edge was new.
    pub fn add_rel(&mut self, name: &str, left_id: &str, right_id: &str) -> CoreResult<bool> {
        self.ensure_open()?;
        self.check_rel_edge(name, left_id, right_id)?;
        let added = self
            .rel_mut(name, Direction::LeftToRight)?
            .add_edge(left_id, right_id);
        self.rel_mut(name, Direction::RightToLeft)?
            .add_edge(right_id, left_id);
        if added {
            debug!(rel = name, left_id, right_id, "added edge");
        }
        Ok(added)
    }

    /// Removes the edge `left_id`-`right_id` from both directions.
    ///
    /// Returns whether the edge existed.
    pub fn remove_rel(&mut self, name: &str, left_id: &str, right_id: &str) -> CoreResult<bool> {
        self.ensure_open()?;
        self.rel_decl(name)?;
        let removed = self
            .rel_mut(name, Direction::LeftToRight)?
            .remove_edge(left_id, right_id);
        self.rel_mut(name, Direction::RightToLeft)?
            .remove_edge(right_id, left_id);
        if removed {
            debug!(rel = name, left_id, right_id, "removed edge");
        }
        Ok(removed)
    }

    /// Identifiers related to `id` through a rel, in insertion order.
    pub fn related(&mut self, name: &str, id: &str, direction: Direction) -> CoreResult<Vec<String>> {
        self.ensure_open()?;
        self.rel_decl(name)?;
        Ok(self.rel_ref(name, direction)?.neighbors(id).to_vec())
    }

    /// Records related to `id` through a rel, loaded, sorted and paginated.
    pub fn related_data(
        &mut self,
        name: &str,
        id: &str,
        direction: Direction,
        options: &SelectOptions,
    ) -> CoreResult<Page> {
        let ids = self.related(name, id, direction)?;
        self.load_range(ids, None, options)
    }

    /// Removes every edge touching `id`, in every rel and both directions.
    ///
    /// Returns the number of edges removed.
    pub fn remove_object_from_all_rels(&mut self, id: &str) -> CoreResult<usize> {
        self.ensure_open()?;
        let mut removed = 0;
        for decl in self.registry.rels() {
            for direction in [Direction::LeftToRight, Direction::RightToLeft] {
                let neighbors = self.rel_mut(&decl.name, direction)?.remove_node(id);
                if neighbors.is_empty() {
                    continue;
                }
                let mirror = self.rel_mut(&decl.name, direction.reverse())?;
                for neighbor in &neighbors {
                    mirror.remove_edge(neighbor, id);
                }
                removed += neighbors.len();
            }
        }
        if removed > 0 {
            debug!(id, removed, "removed record from all rels");
        }
        Ok(removed)
    }

    /// Total number of edges of a rel.
    pub fn rel_edge_count(&mut self, name: &str) -> CoreResult<usize> {
        self.ensure_open()?;
        self.rel_decl(name)?;
        Ok(self.rel_ref(name, Direction::LeftToRight)?.edge_count())
    }
}
