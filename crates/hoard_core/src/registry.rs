//! In-memory registry of configured indexes, groupings and rels.
//!
//! The registry is the engine's view of its configuration. It is filled
//! by the `create_*` calls and rebuilt from the stored index, grouping and
//! rel records when an engine is initialized.

use crate::schema::RelDecl;
use std::collections::{BTreeMap, BTreeSet};

/// The type and field a grouping is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupingDef {
    pub(crate) type_name: String,
    pub(crate) field: String,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    /// Type → indexed field.
    indexes: BTreeMap<String, String>,
    /// Grouping name → binding.
    groupings: BTreeMap<String, GroupingDef>,
    /// Rel name → declaration.
    rels: BTreeMap<String, RelDecl>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn clear(&mut self) {
        self.indexes.clear();
        self.groupings.clear();
        self.rels.clear();
    }

    pub(crate) fn index_field(&self, type_name: &str) -> Option<&str> {
        self.indexes.get(type_name).map(String::as_str)
    }

    pub(crate) fn add_index(&mut self, type_name: &str, field: &str) {
        self.indexes.insert(type_name.to_string(), field.to_string());
    }

    /// Types that have an index, i.e. that can be listed.
    pub(crate) fn indexed_types(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    pub(crate) fn grouping(&self, name: &str) -> Option<&GroupingDef> {
        self.groupings.get(name)
    }

    pub(crate) fn add_grouping(&mut self, name: &str, type_name: &str, field: &str) {
        self.groupings.insert(
            name.to_string(),
            GroupingDef {
                type_name: type_name.to_string(),
                field: field.to_string(),
            },
        );
    }

    /// `(name, field)` of every grouping of a type.
    pub(crate) fn groupings_for_type(&self, type_name: &str) -> Vec<(String, String)> {
        self.groupings
            .iter()
            .filter(|(_, def)| def.type_name == type_name)
            .map(|(name, def)| (name.clone(), def.field.clone()))
            .collect()
    }

    /// Fields a type is grouped by.
    pub(crate) fn grouped_fields(&self, type_name: &str) -> BTreeSet<String> {
        self.groupings_for_type(type_name)
            .into_iter()
            .map(|(_, field)| field)
            .collect()
    }

    pub(crate) fn grouping_names(&self) -> Vec<String> {
        self.groupings.keys().cloned().collect()
    }

    pub(crate) fn rel(&self, name: &str) -> Option<&RelDecl> {
        self.rels.get(name)
    }

    pub(crate) fn add_rel(&mut self, decl: RelDecl) {
        self.rels.insert(decl.name.clone(), decl);
    }

    pub(crate) fn rels(&self) -> Vec<RelDecl> {
        self.rels.values().cloned().collect()
    }

    /// Rels with `type_name` on either side.
    pub(crate) fn rels_for_type(&self, type_name: &str) -> Vec<RelDecl> {
        self.rels
            .values()
            .filter(|decl| decl.left_type == type_name || decl.right_type == type_name)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groupings_are_per_type() {
        let mut registry = Registry::new();
        registry.add_grouping("users_by_name", "user", "name");
        registry.add_grouping("users_by_city", "user", "address.city");
        registry.add_grouping("projects_by_owner", "project", "owner");

        let users = registry.groupings_for_type("user");
        assert_eq!(users.len(), 2);
        assert!(registry.grouped_fields("user").contains("address.city"));
        assert_eq!(registry.groupings_for_type("task"), vec![]);
    }

    #[test]
    fn rels_for_either_side() {
        let mut registry = Registry::new();
        registry.add_rel(RelDecl::new("memberships", "user", "project"));
        registry.add_rel(RelDecl::new("follows", "user", "user"));

        assert_eq!(registry.rels_for_type("project").len(), 1);
        assert_eq!(registry.rels_for_type("user").len(), 2);
        assert!(registry.rel("memberships").is_some());
    }

    #[test]
    fn clear_forgets_everything() {
        let mut registry = Registry::new();
        registry.add_index("user", "email");
        registry.add_grouping("users_by_name", "user", "name");
        registry.clear();
        assert!(registry.index_field("user").is_none());
        assert!(registry.grouping("users_by_name").is_none());
    }
}
