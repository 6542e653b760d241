//! Type declarations.
//!
//! A [`TypeDecl`] describes everything the engine maintains for one type:
//! its unique index, its groupings and its rels. [`Engine::declare`] turns
//! it into the matching `create_*` calls.

use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::record::{validate_field, validate_type_name};
use hoard_storage::validate_name;
use tracing::debug;

/// A grouping of a declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingDecl {
    /// Name of the grouping.
    pub name: String,
    /// Field the records are grouped by.
    pub field: String,
}

/// A rel between two types, optionally mirrored by array fields.
///
/// When `left_field` is set, that array field of left-type records lists
/// the right-type records they are related to, and the engine adds and
/// removes edges as the array changes. `right_field` does the same for
/// the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelDecl {
    /// Name of the rel.
    pub name: String,
    /// Type on the left side.
    pub left_type: String,
    /// Type on the right side.
    pub right_type: String,
    /// Mirrored array field of left records.
    pub left_field: Option<String>,
    /// Mirrored array field of right records.
    pub right_field: Option<String>,
}

impl RelDecl {
    /// Declares a rel without mirrored fields.
    pub fn new(
        name: impl Into<String>,
        left_type: impl Into<String>,
        right_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            left_type: left_type.into(),
            right_type: right_type.into(),
            left_field: None,
            right_field: None,
        }
    }

    /// Mirrors the rel in an array field of left records.
    #[must_use]
    pub fn left_field(mut self, field: impl Into<String>) -> Self {
        self.left_field = Some(field.into());
        self
    }

    /// Mirrors the rel in an array field of right records.
    #[must_use]
    pub fn right_field(mut self, field: impl Into<String>) -> Self {
        self.right_field = Some(field.into());
        self
    }

    pub(crate) fn validate(&self) -> CoreResult<()> {
        validate_name(&self.name)?;
        validate_type_name(&self.left_type)?;
        validate_type_name(&self.right_type)?;
        if let Some(field) = &self.left_field {
            validate_field(field)?;
        }
        if let Some(field) = &self.right_field {
            validate_field(field)?;
        }
        Ok(())
    }
}

/// Declaration of a record type.
///
/// ```rust
/// use hoard_core::{RelDecl, TypeDecl};
///
/// let decl = TypeDecl::new("user")
///     .index("email")
///     .grouping("users_by_name", "name")
///     .rel(RelDecl::new("memberships", "user", "project").left_field("projects"));
/// assert_eq!(decl.groupings.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    /// The type name.
    pub type_name: String,
    /// The uniquely indexed field, if any.
    pub index: Option<String>,
    /// Groupings of the type.
    pub groupings: Vec<GroupingDecl>,
    /// Rels the type takes part in.
    pub rels: Vec<RelDecl>,
}

impl TypeDecl {
    /// Starts a declaration with no index, groupings or rels.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            index: None,
            groupings: Vec::new(),
            rels: Vec::new(),
        }
    }

    /// Sets the uniquely indexed field.
    #[must_use]
    pub fn index(mut self, field: impl Into<String>) -> Self {
        self.index = Some(field.into());
        self
    }

    /// Adds a grouping.
    #[must_use]
    pub fn grouping(mut self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.groupings.push(GroupingDecl {
            name: name.into(),
            field: field.into(),
        });
        self
    }

    /// Adds a rel.
    #[must_use]
    pub fn rel(mut self, decl: RelDecl) -> Self {
        self.rels.push(decl);
        self
    }
}

impl Engine {
    /// Creates whatever a declaration names that does not exist yet.
    ///
    /// Declaring the same type twice is a no-op. A declaration that
    /// contradicts the existing configuration (another indexed field, a
    /// grouping name bound elsewhere, a rel with other sides) fails with
    /// `AlreadyConfigured` before anything is created.
    pub fn declare(&mut self, decl: &TypeDecl) -> CoreResult<()> {
        self.ensure_open()?;
        validate_type_name(&decl.type_name)?;
        let plan = self.plan_declaration(decl)?;

        if let Some(field) = plan.index {
            self.create_index(&decl.type_name, &field)?;
        }
        for grouping in plan.groupings {
            self.create_grouping(&grouping.name, &decl.type_name, &grouping.field)?;
        }
        for rel in plan.rels {
            self.create_rel_with(&rel)?;
        }
        debug!(type_name = %decl.type_name, "declared type");
        Ok(())
    }

    fn plan_declaration(&self, decl: &TypeDecl) -> CoreResult<TypeDecl> {
        let mut plan = TypeDecl::new(decl.type_name.clone());

        if let Some(field) = &decl.index {
            match self.registry.index_field(&decl.type_name) {
                Some(existing) if existing == field => {}
                Some(existing) => {
                    return Err(CoreError::already_configured(format!(
                        "type {} is indexed on {existing}, not {field}",
                        decl.type_name
                    )))
                }
                None => plan.index = Some(field.clone()),
            }
        }

        for grouping in &decl.groupings {
            match self.registry.grouping(&grouping.name) {
                Some(existing)
                    if existing.type_name == decl.type_name && existing.field == grouping.field => {}
                Some(existing) => {
                    return Err(CoreError::already_configured(format!(
                        "grouping {} already groups {} by {}",
                        grouping.name, existing.type_name, existing.field
                    )))
                }
                None => plan.groupings.push(grouping.clone()),
            }
        }

        for rel in &decl.rels {
            if rel.left_type != decl.type_name && rel.right_type != decl.type_name {
                return Err(CoreError::invalid_operation(format!(
                    "rel {} does not involve type {}",
                    rel.name, decl.type_name
                )));
            }
            match self.registry.rel(&rel.name) {
                Some(existing) if existing == rel => {}
                Some(existing) => {
                    return Err(CoreError::already_configured(format!(
                        "rel {} already links {} to {}",
                        rel.name, existing.left_type, existing.right_type
                    )))
                }
                None => plan.rels.push(rel.clone()),
            }
        }

        Ok(plan)
    }
}
