//! Namespaces and record-name validation.

use crate::error::{StorageError, StorageResult};
use std::fmt;

/// Longest record name accepted by any store.
pub const MAX_NAME_LEN: usize = 200;

/// The kind of a stored record.
///
/// Every record lives in exactly one namespace. Ordinary records and the
/// engine's internal bookkeeping records never share a namespace, so the
/// kind of a record is always known without looking at its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    /// Ordinary user records.
    Object,
    /// Unique secondary indexes.
    Index,
    /// Non-unique groupings.
    Grouping,
    /// Directional relationship adjacency maps.
    Rel,
    /// The system record (counters and logical clock).
    System,
}

impl Namespace {
    /// All namespaces, in layout order.
    pub const ALL: [Namespace; 5] = [
        Namespace::Object,
        Namespace::Index,
        Namespace::Grouping,
        Namespace::Rel,
        Namespace::System,
    ];

    /// Directory name used by file-based stores.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Namespace::Object => "objects",
            Namespace::Index => "indexes",
            Namespace::Grouping => "groupings",
            Namespace::Rel => "rels",
            Namespace::System => "system",
        }
    }

    /// Returns true for namespaces holding engine bookkeeping.
    #[must_use]
    pub const fn is_internal(self) -> bool {
        !matches!(self, Namespace::Object)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Checks that `name` is safe to use as a durable unit name.
///
/// Accepted names are non-empty, at most [`MAX_NAME_LEN`] bytes, made of
/// `[A-Za-z0-9._-]` and do not start with a dot. This keeps every name a
/// single path component on every platform.
///
/// # Errors
///
/// Returns [`StorageError::InvalidName`] describing the first violation.
pub fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::invalid_name(name, "name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(StorageError::invalid_name(name, "name is too long"));
    }
    if name.starts_with('.') {
        return Err(StorageError::invalid_name(name, "name starts with a dot"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
    {
        return Err(StorageError::invalid_name(
            name,
            "name contains characters outside [A-Za-z0-9._-]",
        ));
    }
    Ok(())
}
