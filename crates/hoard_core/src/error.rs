//! Error types for Hoard core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Hoard core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Record store error.
    #[error("storage error: {0}")]
    Storage(#[from] hoard_storage::StorageError),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding or decoding failed.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record does not exist.
    #[error("record not found: {id}")]
    NotFound {
        /// The identifier that was not found.
        id: String,
    },

    /// A record with this identifier already exists.
    #[error("record already exists: {id}")]
    AlreadyExists {
        /// The identifier that collided.
        id: String,
    },

    /// A unique index already maps the value to another record.
    #[error("duplicate value {value:?} for {type_name}.{field}: already owned by {owner}")]
    DuplicateValue {
        /// The indexed type.
        type_name: String,
        /// The indexed field.
        field: String,
        /// The colliding value.
        value: String,
        /// The record that owns the value.
        owner: String,
    },

    /// An index, grouping or rel is configured twice.
    #[error("already configured: {message}")]
    AlreadyConfigured {
        /// What was configured twice.
        message: String,
    },

    /// An index, grouping or rel the operation needs does not exist.
    #[error("not configured: {message}")]
    NotConfigured {
        /// What is missing.
        message: String,
    },

    /// A record lacks a field the operation requires.
    #[error("record {id} has no usable value for field {field}")]
    MissingField {
        /// The record (or type, before an identifier exists).
        id: String,
        /// The missing field.
        field: String,
    },

    /// A type, field or record name is not acceptable.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A filter or sort specification is malformed.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// The store directory is locked by another engine.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The engine has been shut down.
    #[error("engine is shut down")]
    EngineClosed,
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    /// Creates an already configured error.
    pub fn already_configured(message: impl Into<String>) -> Self {
        Self::AlreadyConfigured {
            message: message.into(),
        }
    }

    /// Creates a not configured error.
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(id: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            id: id.into(),
            field: field.into(),
        }
    }

    /// Creates an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors that mean "the thing is not there".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for uniqueness and double-configuration violations.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateValue { .. } | Self::AlreadyExists { .. } | Self::AlreadyConfigured { .. }
        )
    }
}
