//! Record store trait definition.

use crate::error::StorageResult;
use crate::name::Namespace;
use std::time::SystemTime;

/// A durable store of named records.
///
/// Record stores are **opaque byte stores** keyed by `(namespace, name)`.
/// They know nothing about record encodings, caches, indexes or
/// relationships.
///
/// # Invariants
///
/// - At most one payload exists per `(namespace, name)`
/// - `read` returns exactly the bytes of the last successful `write`
/// - `write` replaces the previous payload as a whole
/// - Names are checked with [`crate::validate_name`] before any I/O
///
/// # Implementors
///
/// - [`super::InMemoryRecordStore`] - For testing
/// - [`super::FileRecordStore`] - For persistent storage
pub trait RecordStore: Send + Sync {
    /// Returns true if a record with this name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn exists(&self, namespace: Namespace, name: &str) -> StorageResult<bool>;

    /// Reads the raw payload of a record, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn read(&self, namespace: Namespace, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes the raw payload of a record, replacing any previous payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn write(&mut self, namespace: Namespace, name: &str, data: &[u8]) -> StorageResult<()>;

    /// Deletes a record. Returns whether something was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn delete(&mut self, namespace: Namespace, name: &str) -> StorageResult<bool>;

    /// Returns the last-modified time of a record, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn modified(&self, namespace: Namespace, name: &str) -> StorageResult<Option<SystemTime>>;

    /// Lists every record name in a namespace, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be produced.
    fn list(&self, namespace: Namespace) -> StorageResult<Vec<String>>;

    /// Makes every previous write durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;
}
