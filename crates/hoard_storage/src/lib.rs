//! # Hoard Storage
//!
//! Record store trait and implementations for Hoard.
//!
//! This crate provides the lowest-level storage abstraction for Hoard.
//! A record store keeps **one opaque byte payload per name**, grouped into
//! namespaces. It does not interpret the payloads; encoding, caching and
//! every derived structure live in `hoard_core`.
//!
//! ## Design Principles
//!
//! - One durable unit per record name, nothing shared between records
//! - The record kind is carried by the [`Namespace`], never by the name
//! - Names are restricted to a safe character set (see [`validate_name`])
//! - Stores must be `Send + Sync`
//!
//! ## Available Stores
//!
//! - [`InMemoryRecordStore`] - For testing and ephemeral engines
//! - [`FileRecordStore`] - One file per record under a root directory
//!
//! ## Example
//!
//! ```rust
//! use hoard_storage::{InMemoryRecordStore, Namespace, RecordStore};
//!
//! let mut store = InMemoryRecordStore::new();
//! store.write(Namespace::Object, "USER.1", b"{}").unwrap();
//! assert_eq!(store.read(Namespace::Object, "USER.1").unwrap(), Some(b"{}".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod name;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileRecordStore;
pub use memory::InMemoryRecordStore;
pub use name::{validate_name, Namespace, MAX_NAME_LEN};
pub use store::RecordStore;
