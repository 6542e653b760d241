//! # Hoard Core
//!
//! Object persistence engine for Hoard.
//!
//! This crate provides:
//! - A write-back cache over a [`hoard_storage::RecordStore`]
//! - Human-readable identifier allocation and a logical clock
//! - Unique secondary indexes (one per type, also its enumeration key)
//! - Groupings: non-unique buckets of records by field value
//! - Rels: symmetric many-to-many edges with array-field mirroring
//! - A filter/sort/paginate query evaluator
//!
//! ## Example
//!
//! ```rust
//! use hoard_core::{Engine, SelectOptions, TypeDecl};
//! use serde_json::json;
//!
//! let mut engine = Engine::open_in_memory().unwrap();
//! engine
//!     .declare(&TypeDecl::new("user").index("email").grouping("users_by_name", "name"))
//!     .unwrap();
//!
//! let alice = engine
//!     .create("user", json!({ "email": "alice@example.com", "name": "Alice" }))
//!     .unwrap();
//! assert_eq!(alice["id"], "USER.1");
//!
//! let page = engine
//!     .select("user", &json!({ "name": { "$startsWith": "Al" } }), &SelectOptions::new())
//!     .unwrap();
//! assert_eq!(page.filtered, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod change_feed;
mod codec;
mod config;
mod engine;
mod error;
mod grouping;
mod index;
mod lock;
pub mod query;
mod record;
mod registry;
mod rel;
mod schema;
mod stats;
mod sync;
mod system;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeType};
pub use codec::Encoding;
pub use config::Config;
pub use engine::{Engine, SharedEngine};
pub use error::{CoreError, CoreResult};
pub use grouping::GroupingRecord;
pub use index::{IndexRecord, Insertion, UniquenessPolicy};
pub use query::{Filter, Page, SelectOptions, SortKey, SortSpec};
pub use record::{format_id, get_path, to_base36, type_prefix, value_key, Record, ID_FIELD};
pub use rel::{Direction, RelRecord};
pub use schema::{GroupingDecl, RelDecl, TypeDecl};
pub use stats::{EngineStats, StatsSnapshot};
pub use system::{SystemRecord, SYSTEM_RECORD};

/// Crate version, for diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
