//! # Hoard Testkit
//!
//! Test utilities for Hoard.
//!
//! This crate provides:
//! - Engine fixtures backed by memory or a temporary directory
//! - Pre-populated scenarios with indexes, groupings and rels
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use hoard_testkit::prelude::*;
//! use serde_json::json;
//!
//! with_temp_engine(|engine| {
//!     let record = engine.create("note", json!({ "title": "hello" })).unwrap();
//!     assert_eq!(record["id"], "NOTE.1");
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
