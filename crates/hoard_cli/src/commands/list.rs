//! List command implementation.

use crate::commands::open_engine;
use hoard_core::Encoding;
use std::path::Path;

/// Runs the list command: one JSON record per line.
pub fn run(path: &Path, encoding: Encoding, type_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = open_engine(path, encoding)?;
    let records = engine.list(type_name)?;
    tracing::info!(type_name, count = records.len(), "listing records");
    for record in records {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
