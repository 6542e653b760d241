//! Get command implementation.

use crate::commands::open_engine;
use hoard_core::Encoding;
use std::path::Path;

/// Runs the get command.
pub fn run(path: &Path, encoding: Encoding, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = open_engine(path, encoding)?;
    let record = engine.get(id)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    if let Some(modified) = engine.last_modified(id)? {
        tracing::debug!(id, ?modified, "last written");
    }
    Ok(())
}
