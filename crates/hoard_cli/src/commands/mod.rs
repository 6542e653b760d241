//! CLI command implementations.

pub mod get;
pub mod ids;
pub mod inspect;
pub mod list;
pub mod select;

use hoard_core::{Config, Encoding, Engine};
use std::path::Path;

/// Opens an existing store for reading.
///
/// The directory must exist and is locked for the lifetime of the engine.
/// Nothing is flushed back, so commands never modify the store.
pub fn open_engine(path: &Path, encoding: Encoding) -> Result<Engine, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    let config = Config::new()
        .create_if_missing(false)
        .use_lock(true)
        .encoding(encoding);
    Ok(Engine::open(path, config)?)
}
