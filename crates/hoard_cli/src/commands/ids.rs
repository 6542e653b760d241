//! Ids command implementation.

use crate::commands::open_engine;
use hoard_core::{type_prefix, Encoding};
use std::path::Path;

/// Identifiers of the stored records, optionally of one type only.
pub fn collect(
    path: &Path,
    encoding: Encoding,
    type_name: Option<&str>,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let engine = open_engine(path, encoding)?;
    let mut ids = engine.list_all_identifiers()?;
    if let Some(type_name) = type_name {
        let prefix = format!("{}.", type_prefix(type_name));
        ids.retain(|id| id.starts_with(&prefix));
    }
    Ok(ids)
}

/// Runs the ids command.
pub fn run(
    path: &Path,
    encoding: Encoding,
    type_name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    for id in collect(path, encoding, type_name)? {
        println!("{id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::sample_store;

    #[test]
    fn ids_by_type() {
        let dir = sample_store();
        assert_eq!(collect(dir.path(), Encoding::Json, None).unwrap().len(), 4);
        assert_eq!(
            collect(dir.path(), Encoding::Json, Some("user")).unwrap(),
            vec!["USER.1", "USER.2", "USER.3"]
        );
    }
}
