//! Select command implementation.

use crate::commands::open_engine;
use hoard_core::{Encoding, Page, SelectOptions, SortSpec};
use serde_json::Value;
use std::path::Path;

/// A query as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Type to select from.
    pub type_name: String,
    /// Filter, as JSON text.
    pub filter: String,
    /// Sort fields, ascending.
    pub sort: Vec<String>,
    /// First position of the page.
    pub start: usize,
    /// Position after the last one.
    pub end: Option<usize>,
    /// Reverse the order.
    pub descending: bool,
    /// Grouping name and bucket value (JSON text).
    pub bucket: Option<(String, String)>,
}

/// Parses a bucket value; bare words are taken as strings.
fn bucket_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Runs a query against the store.
pub fn execute(path: &Path, encoding: Encoding, query: &Query) -> Result<Page, Box<dyn std::error::Error>> {
    let filter: Value = serde_json::from_str(&query.filter)
        .map_err(|e| format!("filter is not valid JSON: {e}"))?;
    let sort = SortSpec::from_value(&Value::from(query.sort.clone()))?;
    let mut options = SelectOptions::new()
        .sort(sort)
        .start(query.start)
        .descending(query.descending);
    options.end = query.end;

    let mut engine = open_engine(path, encoding)?;
    let page = match &query.bucket {
        Some((grouping, value)) => {
            engine.select_bucket(grouping, &bucket_value(value), &filter, &options)?
        }
        None => engine.select(&query.type_name, &filter, &options)?,
    };
    Ok(page)
}

/// Runs the select command.
pub fn run(path: &Path, encoding: Encoding, query: &Query) -> Result<(), Box<dyn std::error::Error>> {
    let page = execute(path, encoding, query)?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}
