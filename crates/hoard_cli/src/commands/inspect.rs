//! Inspect command implementation.

use crate::commands::open_engine;
use hoard_core::{Encoding, RelDecl};
use hoard_storage::{FileRecordStore, Namespace, RecordStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Stored records per namespace.
    pub records: BTreeMap<String, usize>,
    /// Logical clock.
    pub clock_tick: u64,
    /// Last identifier number per type.
    pub counters: BTreeMap<String, u64>,
    /// Indexed field per type.
    pub indexes: BTreeMap<String, String>,
    /// Grouping names.
    pub groupings: Vec<String>,
    /// Rels.
    pub rels: Vec<RelInfo>,
}

/// A configured rel.
#[derive(Debug, Serialize)]
pub struct RelInfo {
    /// Rel name.
    pub name: String,
    /// Left type.
    pub left_type: String,
    /// Right type.
    pub right_type: String,
    /// Mirrored array field of left records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_field: Option<String>,
    /// Mirrored array field of right records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_field: Option<String>,
}

impl From<RelDecl> for RelInfo {
    fn from(decl: RelDecl) -> Self {
        Self {
            name: decl.name,
            left_type: decl.left_type,
            right_type: decl.right_type,
            left_field: decl.left_field,
            right_field: decl.right_field,
        }
    }
}

/// Collects the inspection result.
pub fn inspect(path: &Path, encoding: Encoding) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut engine = open_engine(path, encoding)?;

    let store = FileRecordStore::open(path)?;
    let mut records = BTreeMap::new();
    for namespace in Namespace::ALL {
        records.insert(namespace.to_string(), store.list(namespace)?.len());
    }

    let system = engine.system_record()?;
    let indexes = engine
        .indexed_types()
        .into_iter()
        .filter_map(|t| engine.index_field(&t).map(|f| (t.clone(), f.to_string())))
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        records,
        clock_tick: system.current_clock_tick,
        counters: system.counters,
        indexes,
        groupings: engine.grouping_names(),
        rels: engine.rels().into_iter().map(RelInfo::from).collect(),
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, encoding: Encoding, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, encoding)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Hoard Store: {}", result.path);
    println!();
    println!("Records:");
    for (namespace, count) in &result.records {
        println!("  {namespace:<10} {count}");
    }
    println!();
    println!("Clock tick: {}", result.clock_tick);
    if !result.counters.is_empty() {
        println!("Counters:");
        for (type_name, counter) in &result.counters {
            println!("  {type_name:<16} {counter}");
        }
    }
    if !result.indexes.is_empty() {
        println!("Indexes:");
        for (type_name, field) in &result.indexes {
            println!("  {type_name}.{field}");
        }
    }
    if !result.groupings.is_empty() {
        println!("Groupings: {}", result.groupings.join(", "));
    }
    if !result.rels.is_empty() {
        println!("Rels:");
        for rel in &result.rels {
            println!("  {} ({} <-> {})", rel.name, rel.left_type, rel.right_type);
        }
    }
}
