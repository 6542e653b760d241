//! Records, identifiers and field access.

use crate::error::{CoreError, CoreResult};
use serde_json::Value;

/// A stored record: a JSON object carrying an `id` field.
pub type Record = Value;

/// Name of the identifier field every ordinary record carries.
pub const ID_FIELD: &str = "id";

/// Checks that a type name is usable.
///
/// Type names are lowercase ASCII (`[a-z][a-z0-9_]*`). Keeping them
/// lowercase makes the uppercased identifier prefix a one-to-one mapping,
/// so an identifier always names exactly one type.
pub(crate) fn validate_type_name(type_name: &str) -> CoreResult<()> {
    let mut chars = type_name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CoreError::invalid_name(
            type_name,
            "type names must match [a-z][a-z0-9_]*",
        ))
    }
}

/// Checks that a field path is usable in an index or grouping.
pub(crate) fn validate_field(field: &str) -> CoreResult<()> {
    if field.is_empty() || field.split('.').any(str::is_empty) {
        return Err(CoreError::invalid_name(field, "field paths need non-empty segments"));
    }
    if !field
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(CoreError::invalid_name(
            field,
            "field paths must match [A-Za-z0-9_.-]",
        ));
    }
    Ok(())
}

/// Returns the identifier prefix of a type: its uppercased name.
#[must_use]
pub fn type_prefix(type_name: &str) -> String {
    type_name.to_ascii_uppercase()
}

/// Encodes a counter in uppercase base 36.
#[must_use]
pub fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    // Only ASCII digits were pushed
    String::from_utf8(out).unwrap_or_default()
}

/// Builds the identifier of the `n`th record of a type, e.g. `USER.1A`.
#[must_use]
pub fn format_id(type_name: &str, n: u64) -> String {
    format!("{}.{}", type_prefix(type_name), to_base36(n))
}

/// Returns the type a record identifier belongs to.
pub(crate) fn type_of_id(id: &str) -> CoreResult<String> {
    let (prefix, counter) = id
        .split_once('.')
        .ok_or_else(|| CoreError::invalid_name(id, "identifiers look like TYPE.N"))?;
    if counter.is_empty()
        || !counter
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
    {
        return Err(CoreError::invalid_name(id, "identifier counter is not base 36"));
    }
    let type_name = prefix.to_ascii_lowercase();
    if type_prefix(&type_name) != prefix {
        return Err(CoreError::invalid_name(id, "identifier prefix is not uppercase"));
    }
    validate_type_name(&type_name)?;
    Ok(type_name)
}

/// Returns true if `id` was allocated for `type_name`.
pub(crate) fn id_matches_type(id: &str, type_name: &str) -> bool {
    type_of_id(id).map_or(false, |t| t == type_name)
}

/// Resolves a dot-separated path inside a record.
///
/// Numeric segments index into arrays, so `tags.0` is the first tag.
#[must_use]
pub fn get_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Returns the index/grouping key of a field value.
///
/// Only scalars have keys: strings are used as they are, numbers and
/// booleans by their JSON text. Null, arrays and objects have none.
#[must_use]
pub fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Returns the key of `field` in `record`, if it has one.
pub(crate) fn field_key(record: &Value, field: &str) -> Option<String> {
    get_path(record, field).and_then(value_key)
}
