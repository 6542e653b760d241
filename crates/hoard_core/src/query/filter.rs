//! Filter trees.
//!
//! A filter is written as a JSON object, in the style of document
//! databases:
//!
//! ```json
//! { "status": "active",
//!   "age": { "$gte": 18, "$lt": 65 },
//!   "$or": [ { "city": "Oslo" }, { "tags": { "$contains": "remote" } } ] }
//! ```
//!
//! Top-level keys are ANDed. A key naming a field takes either a bare
//! value (equality) or an object of `$` operators. `$and`, `$or` and
//! `$not` combine sub-filters. Field names are dot paths into the record.
//!
//! Filters are parsed once into a [`Filter`] and then evaluated against
//! every candidate record, so a malformed filter fails before any record
//! is loaded.

use crate::error::{CoreError, CoreResult};
use crate::record::get_path;
use crate::query::sort::compare_scalars;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// JSON value kinds accepted by `$type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// A string.
    String,
    /// A number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// `null`.
    Null,
    /// An array.
    Array,
    /// An object.
    Object,
}

impl ValueKind {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "string" => ValueKind::String,
            "number" => ValueKind::Number,
            "boolean" => ValueKind::Boolean,
            "null" => ValueKind::Null,
            "array" => ValueKind::Array,
            "object" => ValueKind::Object,
            _ => return None,
        })
    }

    /// The kind of a value.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => ValueKind::String,
            Value::Number(_) => ValueKind::Number,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Null => ValueKind::Null,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }
}

/// A test applied to the value at one field path.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Deep equality. Numbers compare by value, so `1` equals `1.0`.
    Eq(Value),
    /// Negated [`Condition::Eq`]; also true when the field is missing.
    Ne(Value),
    /// Greater than.
    Gt(Value),
    /// Greater than or equal.
    Gte(Value),
    /// Less than.
    Lt(Value),
    /// Less than or equal.
    Lte(Value),
    /// Equal to one of the values.
    In(Vec<Value>),
    /// Equal to none of the values; also true when the field is missing.
    Nin(Vec<Value>),
    /// Substring of a string, or element of an array.
    Contains(Value),
    /// String prefix.
    StartsWith(String),
    /// String suffix.
    EndsWith(String),
    /// Regular expression match. `None` holds a pattern that failed to
    /// compile; it matches nothing.
    Regex(Option<Regex>),
    /// Field presence. A field holding `null` exists.
    Exists(bool),
    /// Kind of the value.
    Type(ValueKind),
    /// Array length.
    Size(usize),
    /// None of the inner conditions all hold.
    Not(Vec<Condition>),
}

/// A parsed filter.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Every sub-filter matches. An empty list matches everything.
    And(Vec<Filter>),
    /// At least one sub-filter matches.
    Or(Vec<Filter>),
    /// The sub-filter does not match.
    Not(Box<Filter>),
    /// Every condition holds for the value at `path`.
    Field {
        /// Dot path of the field.
        path: String,
        /// Conditions on the field value.
        conditions: Vec<Condition>,
    },
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::invalid_query(message)
}

impl Filter {
    /// A filter matching every record.
    #[must_use]
    pub fn all() -> Self {
        Filter::And(Vec::new())
    }

    /// Parses a JSON filter. `null` and `{}` match every record.
    pub fn parse(filter: &Value) -> CoreResult<Self> {
        match filter {
            Value::Null => Ok(Self::all()),
            Value::Object(map) => Self::parse_object(map),
            other => Err(invalid(format!("filter must be an object, found {other}"))),
        }
    }

    fn parse_object(map: &Map<String, Value>) -> CoreResult<Self> {
        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            let part = match key.as_str() {
                "$and" => Filter::And(Self::parse_list(key, value)?),
                "$or" => Filter::Or(Self::parse_list(key, value)?),
                "$not" => Filter::Not(Box::new(Self::parse_nested(key, value)?)),
                op if op.starts_with('$') => {
                    return Err(invalid(format!("unknown combinator {op}")));
                }
                path => Filter::Field {
                    path: path.to_string(),
                    conditions: parse_conditions(path, value)?,
                },
            };
            parts.push(part);
        }
        Ok(match parts.len() {
            1 => parts.remove(0),
            _ => Filter::And(parts),
        })
    }

    fn parse_nested(op: &str, value: &Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => Self::parse_object(map),
            other => Err(invalid(format!("{op} takes a filter object, found {other}"))),
        }
    }

    fn parse_list(op: &str, value: &Value) -> CoreResult<Vec<Self>> {
        let Value::Array(items) = value else {
            return Err(invalid(format!("{op} takes an array of filters")));
        };
        items.iter().map(|item| Self::parse_nested(op, item)).collect()
    }

    /// Returns true if the record satisfies the filter.
    #[must_use]
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Filter::And(parts) => parts.iter().all(|part| part.matches(record)),
            Filter::Or(parts) => parts.iter().any(|part| part.matches(record)),
            Filter::Not(inner) => !inner.matches(record),
            Filter::Field { path, conditions } => {
                let actual = get_path(record, path);
                conditions.iter().all(|condition| condition.holds(actual))
            }
        }
    }
}

fn is_operator_object(map: &Map<String, Value>) -> CoreResult<bool> {
    let operators = map.keys().filter(|k| k.starts_with('$')).count();
    if operators == 0 {
        Ok(false)
    } else if operators == map.len() {
        Ok(true)
    } else {
        Err(invalid("operators and plain fields cannot be mixed in one condition"))
    }
}

fn parse_conditions(path: &str, value: &Value) -> CoreResult<Vec<Condition>> {
    match value {
        Value::Object(map) if !map.is_empty() && is_operator_object(map)? => map
            .iter()
            .map(|(op, operand)| parse_condition(path, op, operand))
            .collect(),
        other => Ok(vec![Condition::Eq(other.clone())]),
    }
}

fn parse_condition(path: &str, op: &str, operand: &Value) -> CoreResult<Condition> {
    let string_operand = || {
        operand
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| invalid(format!("{op} on {path} takes a string")))
    };
    let list_operand = || match operand {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(invalid(format!("{op} on {path} takes an array"))),
    };
    Ok(match op {
        "$eq" => Condition::Eq(operand.clone()),
        "$ne" => Condition::Ne(operand.clone()),
        "$gt" => Condition::Gt(operand.clone()),
        "$gte" => Condition::Gte(operand.clone()),
        "$lt" => Condition::Lt(operand.clone()),
        "$lte" => Condition::Lte(operand.clone()),
        "$in" => Condition::In(list_operand()?),
        "$nin" => Condition::Nin(list_operand()?),
        "$contains" => Condition::Contains(operand.clone()),
        "$startsWith" => Condition::StartsWith(string_operand()?),
        "$endsWith" => Condition::EndsWith(string_operand()?),
        "$regex" => Condition::Regex(Regex::new(&string_operand()?).ok()),
        "$exists" => Condition::Exists(
            operand
                .as_bool()
                .ok_or_else(|| invalid(format!("$exists on {path} takes a boolean")))?,
        ),
        "$type" => Condition::Type(
            ValueKind::parse(&string_operand()?)
                .ok_or_else(|| invalid(format!("$type on {path} takes a JSON type name")))?,
        ),
        "$size" => Condition::Size(
            operand
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| invalid(format!("$size on {path} takes a non-negative integer")))?,
        ),
        "$not" => match operand {
            Value::Object(map) if !map.is_empty() && is_operator_object(map)? => Condition::Not(
                map.iter()
                    .map(|(op, operand)| parse_condition(path, op, operand))
                    .collect::<CoreResult<_>>()?,
            ),
            other => Condition::Not(vec![Condition::Eq(other.clone())]),
        },
        other => return Err(invalid(format!("unknown operator {other} on {path}"))),
    })
}

/// Deep equality where numbers compare by value.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map_or(false, |y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

impl Condition {
    /// Returns true if the condition holds for `actual` (`None` when the
    /// field is missing).
    #[must_use]
    pub fn holds(&self, actual: Option<&Value>) -> bool {
        let ordered = |expected: &Value, accept: fn(Ordering) -> bool| {
            actual
                .and_then(|a| compare_scalars(a, expected))
                .map_or(false, accept)
        };
        match self {
            Condition::Eq(expected) => actual.map_or(false, |a| values_equal(a, expected)),
            Condition::Ne(expected) => !actual.map_or(false, |a| values_equal(a, expected)),
            Condition::Gt(expected) => ordered(expected, Ordering::is_gt),
            Condition::Gte(expected) => ordered(expected, Ordering::is_ge),
            Condition::Lt(expected) => ordered(expected, Ordering::is_lt),
            Condition::Lte(expected) => ordered(expected, Ordering::is_le),
            Condition::In(options) => {
                actual.map_or(false, |a| options.iter().any(|o| values_equal(a, o)))
            }
            Condition::Nin(options) => {
                !actual.map_or(false, |a| options.iter().any(|o| values_equal(a, o)))
            }
            Condition::Contains(needle) => match (actual, needle) {
                (Some(Value::String(s)), Value::String(n)) => s.contains(n.as_str()),
                (Some(Value::Array(items)), needle) => {
                    items.iter().any(|item| values_equal(item, needle))
                }
                _ => false,
            },
            Condition::StartsWith(prefix) => {
                matches!(actual, Some(Value::String(s)) if s.starts_with(prefix.as_str()))
            }
            Condition::EndsWith(suffix) => {
                matches!(actual, Some(Value::String(s)) if s.ends_with(suffix.as_str()))
            }
            Condition::Regex(pattern) => match (actual, pattern) {
                (Some(Value::String(s)), Some(re)) => re.is_match(s),
                _ => false,
            },
            Condition::Exists(expected) => actual.is_some() == *expected,
            Condition::Type(kind) => actual.map_or(false, |a| ValueKind::of(a) == *kind),
            Condition::Size(len) => matches!(actual, Some(Value::Array(items)) if items.len() == *len),
            Condition::Not(inner) => !inner.iter().all(|c| c.holds(actual)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matches(filter: Value, record: Value) -> bool {
        Filter::parse(&filter).unwrap().matches(&record)
    }

    #[test]
    fn bare_values_mean_equality() {
        let record = json!({ "name": "Ann", "age": 30, "tags": ["a", "b"] });
        assert!(matches(json!({ "name": "Ann" }), record.clone()));
        assert!(matches(json!({ "age": 30.0 }), record.clone()));
        assert!(matches(json!({ "tags": ["a", "b"] }), record.clone()));
        assert!(!matches(json!({ "name": "Bob" }), record.clone()));
        assert!(matches(json!({}), record.clone()));
        assert!(matches(Value::Null, record));
    }

    #[test]
    fn top_level_keys_are_anded() {
        let record = json!({ "a": 1, "b": 2 });
        assert!(matches(json!({ "a": 1, "b": 2 }), record.clone()));
        assert!(!matches(json!({ "a": 1, "b": 3 }), record));
    }

    #[test]
    fn or_combinator() {
        let filter = json!({ "$or": [{ "a": 1 }, { "b": 2 }] });
        assert!(matches(filter.clone(), json!({ "a": 1, "b": 99 })));
        assert!(matches(filter.clone(), json!({ "a": 99, "b": 2 })));
        assert!(!matches(filter, json!({ "a": 99, "b": 99 })));
    }

    #[test]
    fn and_and_not_combinators() {
        let record = json!({ "a": 1, "b": 2 });
        assert!(matches(json!({ "$and": [{ "a": 1 }, { "b": 2 }] }), record.clone()));
        assert!(matches(json!({ "$not": { "a": 2 } }), record.clone()));
        assert!(!matches(json!({ "$not": { "a": 1 } }), record));
    }

    #[test]
    fn comparisons() {
        let record = json!({ "age": 30, "name": "m", "at": "2024-01-02T00:00:00Z" });
        assert!(matches(json!({ "age": { "$gt": 18, "$lte": 30 } }), record.clone()));
        assert!(!matches(json!({ "age": { "$lt": 30 } }), record.clone()));
        assert!(matches(json!({ "name": { "$gte": "a", "$lt": "z" } }), record.clone()));
        assert!(matches(json!({ "at": { "$gt": "2024-01-01T12:00:00+02:00" } }), record.clone()));
        // Mismatched kinds never compare
        assert!(!matches(json!({ "age": { "$gt": "10" } }), record.clone()));
        assert!(!matches(json!({ "missing": { "$lt": 1 } }), record));
    }

    #[test]
    fn membership() {
        let record = json!({ "status": "open" });
        assert!(matches(json!({ "status": { "$in": ["open", "new"] } }), record.clone()));
        assert!(!matches(json!({ "status": { "$nin": ["open"] } }), record.clone()));
        assert!(matches(json!({ "other": { "$nin": ["open"] } }), record));
    }

    #[test]
    fn string_operators() {
        let record = json!({ "email": "alice@example.com", "tags": ["x", "y"] });
        assert!(matches(json!({ "email": { "$contains": "@example" } }), record.clone()));
        assert!(matches(json!({ "tags": { "$contains": "y" } }), record.clone()));
        assert!(matches(json!({ "email": { "$startsWith": "alice" } }), record.clone()));
        assert!(matches(json!({ "email": { "$endsWith": ".com" } }), record.clone()));
        assert!(matches(json!({ "email": { "$regex": "^a.*@example\\.com$" } }), record.clone()));
        assert!(!matches(json!({ "email": { "$regex": "[" } }), record));
    }

    #[test]
    fn existence_type_and_size() {
        let record = json!({ "a": null, "list": [1, 2, 3], "n": 4 });
        assert!(matches(json!({ "a": { "$exists": true } }), record.clone()));
        assert!(matches(json!({ "b": { "$exists": false } }), record.clone()));
        assert!(matches(json!({ "a": { "$type": "null" } }), record.clone()));
        assert!(matches(json!({ "n": { "$type": "number" } }), record.clone()));
        assert!(matches(json!({ "list": { "$size": 3 } }), record.clone()));
        assert!(!matches(json!({ "n": { "$size": 1 } }), record.clone()));
        // Missing is not null
        assert!(!matches(json!({ "b": null }), record));
    }

    #[test]
    fn nested_paths() {
        let record = json!({ "address": { "city": "Oslo" }, "items": [{ "sku": "A1" }] });
        assert!(matches(json!({ "address.city": "Oslo" }), record.clone()));
        assert!(matches(json!({ "items.0.sku": { "$startsWith": "A" } }), record));
    }

    #[test]
    fn field_level_not() {
        let record = json!({ "age": 10 });
        assert!(matches(json!({ "age": { "$not": { "$gt": 18 } } }), record.clone()));
        assert!(!matches(json!({ "age": { "$not": 10 } }), record));
    }

    #[test]
    fn malformed_filters_are_rejected() {
        for filter in [
            json!({ "$xor": [] }),
            json!({ "a": { "$near": 1 } }),
            json!({ "$or": { "a": 1 } }),
            json!({ "a": { "$in": 1 } }),
            json!({ "a": { "$exists": "yes" } }),
            json!({ "a": { "$type": "date" } }),
            json!({ "a": { "$size": -1 } }),
            json!({ "a": { "$gt": 1, "b": 2 } }),
            json!([1, 2]),
        ] {
            let err = Filter::parse(&filter).unwrap_err();
            assert!(matches!(err, CoreError::InvalidQuery { .. }), "{filter}");
        }
    }
}
