//! Sort specifications and value ordering.

use crate::error::{CoreError, CoreResult};
use crate::record::get_path;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Dot path of the field to sort by.
    pub field: String,
    /// Sort this key from high to low.
    #[serde(default)]
    pub descending: bool,
}

impl SortKey {
    /// Ascending key on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending key on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Ordered list of sort keys; later keys break ties of earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec(pub Vec<SortKey>);

impl SortSpec {
    /// Sort by one field, ascending.
    pub fn by(field: impl Into<String>) -> Self {
        Self(vec![SortKey::asc(field)])
    }

    /// Adds a tie-breaking key.
    #[must_use]
    pub fn then(mut self, key: SortKey) -> Self {
        self.0.push(key);
        self
    }

    /// Returns true if there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses `"field"`, `["a", "b"]` or `[{"field": "a", "descending": true}]`.
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        let key = |item: &Value| match item {
            Value::String(field) => Ok(SortKey::asc(field.clone())),
            Value::Object(_) => serde_json::from_value(item.clone())
                .map_err(|e| CoreError::invalid_query(format!("bad sort key {item}: {e}"))),
            other => Err(CoreError::invalid_query(format!("bad sort key {other}"))),
        };
        match value {
            Value::Null => Ok(Self::default()),
            Value::Array(items) => items.iter().map(key).collect::<CoreResult<_>>().map(Self),
            single => Ok(Self(vec![key(single)?])),
        }
    }

    /// Compares two records key by key.
    ///
    /// `flip` reverses every key's direction. Records whose value for a
    /// key is missing, null or an object sort after all others whatever
    /// the direction.
    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value, flip: bool) -> Ordering {
        for key in &self.0 {
            let ordering = match (sortable(a, &key.field), sortable(b, &key.field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(x), Some(y)) => {
                    let ordering = compare_values(x, y);
                    if key.descending != flip {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl From<&str> for SortSpec {
    fn from(field: &str) -> Self {
        Self::by(field)
    }
}

impl From<SortKey> for SortSpec {
    fn from(key: SortKey) -> Self {
        Self(vec![key])
    }
}

fn sortable<'a>(record: &'a Value, field: &str) -> Option<&'a Value> {
    get_path(record, field).filter(|v| !matches!(v, Value::Null | Value::Object(_)))
}

/// Milliseconds since the epoch, if `s` is an RFC 3339 timestamp.
fn timestamp_millis(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s).ok().map(|t| t.timestamp_millis())
}

/// Case-insensitive comparison; on ties lowercase sorts before uppercase.
fn locale_cmp(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| b.cmp(a))
}

/// Timestamps sort before every other string, by instant; the rest sort
/// with [`locale_cmp`]. Ranking the two classes first keeps the order total.
fn compare_strings(a: &str, b: &str) -> Ordering {
    match (timestamp_millis(a), timestamp_millis(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| locale_cmp(a, b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => locale_cmp(a, b),
    }
}

/// Orders two sortable values.
///
/// Values of the same kind compare naturally (arrays by length); values
/// of different kinds fall back to their serialized form.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => compare_strings(x, y),
        (Value::Array(x), Value::Array(y)) => x.len().cmp(&y.len()),
        _ => compare_scalars(a, b).unwrap_or_else(|| a.to_string().cmp(&b.to_string())),
    }
}

/// Orders two values of the same scalar kind, as range operators do.
///
/// Strings compare by timestamp when both are RFC 3339, by code point
/// otherwise. `None` for anything else.
pub(crate) fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(
            match (timestamp_millis(x), timestamp_millis(y)) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x.cmp(y),
            },
        ),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
