//! Select options, result pages and the evaluation pipeline.

use crate::query::filter::Filter;
use crate::query::sort::SortSpec;
use crate::record::Record;
use serde::Serialize;

/// Sorting and pagination of a select.
///
/// ```rust
/// use hoard_core::SelectOptions;
///
/// let options = SelectOptions::new().sort_by("name").range(10, 20).descending(true);
/// assert_eq!(options.end, Some(20));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Sort keys. Without keys the candidate order is kept.
    pub sort: SortSpec,
    /// First position of the page.
    pub start: usize,
    /// Position after the last one of the page; `None` runs to the end.
    pub end: Option<usize>,
    /// Reverses every sort key, or the candidate order when unsorted.
    pub descending: bool,
}

impl SelectOptions {
    /// Unsorted, unpaginated.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts by one field, ascending.
    #[must_use]
    pub fn sort_by(mut self, field: &str) -> Self {
        self.sort = SortSpec::by(field);
        self
    }

    /// Sorts by a full specification.
    #[must_use]
    pub fn sort(mut self, sort: impl Into<SortSpec>) -> Self {
        self.sort = sort.into();
        self
    }

    /// Keeps positions `start..end`.
    #[must_use]
    pub const fn range(mut self, start: usize, end: usize) -> Self {
        self.start = start;
        self.end = Some(end);
        self
    }

    /// Sets the first position.
    #[must_use]
    pub const fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    /// Sets the position after the last one.
    #[must_use]
    pub const fn end(mut self, end: usize) -> Self {
        self.end = Some(end);
        self
    }

    /// Reverses the order.
    #[must_use]
    pub const fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }
}

/// One page of a select.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Records of the page, in order.
    pub items: Vec<Record>,
    /// Number of candidates before loading and filtering.
    pub total: usize,
    /// Number of candidates that loaded and matched the filter.
    pub filtered: usize,
    /// Requested first position.
    pub start: usize,
    /// Requested end position.
    pub end: Option<usize>,
}

impl Page {
    /// Identifiers of the records on the page.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|record| record.get(crate::ID_FIELD).and_then(|id| id.as_str()))
            .collect()
    }
}

/// Filters, sorts and paginates loaded candidates.
///
/// `total` is the number of candidates before any failed to load.
#[must_use]
pub fn evaluate(
    records: Vec<Record>,
    total: usize,
    filter: Option<&Filter>,
    options: &SelectOptions,
) -> Page {
    let mut matched: Vec<Record> = match filter {
        Some(filter) => records.into_iter().filter(|r| filter.matches(r)).collect(),
        None => records,
    };

    if options.sort.is_empty() {
        if options.descending {
            matched.reverse();
        }
    } else {
        // Stable, so ties keep candidate order
        matched.sort_by(|a, b| options.sort.compare(a, b, options.descending));
    }

    let filtered = matched.len();
    let start = options.start.min(filtered);
    let end = options.end.map_or(filtered, |end| end.min(filtered)).max(start);
    let items = matched.drain(start..end).collect();

    Page {
        items,
        total,
        filtered,
        start: options.start,
        end: options.end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn letters() -> Vec<Value> {
        (b'a'..=b'z')
            .map(|c| {
                let name = (c as char).to_string();
                json!({ "id": format!("USER.{name}"), "name": name })
            })
            .collect()
    }

    #[test]
    fn paginates_sorted_records() {
        let options = SelectOptions::new().sort_by("name").range(10, 20);
        let page = evaluate(letters(), 26, None, &options);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.items[0]["name"], "k");
        assert_eq!(page.items[9]["name"], "t");
        assert_eq!(page.filtered, 26);
    }

    #[test]
    fn descending_reverses_order() {
        let options = SelectOptions::new().sort_by("name").range(0, 3).descending(true);
        let page = evaluate(letters(), 26, None, &options);
        assert_eq!(page.ids(), ["USER.z", "USER.y", "USER.x"]);
    }

    #[test]
    fn unsorted_descending_reverses_candidates() {
        let page = evaluate(letters(), 26, None, &SelectOptions::new().descending(true));
        assert_eq!(page.items[0]["name"], "z");
    }

    #[test]
    fn out_of_range_pages_are_empty() {
        let page = evaluate(letters(), 26, None, &SelectOptions::new().range(30, 40));
        assert!(page.items.is_empty());
        let page = evaluate(letters(), 26, None, &SelectOptions::new().range(5, 2));
        assert!(page.items.is_empty());
        assert_eq!(page.start, 5);
    }

    #[test]
    fn filter_runs_before_pagination() {
        let filter = Filter::parse(&json!({ "name": { "$in": ["a", "b", "c"] } })).unwrap();
        let page = evaluate(letters(), 28, Some(&filter), &SelectOptions::new().start(1));
        assert_eq!(page.total, 28);
        assert_eq!(page.filtered, 3);
        assert_eq!(page.items.len(), 2);
    }
}
