//! Query evaluator: filter, sort and paginate the members of a type or of
//! a grouping bucket.
//!
//! Candidates come only from a type's index or a grouping bucket, never
//! from scanning the store. Each candidate is loaded through the cache; a
//! candidate that fails to load is dropped from the result rather than
//! failing the query.

mod filter;
mod page;
mod sort;

pub use filter::{values_equal, Condition, Filter, ValueKind};
pub use page::{evaluate, Page, SelectOptions};
pub use sort::{SortKey, SortSpec};

use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::record::value_key;
use serde_json::Value;
use tracing::debug;

impl Engine {
    /// Selects records of a type.
    ///
    /// # Errors
    ///
    /// - `InvalidQuery` if the filter is malformed
    /// - `NotConfigured` if the type has no index
    pub fn select(
        &mut self,
        type_name: &str,
        filters: &Value,
        options: &SelectOptions,
    ) -> CoreResult<Page> {
        self.ensure_open()?;
        let filter = Filter::parse(filters)?;
        let ids = self.type_ids(type_name)?;
        self.load_range(ids, Some(&filter), options)
    }

    /// Selects records from one bucket of a grouping.
    pub fn select_bucket(
        &mut self,
        grouping: &str,
        value: &Value,
        filters: &Value,
        options: &SelectOptions,
    ) -> CoreResult<Page> {
        self.ensure_open()?;
        let filter = Filter::parse(filters)?;
        if value_key(value).is_none() {
            return Err(CoreError::invalid_query(format!(
                "bucket value must be a string, number or boolean, found {value}"
            )));
        }
        let ids = self.bucket(grouping, value)?;
        self.load_range(ids, Some(&filter), options)
    }

    /// Loads candidates through the cache and evaluates them.
    pub(crate) fn load_range(
        &mut self,
        ids: Vec<String>,
        filter: Option<&Filter>,
        options: &SelectOptions,
    ) -> CoreResult<Page> {
        let total = ids.len();
        let mut records = Vec::with_capacity(total);
        for id in ids {
            match self.load(&id, true) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!(%id, "candidate no longer exists, dropped"),
                Err(error) => debug!(%id, %error, "candidate failed to load, dropped"),
            }
        }
        self.stats.record_select();
        Ok(evaluate(records, total, filter, options))
    }
}
