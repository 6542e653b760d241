//! The system record: identifier counters and the logical clock.

use crate::engine::Engine;
use crate::error::CoreResult;
use crate::record::{format_id, validate_type_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the single system record in the `System` namespace.
pub const SYSTEM_RECORD: &str = "system";

/// Per-store counters and logical clock.
///
/// Created lazily on first use and never deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemRecord {
    /// Last logical timestamp handed out.
    pub current_clock_tick: u64,
    /// Last identifier number handed out, per type.
    pub counters: BTreeMap<String, u64>,
}

impl SystemRecord {
    /// Advances the counter of a type and returns the new value.
    pub fn next_number(&mut self, type_name: &str) -> u64 {
        let counter = self.counters.entry(type_name.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// The number the next call to [`SystemRecord::next_number`] returns.
    #[must_use]
    pub fn peek_number(&self, type_name: &str) -> u64 {
        self.counters.get(type_name).copied().unwrap_or(0) + 1
    }

    /// Advances the logical clock and returns the new tick.
    pub fn tick(&mut self) -> u64 {
        self.current_clock_tick += 1;
        self.current_clock_tick
    }
}

impl Engine {
    fn system_mut(&mut self) -> CoreResult<&mut SystemRecord> {
        if !self.system.contains(&*self.store, SYSTEM_RECORD)? {
            self.system.put(SYSTEM_RECORD, SystemRecord::default())?;
        }
        let encoding = self.config.encoding;
        self.system
            .get_mut(&*self.store, encoding, SYSTEM_RECORD)?
            .ok_or_else(|| crate::error::CoreError::not_found(SYSTEM_RECORD))
    }

    /// Allocates the next identifier number of a type.
    pub fn next_number(&mut self, type_name: &str) -> CoreResult<u64> {
        self.ensure_open()?;
        validate_type_name(type_name)?;
        Ok(self.system_mut()?.next_number(type_name))
    }

    /// The identifier the next record of a type will get. Nothing is allocated.
    pub(crate) fn peek_id(&mut self, type_name: &str) -> CoreResult<String> {
        let encoding = self.config.encoding;
        let next = self
            .system
            .load(&*self.store, encoding, SYSTEM_RECORD)?
            .map_or(1, |system| system.peek_number(type_name));
        Ok(format_id(type_name, next))
    }

    /// Returns a new logical timestamp, strictly greater than every previous one.
    pub fn logical_timestamp(&mut self) -> CoreResult<u64> {
        self.ensure_open()?;
        Ok(self.system_mut()?.tick())
    }

    /// Returns the current state of the system record.
    pub fn system_record(&mut self) -> CoreResult<SystemRecord> {
        self.ensure_open()?;
        let encoding = self.config.encoding;
        Ok(self
            .system
            .load(&*self.store, encoding, SYSTEM_RECORD)?
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_type() {
        let mut system = SystemRecord::default();
        assert_eq!(system.next_number("user"), 1);
        assert_eq!(system.next_number("user"), 2);
        assert_eq!(system.next_number("project"), 1);
        assert_eq!(system.peek_number("user"), 3);
        assert_eq!(system.peek_number("task"), 1);
    }

    #[test]
    fn clock_is_monotonic() {
        let mut system = SystemRecord::default();
        let a = system.tick();
        let b = system.tick();
        assert!(b > a);
        assert_eq!(system.current_clock_tick, 2);
    }

    #[test]
    fn serialized_field_names() {
        let mut system = SystemRecord::default();
        system.next_number("user");
        let json = serde_json::to_value(&system).unwrap();
        assert_eq!(json["currentClockTick"], 0);
        assert_eq!(json["counters"]["user"], 1);
    }
}
