//! Change feed: the hook an audit log listens on.
//!
//! Every successful `create`, `update` and `delete` emits one
//! [`ChangeEvent`] once the record and all of its indexes, groupings and
//! rels have been updated. Events carry the logical clock tick of the
//! operation, so subscribers see them in tick order.
//!
//! ```rust
//! use hoard_core::{ChangeType, Engine, TypeDecl};
//! use serde_json::json;
//!
//! let mut engine = Engine::open_in_memory().unwrap();
//! engine.declare(&TypeDecl::new("user").index("email")).unwrap();
//! let events = engine.subscribe();
//!
//! engine.create("user", json!({ "email": "a@example.com" })).unwrap();
//! let event = events.try_recv().unwrap();
//! assert_eq!(event.change, ChangeType::Created);
//! assert_eq!(event.id, "USER.1");
//! ```

use crate::record::Record;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

/// Kind of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// A record was created.
    Created,
    /// A record was updated.
    Updated,
    /// A record was deleted.
    Deleted,
}

/// One change to an ordinary record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// Logical clock tick of the change.
    pub tick: u64,
    /// Identifier of the record.
    pub id: String,
    /// Type of the record.
    pub type_name: String,
    /// What happened.
    pub change: ChangeType,
    /// The record after the change. `None` for deletions.
    pub record: Option<Record>,
}

/// Fans change events out to subscribers and keeps a short history.
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
    history: RwLock<VecDeque<ChangeEvent>>,
    max_history: usize,
}

impl ChangeFeed {
    /// Creates a feed keeping the last 1024 events.
    pub fn new() -> Self {
        Self::with_max_history(1024)
    }

    /// Creates a feed keeping the last `max_history` events.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(VecDeque::new()),
            max_history,
        }
    }

    /// Returns a receiver for every future event.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Sends an event to every live subscriber, forgetting dropped ones.
    pub fn emit(&self, event: ChangeEvent) {
        {
            let mut history = self.history.write();
            history.push_back(event.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
        }
        self.subscribers
            .write()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Events newer than `after_tick`, oldest first, at most `limit`.
    pub fn poll(&self, after_tick: u64, limit: usize) -> Vec<ChangeEvent> {
        self.history
            .read()
            .iter()
            .filter(|event| event.tick > after_tick)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
