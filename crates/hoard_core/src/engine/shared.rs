//! Thread-safe engine handle.

use crate::engine::Engine;
use crate::error::CoreResult;
use crate::query::{Page, SelectOptions};
use crate::record::Record;
use crate::stats::{EngineStats, StatsSnapshot};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// An [`Engine`] shared between threads.
///
/// Every call locks the engine for its whole duration, so multi-step
/// operations (a create and its index, grouping and rel maintenance) never
/// interleave. Use [`SharedEngine::with`] to run several operations under
/// one lock.
///
/// ```rust
/// use hoard_core::{Engine, SharedEngine, TypeDecl};
/// use serde_json::json;
///
/// let shared = SharedEngine::new(Engine::open_in_memory().unwrap());
/// shared.with(|engine| engine.declare(&TypeDecl::new("user").index("email"))).unwrap();
///
/// let handle = shared.clone();
/// std::thread::spawn(move || handle.create("user", json!({ "email": "a@x" })))
///     .join()
///     .unwrap()
///     .unwrap();
/// assert!(shared.with(|engine| engine.exists("USER.1")).unwrap());
/// ```
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
    stats: Arc<EngineStats>,
}

impl SharedEngine {
    /// Wraps an engine.
    pub fn new(engine: Engine) -> Self {
        let stats = engine.stats_handle();
        Self {
            inner: Arc::new(Mutex::new(engine)),
            stats,
        }
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        let mut engine = self.inner.lock();
        f(&mut engine)
    }

    /// See [`Engine::create`].
    pub fn create(&self, type_name: &str, values: Value) -> CoreResult<Record> {
        self.with(|engine| engine.create(type_name, values))
    }

    /// See [`Engine::get`].
    pub fn get(&self, id: &str) -> CoreResult<Record> {
        self.with(|engine| engine.get(id))
    }

    /// See [`Engine::update`].
    pub fn update(&self, id: &str, values: Value) -> CoreResult<Record> {
        self.with(|engine| engine.update(id, values))
    }

    /// See [`Engine::delete`].
    pub fn delete(&self, type_name: &str, id: &str) -> CoreResult<()> {
        self.with(|engine| engine.delete(type_name, id))
    }

    /// See [`Engine::select`].
    pub fn select(&self, type_name: &str, filters: &Value, options: &SelectOptions) -> CoreResult<Page> {
        self.with(|engine| engine.select(type_name, filters, options))
    }

    /// See [`Engine::flush`].
    pub fn flush(&self) -> CoreResult<usize> {
        self.with(Engine::flush)
    }

    /// See [`Engine::shut_down`].
    pub fn shut_down(&self) -> CoreResult<()> {
        self.with(Engine::shut_down)
    }

    /// Engine counters, read without taking the lock.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEngine")
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeDecl;
    use serde_json::json;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn concurrent_creates_get_distinct_ids() {
        let shared = SharedEngine::new(Engine::open_in_memory().unwrap());
        shared
            .with(|engine| engine.declare(&TypeDecl::new("user").index("email")))
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    (0..25)
                        .map(|i| {
                            let user = shared
                                .create("user", json!({ "email": format!("{t}-{i}@x") }))
                                .unwrap();
                            user["id"].as_str().unwrap().to_string()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.extend(handle.join().unwrap());
        }
        assert_eq!(ids.len(), 100);
        assert_eq!(shared.stats().creates, 100);
        assert_eq!(shared.with(|engine| engine.list("user")).unwrap().len(), 100);
    }
}
