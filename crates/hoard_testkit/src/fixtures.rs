//! Test fixtures and engine helpers.
//!
//! Provides convenience functions for setting up test engines
//! and common test scenarios.

use hoard_core::{Config, Engine};
use hoard_storage::InMemoryRecordStore;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test engine with automatic cleanup.
pub struct TestEngine {
    /// The engine instance.
    pub engine: Engine,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestEngine {
    /// Creates a new engine over an in-memory store.
    pub fn memory() -> Self {
        Self {
            engine: Engine::open_in_memory().expect("Failed to open in-memory engine"),
            _temp_dir: None,
        }
    }

    /// Creates a new in-memory engine with a custom configuration.
    pub fn memory_with(config: Config) -> Self {
        let store = Box::new(InMemoryRecordStore::new());
        Self {
            engine: Engine::with_store(config, store).expect("Failed to open in-memory engine"),
            _temp_dir: None,
        }
    }

    /// Creates a new engine over a store in a temporary directory.
    pub fn file() -> Self {
        Self::file_with(Config::default())
    }

    /// Creates a new file-backed engine with a custom configuration.
    pub fn file_with(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let engine =
            Engine::open(temp_dir.path().join("store"), config).expect("Failed to open engine");
        Self {
            engine,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store root if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("store"))
    }

    /// Shuts the engine down and opens a fresh one over the same directory.
    ///
    /// Panics for in-memory engines, which keep nothing across instances.
    pub fn reopen(&mut self) {
        let path = self.path().expect("Only file engines can be reopened");
        let config = self.engine.config().clone();
        self.engine.shut_down().expect("Failed to shut down engine");
        self.engine = Engine::open(&path, config).expect("Failed to reopen engine");
    }
}

impl std::ops::Deref for TestEngine {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

impl std::ops::DerefMut for TestEngine {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.engine
    }
}

/// Runs a test with a temporary in-memory engine.
///
/// # Example
///
/// ```rust
/// use hoard_testkit::with_temp_engine;
/// use serde_json::json;
///
/// with_temp_engine(|engine| {
///     engine.create("task", json!({ "done": false })).unwrap();
///     assert_eq!(engine.get("TASK.1").unwrap()["done"], false);
/// });
/// ```
pub fn with_temp_engine<F, R>(f: F) -> R
where
    F: FnOnce(&mut Engine) -> R,
{
    let mut test_engine = TestEngine::memory();
    f(&mut test_engine.engine)
}

/// Runs a test with a temporary file-backed engine and its store root.
pub fn with_file_engine<F, R>(f: F) -> R
where
    F: FnOnce(&mut Engine, &Path) -> R,
{
    let mut test_engine = TestEngine::file();
    let path = test_engine
        .path()
        .expect("File engine should have a path");
    f(&mut test_engine.engine, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use hoard_core::{RelDecl, TypeDecl};
    use serde_json::json;

    /// Cities the populated users are spread across, round-robin.
    pub const CITIES: [&str; 3] = ["Oslo", "Lima", "Kyoto"];

    /// Creates an engine with `count` users indexed by email and grouped by
    /// city.
    ///
    /// User `i` has email `user{i}@example.com`, name `User {i}`, age
    /// `20 + i` and city `CITIES[i % 3]`.
    pub fn populated_users(count: usize) -> TestEngine {
        let mut test_engine = TestEngine::memory();
        test_engine
            .declare(
                &TypeDecl::new("user")
                    .index("email")
                    .grouping("users_by_city", "city"),
            )
            .expect("Failed to declare user");

        for i in 0..count {
            test_engine
                .create(
                    "user",
                    json!({
                        "email": format!("user{i}@example.com"),
                        "name": format!("User {i}"),
                        "age": 20 + i,
                        "city": CITIES[i % CITIES.len()],
                    }),
                )
                .expect("Failed to create user");
        }

        test_engine
    }

    /// Creates an engine with projects and users joined by the `memberships`
    /// rel, mirrored from each user's `projects` array.
    ///
    /// Returns the engine with the project ids in creation order.
    pub fn projects_and_members(projects: usize, users: usize) -> (TestEngine, Vec<String>) {
        let mut test_engine = TestEngine::memory();
        test_engine
            .declare(&TypeDecl::new("project"))
            .expect("Failed to declare project");
        test_engine
            .declare(
                &TypeDecl::new("user").rel(
                    RelDecl::new("memberships", "user", "project").left_field("projects"),
                ),
            )
            .expect("Failed to declare user");

        let mut project_ids = Vec::with_capacity(projects);
        for i in 0..projects {
            let project = test_engine
                .create("project", json!({ "title": format!("Project {i}") }))
                .expect("Failed to create project");
            project_ids.push(project["id"].as_str().unwrap_or_default().to_string());
        }

        for i in 0..users {
            let joined: Vec<&String> = project_ids.iter().skip(i % projects.max(1)).collect();
            test_engine
                .create(
                    "user",
                    json!({ "name": format!("User {i}"), "projects": joined }),
                )
                .expect("Failed to create user");
        }

        (test_engine, project_ids)
    }
}
