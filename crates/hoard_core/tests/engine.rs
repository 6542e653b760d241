//! End-to-end behavior of the engine over in-memory and on-disk stores.

use hoard_core::{
    Config, CoreError, Direction, Encoding, Engine, RelDecl, SelectOptions, SortKey, SortSpec,
    TypeDecl,
};
use serde_json::{json, Value};
use tempfile::tempdir;

fn ids(page: &hoard_core::Page) -> Vec<String> {
    page.ids().into_iter().map(str::to_string).collect()
}

fn letter_users() -> Engine {
    let mut engine = Engine::open_in_memory().unwrap();
    engine
        .declare(
            &TypeDecl::new("user")
                .index("email")
                .grouping("users_by_name", "name"),
        )
        .unwrap();
    // Created in reverse so candidate order differs from name order
    for c in (b'a'..=b'z').rev() {
        let letter = (c as char).to_string();
        engine
            .create(
                "user",
                json!({ "email": format!("{letter}@example.com"), "name": letter.to_uppercase() }),
            )
            .unwrap();
    }
    engine
}

#[test]
fn backfilled_index_resolves_every_record() {
    let mut engine = Engine::open_in_memory().unwrap();
    for i in 0..50 {
        engine
            .create("user", json!({ "email": format!("u{i}@x"), "n": i }))
            .unwrap();
    }
    engine.create_index("user", "email").unwrap();

    for i in 0..50 {
        let value = json!(format!("u{i}@x"));
        let user = engine.get_by_field("user", "email", &value).unwrap().unwrap();
        assert_eq!(user["n"], i);
        assert!(engine.key_exists("user", &value).unwrap());
    }
    assert!(!engine.key_exists("user", &json!("u50@x")).unwrap());
    assert_eq!(engine.all_indexed_values("user").unwrap().len(), 50);
}

#[test]
fn second_index_on_a_type_is_rejected() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine.create_index("user", "email").unwrap();
    let err = engine.create_index("user", "name").unwrap_err();
    assert!(matches!(err, CoreError::AlreadyConfigured { .. }));
}

#[test]
fn backfill_keeps_first_writer_and_skips_the_rest() {
    let mut engine = Engine::open_in_memory().unwrap();
    for email in ["dup@x", "dup@x", "solo@x"] {
        engine.create("user", json!({ "email": email })).unwrap();
    }
    for _ in 0..10 {
        engine.create("user", json!({ "email": "late@x" })).unwrap();
    }
    engine.create("user", json!({ "name": "no email" })).unwrap();

    engine.create_index("user", "email").unwrap();

    let owner = engine
        .get_by_field("user", "email", &json!("dup@x"))
        .unwrap()
        .unwrap();
    assert_eq!(owner["id"], "USER.1");
    let late = engine
        .get_by_field("user", "email", &json!("late@x"))
        .unwrap()
        .unwrap();
    assert_eq!(late["id"], "USER.4");
    assert_eq!(engine.all_indexed_values("user").unwrap().len(), 3);
    assert_eq!(engine.stats().population_skips, 11);
}

#[test]
fn backfill_order_follows_creation() {
    let mut engine = Engine::open_in_memory().unwrap();
    for n in 1..=36 {
        let values = if n == 11 || n == 36 {
            json!({ "email": "shared@x" })
        } else {
            json!({})
        };
        engine.create("user", values).unwrap();
    }
    engine.create_index("user", "email").unwrap();
    // USER.10 (the 36th record) sorts before USER.B (the 11th) as a string
    let owner = engine
        .get_by_field("user", "email", &json!("shared@x"))
        .unwrap()
        .unwrap();
    assert_eq!(owner["id"], "USER.B");
}

#[test]
fn live_update_to_owned_value_is_rejected() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine.declare(&TypeDecl::new("user").index("email")).unwrap();
    engine.create("user", json!({ "email": "a@x" })).unwrap();
    engine.create("user", json!({ "email": "b@x" })).unwrap();

    let err = engine
        .update_indexed_field("USER.2", "user", "email", Some(&json!("b@x")), Some(&json!("a@x")))
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateValue { ref owner, .. } if owner == "USER.1"));

    let owner = engine.get_by_field("user", "email", &json!("a@x")).unwrap().unwrap();
    assert_eq!(owner["id"], "USER.1");
    let owner = engine.get_by_field("user", "email", &json!("b@x")).unwrap().unwrap();
    assert_eq!(owner["id"], "USER.2");

    let err = engine
        .update_indexed_field("USER.2", "user", "name", None, Some(&json!("x")))
        .unwrap_err();
    assert!(matches!(err, CoreError::NotConfigured { .. }));
    engine
        .update_indexed_field("USER.2", "user", "email", Some(&json!("b@x")), Some(&json!("b@x")))
        .unwrap();
}

#[test]
fn grouping_update_is_idempotent() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine
        .declare(&TypeDecl::new("user").index("email").grouping("users_by_name", "name"))
        .unwrap();
    engine.create("user", json!({ "email": "a@x", "name": "John" })).unwrap();

    engine.update_grouping("user", "USER.1").unwrap();
    engine.update_grouping("user", "USER.1").unwrap();
    assert_eq!(engine.bucket("users_by_name", &json!("John")).unwrap(), vec!["USER.1"]);
}

#[test]
fn grouping_follows_field_changes() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine
        .declare(&TypeDecl::new("user").index("email").grouping("users_by_name", "name"))
        .unwrap();
    engine.create("user", json!({ "email": "a@x", "name": "John" })).unwrap();
    engine.create("user", json!({ "email": "b@x", "name": "John" })).unwrap();
    assert_eq!(engine.bucket("users_by_name", &json!("John")).unwrap().len(), 2);

    engine.update("USER.2", json!({ "name": "Michael" })).unwrap();
    assert_eq!(engine.bucket("users_by_name", &json!("John")).unwrap(), vec!["USER.1"]);
    assert_eq!(engine.bucket("users_by_name", &json!("Michael")).unwrap(), vec!["USER.2"]);

    engine.update("USER.1", json!({ "name": "Michael" })).unwrap();
    assert_eq!(engine.bucket_keys("users_by_name").unwrap(), vec!["Michael"]);
}

#[test]
fn grouping_backfills_and_allows_several_per_type() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine.create("user", json!({ "name": "Ann", "city": "Oslo" })).unwrap();
    engine.create("user", json!({ "name": "Bob", "city": "Oslo" })).unwrap();
    engine.create("user", json!({ "name": "Cid" })).unwrap();

    engine.create_grouping("users_by_city", "user", "city").unwrap();
    engine.create_grouping("users_by_name", "user", "name").unwrap();
    assert_eq!(
        engine.bucket("users_by_city", &json!("Oslo")).unwrap(),
        vec!["USER.1", "USER.2"]
    );
    assert_eq!(engine.bucket("users_by_name", &json!("Cid")).unwrap(), vec!["USER.3"]);
    assert!(matches!(
        engine.create_grouping("users_by_city", "user", "name"),
        Err(CoreError::AlreadyConfigured { .. })
    ));
}

#[test]
fn rel_edges_are_symmetric() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine.create_rel("memberships", "user", "project").unwrap();
    let pairs = [
        ("USER.1", "PROJECT.1"),
        ("USER.1", "PROJECT.2"),
        ("USER.2", "PROJECT.1"),
    ];
    for (user, project) in pairs {
        assert!(engine.add_rel("memberships", user, project).unwrap());
    }
    assert!(!engine.add_rel("memberships", "USER.1", "PROJECT.1").unwrap());

    for user in ["USER.1", "USER.2"] {
        for project in ["PROJECT.1", "PROJECT.2"] {
            let forward = engine
                .related("memberships", user, Direction::LeftToRight)
                .unwrap()
                .contains(&project.to_string());
            let backward = engine
                .related("memberships", project, Direction::RightToLeft)
                .unwrap()
                .contains(&user.to_string());
            assert_eq!(forward, backward, "{user} {project}");
        }
    }

    assert_eq!(engine.remove_object_from_all_rels("USER.1").unwrap(), 2);
    assert!(engine
        .related("memberships", "USER.1", Direction::LeftToRight)
        .unwrap()
        .is_empty());
    for project in ["PROJECT.1", "PROJECT.2"] {
        let users = engine
            .related("memberships", project, Direction::RightToLeft)
            .unwrap();
        assert!(!users.contains(&"USER.1".to_string()));
    }
    assert_eq!(engine.rel_edge_count("memberships").unwrap(), 1);
}

#[test]
fn rel_checks_endpoint_types() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine.create_rel("memberships", "user", "project").unwrap();
    assert!(engine.add_rel("memberships", "PROJECT.1", "USER.1").is_err());
    assert!(engine.add_rel("unknown", "USER.1", "PROJECT.1").is_err());
    assert!(matches!(
        engine.create_rel("memberships", "user", "project"),
        Err(CoreError::AlreadyConfigured { .. })
    ));
}

#[test]
fn self_rels_clean_both_directions() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine.create_rel("follows", "user", "user").unwrap();
    engine.add_rel("follows", "USER.1", "USER.2").unwrap();
    engine.add_rel("follows", "USER.3", "USER.1").unwrap();
    engine.add_rel("follows", "USER.3", "USER.2").unwrap();

    assert_eq!(engine.remove_object_from_all_rels("USER.1").unwrap(), 2);
    assert_eq!(
        engine.related("follows", "USER.3", Direction::LeftToRight).unwrap(),
        vec!["USER.2"]
    );
    assert!(engine
        .related("follows", "USER.2", Direction::RightToLeft)
        .unwrap()
        .iter()
        .all(|id| id != "USER.1"));
}

#[test]
fn array_field_mirrors_rel() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine
        .declare(
            &TypeDecl::new("user").index("email").rel(
                RelDecl::new("memberships", "user", "project").left_field("projects"),
            ),
        )
        .unwrap();

    let user = engine
        .create("user", json!({ "email": "a@x", "projects": ["PROJECT.X", "PROJECT.Y"] }))
        .unwrap();
    let id = user["id"].as_str().unwrap().to_string();
    assert_eq!(
        engine.related("memberships", &id, Direction::LeftToRight).unwrap(),
        vec!["PROJECT.X", "PROJECT.Y"]
    );

    engine
        .update(&id, json!({ "projects": ["PROJECT.Y", "PROJECT.Z"] }))
        .unwrap();
    assert_eq!(
        engine.related("memberships", &id, Direction::LeftToRight).unwrap(),
        vec!["PROJECT.Y", "PROJECT.Z"]
    );
    assert!(engine
        .related("memberships", "PROJECT.X", Direction::RightToLeft)
        .unwrap()
        .is_empty());
    assert_eq!(
        engine.related("memberships", "PROJECT.Z", Direction::RightToLeft).unwrap(),
        vec![id.clone()]
    );
}

#[test]
fn bad_mirrored_array_rejects_the_write() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine
        .declare(
            &TypeDecl::new("user").index("email").rel(
                RelDecl::new("memberships", "user", "project").left_field("projects"),
            ),
        )
        .unwrap();
    assert!(engine
        .create("user", json!({ "email": "a@x", "projects": ["TEAM.1"] }))
        .is_err());
    assert!(engine.all_indexed_values("user").unwrap().is_empty());

    engine.create("user", json!({ "email": "a@x" })).unwrap();
    assert!(engine.update("USER.1", json!({ "projects": "PROJECT.1" })).is_err());
    assert_eq!(engine.get("USER.1").unwrap().get("projects"), None);
}

#[test]
fn delete_removes_rel_edges() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine.declare(&TypeDecl::new("user").index("email")).unwrap();
    engine.declare(&TypeDecl::new("project").index("title")).unwrap();
    engine.create_rel("memberships", "user", "project").unwrap();
    engine.create("user", json!({ "email": "a@x" })).unwrap();
    engine.create("project", json!({ "title": "P" })).unwrap();
    engine.add_rel("memberships", "USER.1", "PROJECT.1").unwrap();

    engine.delete("user", "USER.1").unwrap();
    assert!(engine
        .related("memberships", "PROJECT.1", Direction::RightToLeft)
        .unwrap()
        .is_empty());
}

#[test]
fn related_data_loads_and_sorts() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine.declare(&TypeDecl::new("project").index("title")).unwrap();
    engine.create_rel("memberships", "user", "project").unwrap();
    for title in ["Gamma", "Alpha", "Beta"] {
        let project = engine.create("project", json!({ "title": title })).unwrap();
        engine
            .add_rel("memberships", "USER.1", project["id"].as_str().unwrap())
            .unwrap();
    }
    engine.add_rel("memberships", "USER.1", "PROJECT.Z").unwrap();

    let page = engine
        .related_data(
            "memberships",
            "USER.1",
            Direction::LeftToRight,
            &SelectOptions::new().sort_by("title"),
        )
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.filtered, 3);
    let titles: Vec<&Value> = page.items.iter().map(|p| &p["title"]).collect();
    assert_eq!(titles, [&json!("Alpha"), &json!("Beta"), &json!("Gamma")]);
}

#[test]
fn select_sorts_and_paginates() {
    let mut engine = letter_users();
    let options = SelectOptions::new().sort_by("name").range(10, 20);
    let page = engine.select("user", &json!({}), &options).unwrap();
    assert_eq!(page.items.len(), 10);
    assert_eq!(page.total, 26);
    let names: Vec<&str> = page.items.iter().map(|u| u["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["K", "L", "M", "N", "O", "P", "Q", "R", "S", "T"]);

    let page = engine
        .select("user", &json!({}), &options.clone().descending(true))
        .unwrap();
    assert_eq!(page.items.len(), 10);
    let names: Vec<&str> = page.items.iter().map(|u| u["name"].as_str().unwrap()).collect();
    let mut expected = names.clone();
    expected.sort_unstable();
    assert_eq!(names[0], *expected.last().unwrap());
    assert_eq!(names[0], "P");
}

#[test]
fn select_filters_with_combinators() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine.declare(&TypeDecl::new("row").index("key")).unwrap();
    engine.create("row", json!({ "key": 1, "a": 1, "b": 99 })).unwrap();
    engine.create("row", json!({ "key": 2, "a": 99, "b": 2 })).unwrap();
    engine.create("row", json!({ "key": 3, "a": 99, "b": 99 })).unwrap();

    let page = engine
        .select("row", &json!({ "$or": [{ "a": 1 }, { "b": 2 }] }), &SelectOptions::new())
        .unwrap();
    let mut found = ids(&page);
    found.sort();
    assert_eq!(found, vec!["ROW.1", "ROW.2"]);
    assert_eq!(page.total, 3);
    assert_eq!(page.filtered, 2);

    assert!(matches!(
        engine.select("row", &json!({ "$xor": [] }), &SelectOptions::new()),
        Err(CoreError::InvalidQuery { .. })
    ));
}

#[test]
fn select_with_multiple_sort_keys() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine.declare(&TypeDecl::new("row").index("key")).unwrap();
    for (key, group, rank) in [(1, "b", 1), (2, "a", 1), (3, "b", 2), (4, "a", 2)] {
        engine
            .create("row", json!({ "key": key, "group": group, "rank": rank }))
            .unwrap();
    }
    let sort = SortSpec::by("group").then(SortKey::desc("rank"));
    let page = engine
        .select("row", &Value::Null, &SelectOptions::new().sort(sort))
        .unwrap();
    assert_eq!(ids(&page), vec!["ROW.4", "ROW.2", "ROW.3", "ROW.1"]);
}

#[test]
fn select_bucket_narrows_to_grouping() {
    let mut engine = letter_users();
    engine.create("user", json!({ "email": "a2@example.com", "name": "A" })).unwrap();
    let page = engine
        .select_bucket(
            "users_by_name",
            &json!("A"),
            &json!({ "email": { "$startsWith": "a2" } }),
            &SelectOptions::new(),
        )
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.filtered, 1);
    assert_eq!(page.items[0]["email"], "a2@example.com");
}

#[test]
fn select_requires_an_index() {
    let mut engine = Engine::open_in_memory().unwrap();
    engine.create("note", json!({ "text": "hi" })).unwrap();
    assert!(matches!(
        engine.select("note", &json!({}), &SelectOptions::new()),
        Err(CoreError::NotConfigured { .. })
    ));
}

#[test]
fn reopened_store_keeps_records_and_configuration() {
    let dir = tempdir().unwrap();
    {
        let mut engine = Engine::open(dir.path(), Config::default()).unwrap();
        engine
            .declare(
                &TypeDecl::new("user")
                    .index("email")
                    .grouping("users_by_name", "name")
                    .rel(RelDecl::new("memberships", "user", "project").left_field("projects")),
            )
            .unwrap();
        engine
            .create("user", json!({ "email": "a@x", "name": "Ann", "projects": ["PROJECT.1"] }))
            .unwrap();
        engine.shut_down().unwrap();
    }

    let mut engine = Engine::open(dir.path(), Config::default()).unwrap();
    assert_eq!(engine.index_field("user"), Some("email"));
    assert_eq!(engine.bucket("users_by_name", &json!("Ann")).unwrap(), vec!["USER.1"]);
    assert_eq!(
        engine.related("memberships", "PROJECT.1", Direction::RightToLeft).unwrap(),
        vec!["USER.1"]
    );
    // Counters survive, so ids are never reused
    let user = engine.create("user", json!({ "email": "b@x" })).unwrap();
    assert_eq!(user["id"], "USER.2");
    // Declaring again is a no-op
    engine
        .declare(&TypeDecl::new("user").index("email").grouping("users_by_name", "name"))
        .unwrap();
    assert!(engine
        .declare(&TypeDecl::new("user").index("name"))
        .is_err());
}

#[test]
fn unflushed_writes_are_not_on_disk() {
    let dir = tempdir().unwrap();
    {
        let mut engine = Engine::open(dir.path(), Config::default()).unwrap();
        engine.create("note", json!({ "text": "lost" })).unwrap();
        assert_eq!(engine.last_modified("NOTE.1").unwrap(), None);
    }
    let mut engine = Engine::open(dir.path(), Config::default()).unwrap();
    assert_eq!(engine.load("NOTE.1", true).unwrap(), None);
    assert!(engine.list_all_identifiers().unwrap().is_empty());
}

#[test]
fn unflushed_delete_leaves_stored_data_consistent() {
    let dir = tempdir().unwrap();
    {
        let mut engine = Engine::open(dir.path(), Config::default()).unwrap();
        engine
            .declare(&TypeDecl::new("user").index("email").grouping("users_by_name", "name"))
            .unwrap();
        engine.create("user", json!({ "email": "a@x", "name": "A" })).unwrap();
        engine.flush().unwrap();

        engine.delete("user", "USER.1").unwrap();
        assert!(!engine.exists("USER.1").unwrap());
        assert_eq!(engine.last_modified("USER.1").unwrap(), None);
        assert!(!engine.list_all_identifiers().unwrap().contains(&"USER.1".to_string()));
        // Dropped without a flush
    }

    let mut engine = Engine::open(dir.path(), Config::default()).unwrap();
    assert!(engine.exists("USER.1").unwrap());
    assert!(engine.key_exists("user", &json!("a@x")).unwrap());
    assert_eq!(engine.bucket("users_by_name", &json!("A")).unwrap(), vec!["USER.1"]);

    engine.delete("user", "USER.1").unwrap();
    engine.shut_down().unwrap();

    let mut engine = Engine::open(dir.path(), Config::default()).unwrap();
    assert!(!engine.exists("USER.1").unwrap());
    assert!(!engine.key_exists("user", &json!("a@x")).unwrap());
    assert!(engine.bucket("users_by_name", &json!("A")).unwrap().is_empty());
    let again = engine.create("user", json!({ "email": "a@x", "name": "A" })).unwrap();
    assert_eq!(again["id"], "USER.2");
}

#[test]
fn cbor_encoding_round_trips_through_disk() {
    let dir = tempdir().unwrap();
    let config = Config::new().encoding(Encoding::Cbor);
    {
        let mut engine = Engine::open(dir.path(), config.clone()).unwrap();
        engine.declare(&TypeDecl::new("user").index("email")).unwrap();
        engine
            .create("user", json!({ "email": "a@x", "tags": ["x"], "age": 3.5 }))
            .unwrap();
        engine.shut_down().unwrap();
    }
    let raw = std::fs::read(dir.path().join("objects").join("USER.1")).unwrap();
    assert!(serde_json::from_slice::<Value>(&raw).is_err());

    let mut engine = Engine::open(dir.path(), config).unwrap();
    let user = engine.get("USER.1").unwrap();
    assert_eq!(user["tags"], json!(["x"]));
    assert_eq!(user["age"], 3.5);
}

#[test]
fn advisory_lock_keeps_second_engine_out() {
    let dir = tempdir().unwrap();
    let config = Config::new().use_lock(true);
    let mut first = Engine::open(dir.path(), config.clone()).unwrap();
    assert!(matches!(
        Engine::open(dir.path(), config.clone()),
        Err(CoreError::StoreLocked)
    ));
    first.shut_down().unwrap();
    assert!(Engine::open(dir.path(), config).is_ok());
}

#[test]
fn missing_directory_is_an_error_without_create() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent");
    assert!(Engine::open(&path, Config::new().create_if_missing(false)).is_err());
    assert!(!path.exists());
}

#[test]
fn logical_clock_is_monotonic_across_operations() {
    let mut engine = Engine::open_in_memory().unwrap();
    let first = engine.logical_timestamp().unwrap();
    engine.create("note", json!({})).unwrap();
    let second = engine.logical_timestamp().unwrap();
    assert_eq!(second, first + 2);
    assert_eq!(engine.next_number("note").unwrap(), 2);
    assert_eq!(engine.create("note", json!({})).unwrap()["id"], "NOTE.3");
}
