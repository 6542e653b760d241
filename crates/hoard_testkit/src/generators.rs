//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random records, filters and
//! sequences of engine operations.

use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for generating valid type names.
pub fn type_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for generating distinct-looking email addresses.
pub fn email_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{1,8}", "[a-z]{2,6}").prop_map(|(user, host)| format!("{user}@{host}.test"))
}

/// Strategy for generating scalar field values.
///
/// Covers every JSON scalar kind, including null.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(Value::from),
        (-1000.0f64..1000.0).prop_map(Value::from),
        "[a-zA-Z ]{0,10}".prop_map(Value::from),
    ]
}

/// Strategy for generating records of a small fixed shape.
///
/// Fields may be missing, null or of an unexpected kind so that sorting
/// and filtering see every case.
pub fn record_strategy() -> impl Strategy<Value = Value> {
    (
        prop::option::of(0i64..100),
        prop::option::of("[a-c]{1,3}"),
        prop::option::of(any::<bool>()),
        prop::option::of(scalar_strategy()),
        prop::collection::vec("[a-c]", 0..4),
    )
        .prop_map(|(score, label, active, extra, tags)| {
            let mut record = json!({ "tags": tags });
            if let Some(score) = score {
                record["score"] = json!(score);
            }
            if let Some(label) = label {
                record["label"] = json!(label);
            }
            if let Some(active) = active {
                record["active"] = json!(active);
            }
            if let Some(extra) = extra {
                record["extra"] = extra;
            }
            record
        })
}

/// Strategy for generating filters over the fields of [`record_strategy`].
pub fn filter_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        (0i64..100).prop_map(|n| json!({ "score": { "$gte": n } })),
        (0i64..100).prop_map(|n| json!({ "score": { "$lt": n } })),
        "[a-c]{1,2}".prop_map(|s| json!({ "label": { "$startsWith": s } })),
        any::<bool>().prop_map(|b| json!({ "active": b })),
        any::<bool>().prop_map(|b| json!({ "extra": { "$exists": b } })),
        "[a-c]".prop_map(|s| json!({ "tags": { "$contains": s } })),
        (0usize..4).prop_map(|n| json!({ "tags": { "$size": n } })),
    ];
    leaf.prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..3).prop_map(|items| json!({ "$and": items })),
            prop::collection::vec(inner.clone(), 1..3).prop_map(|items| json!({ "$or": items })),
            inner.prop_map(|item| json!({ "$not": item })),
        ]
    })
}

/// One operation on a rel between a fixed set of left and right nodes.
#[derive(Debug, Clone)]
pub enum RelOperation {
    /// Add the edge between two nodes
    Add {
        /// Left node position
        left: usize,
        /// Right node position
        right: usize,
    },
    /// Remove the edge between two nodes
    Remove {
        /// Left node position
        left: usize,
        /// Right node position
        right: usize,
    },
}

/// Strategy for generating rel operations over `left` by `right` nodes.
pub fn rel_operations_strategy(
    left: usize,
    right: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<RelOperation>> {
    let op = prop_oneof![
        (0..left, 0..right).prop_map(|(left, right)| RelOperation::Add { left, right }),
        (0..left, 0..right).prop_map(|(left, right)| RelOperation::Remove { left, right }),
    ];
    prop::collection::vec(op, 0..max_ops)
}

/// Strategy for generating successive values of an array-of-ids field.
///
/// Each value picks a subset of `0..nodes`, by position.
pub fn membership_history_strategy(
    nodes: usize,
    max_steps: usize,
) -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::btree_set(0..nodes, 0..=nodes), 1..max_steps)
        .prop_map(|steps| steps.into_iter().map(|set| set.into_iter().collect()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn type_names_are_lowercase() {
        let mut runner = TestRunner::default();
        for _ in 0..50 {
            let name = type_name_strategy()
                .new_tree(&mut runner)
                .unwrap()
                .current();
            assert!(name.chars().next().unwrap().is_ascii_lowercase());
            assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        }
    }

    #[test]
    fn records_always_carry_tags() {
        let mut runner = TestRunner::default();
        for _ in 0..50 {
            let record = record_strategy().new_tree(&mut runner).unwrap().current();
            assert!(record["tags"].is_array());
        }
    }

    #[test]
    fn memberships_stay_in_range() {
        let mut runner = TestRunner::default();
        let history = membership_history_strategy(4, 6)
            .new_tree(&mut runner)
            .unwrap()
            .current();
        assert!(!history.is_empty());
        assert!(history.iter().flatten().all(|&n| n < 4));
    }
}
