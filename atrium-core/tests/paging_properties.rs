//! Property tests for paginated-shape discovery.

use atrium_core::{discover, ApiError};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Arbitrary JSON trees, depth-bounded, with a mix of scalars, arrays, and
/// objects so discovery sees realistic envelope shapes.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (0u64..1_000).prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn longest_array_len(value: &Value) -> Option<usize> {
    match value {
        Value::Array(items) => {
            let nested = items.iter().filter_map(longest_array_len).max();
            Some(nested.map_or(items.len(), |n| items.len().max(n)))
        }
        Value::Object(map) => map.values().filter_map(longest_array_len).max(),
        _ => None,
    }
}

proptest! {
    #[test]
    fn total_is_never_below_item_count(root in arb_json()) {
        if let Ok(discovered) = discover(&root) {
            prop_assert!(discovered.total >= discovered.items.len() as u64);
        }
    }

    #[test]
    fn chosen_array_is_a_longest_one(root in arb_json()) {
        // Array roots short-circuit without traversal, so only object roots
        // make the global-longest claim.
        if root.is_object() {
            if let Ok(discovered) = discover(&root) {
                if let Some(longest) = longest_array_len(&root) {
                    prop_assert_eq!(discovered.items.len(), longest);
                }
            }
        }
    }

    #[test]
    fn no_data_means_no_arrays(root in arb_json()) {
        if discover(&root) == Err(ApiError::NoData) {
            prop_assert_eq!(longest_array_len(&root), None);
        }
    }
}

#[test]
fn discovery_is_deterministic() {
    let root = json!({"a": [1, 2], "b": [3, 4], "total": 2});
    let first = discover(&root).unwrap();
    let second = discover(&root).unwrap();
    assert_eq!(first, second);
}
