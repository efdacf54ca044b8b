//! Paginated-shape discovery over untyped JSON trees.
//!
//! Backend list endpoints disagree about envelope shape: a bare array,
//! `{"items": [...], "count": n}`, `{"data": {"results": [...], "meta":
//! {"total": n}}}`, and so on. Rather than one adapter per endpoint, the
//! client decodes the response as a generic [`Value`] and this module picks
//! the most plausible item array and total out of it.
//!
//! Callers that know their envelope should decode a fully typed page struct
//! instead; discovery is the fallback, not the preferred path.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::lenient::from_value_lenient;

/// An ordered page of items plus the server's total count.
///
/// `total` is never smaller than `items.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Result of shape discovery: the chosen item array, still undecoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovered<'a> {
    pub items: &'a [Value],
    pub total: u64,
}

struct Candidate<'a> {
    items: &'a [Value],
    parent: Option<&'a Map<String, Value>>,
    depth: usize,
}

/// Find the best item array in `root` and its total count.
///
/// Selection: the longest array anywhere in the tree; length ties go to the
/// shallower one, remaining ties to the first found in traversal order.
/// Total: the smallest non-negative integer >= the item count, looked up
/// first among the array's immediate parent-object values, then anywhere in
/// the tree; if none exists, the item count itself.
pub fn discover(root: &Value) -> Result<Discovered<'_>, ApiError> {
    if let Value::Array(items) = root {
        return Ok(Discovered {
            items,
            total: items.len() as u64,
        });
    }
    if !root.is_object() {
        return Err(ApiError::NoData);
    }

    let mut best: Option<Candidate<'_>> = None;
    walk(root, None, 0, &mut best);
    let best = best.ok_or(ApiError::NoData)?;

    let count = best.items.len() as u64;
    let total = best
        .parent
        .and_then(|parent| smallest_at_least(parent.values(), count))
        .or_else(|| smallest_in_tree(root, count, best.items))
        .unwrap_or(count);

    Ok(Discovered {
        items: best.items,
        total,
    })
}

/// Discover and decode a page in one step, using lenient element decoding.
pub fn decode_page<T: DeserializeOwned>(root: &Value) -> Result<Page<T>, ApiError> {
    let discovered = discover(root)?;
    let items = discovered
        .items
        .iter()
        .map(from_value_lenient)
        .collect::<Result<Vec<T>, ApiError>>()?;
    Ok(Page {
        items,
        total: discovered.total,
    })
}

fn walk<'a>(
    value: &'a Value,
    parent: Option<&'a Map<String, Value>>,
    depth: usize,
    best: &mut Option<Candidate<'a>>,
) {
    match value {
        Value::Array(items) => {
            let better = match best {
                None => true,
                Some(current) => {
                    items.len() > current.items.len()
                        || (items.len() == current.items.len() && depth < current.depth)
                }
            };
            if better {
                *best = Some(Candidate {
                    items,
                    parent,
                    depth,
                });
            }
            for item in items {
                walk(item, None, depth + 1, best);
            }
        }
        Value::Object(map) => {
            for child in map.values() {
                walk(child, Some(map), depth + 1, best);
            }
        }
        _ => {}
    }
}

/// Smallest non-negative integer among `values` that is >= `min`.
fn smallest_at_least<'a>(values: impl Iterator<Item = &'a Value>, min: u64) -> Option<u64> {
    values
        .filter_map(Value::as_u64)
        .filter(|n| *n >= min)
        .min()
}

/// Tree-wide total search. The chosen item array is skipped: values inside
/// the items themselves are data, not counts.
fn smallest_in_tree(value: &Value, min: u64, exclude: &[Value]) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().filter(|n| *n >= min),
        Value::Array(items) => {
            if same_slice(items, exclude) {
                return None;
            }
            items
                .iter()
                .filter_map(|v| smallest_in_tree(v, min, exclude))
                .min()
        }
        Value::Object(map) => map
            .values()
            .filter_map(|v| smallest_in_tree(v, min, exclude))
            .min(),
        _ => None,
    }
}

fn same_slice(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && std::ptr::eq(a.as_ptr(), b.as_ptr())
}
