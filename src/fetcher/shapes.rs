//! Ordered response-shape matchers.
//!
//! The product API has no stable contract: the product list has been seen at
//! the top level and under `data`, `products`, `result`, `results`, `docs`,
//! and `deals`, sometimes nested one level inside `data`. Each shape is a
//! named matcher that returns the list if it is present and is an array.
//! [`SHAPES`] is tried in order and the first hit wins.

use serde_json::Value;
use tracing::{debug, warn};

/// One plausible location of the product list in a response body.
pub struct Shape {
    pub name: &'static str,
    pub extract: fn(&Value) -> Option<&Vec<Value>>,
}

fn at_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Vec<Value>> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_array)
}

/// Matchers in priority order.
pub const SHAPES: &[Shape] = &[
    Shape {
        name: "top-level array",
        extract: Value::as_array,
    },
    Shape {
        name: "data",
        extract: |v| at_path(v, &["data"]),
    },
    Shape {
        name: "data.products",
        extract: |v| at_path(v, &["data", "products"]),
    },
    Shape {
        name: "data.deals",
        extract: |v| at_path(v, &["data", "deals"]),
    },
    Shape {
        name: "data.docs",
        extract: |v| at_path(v, &["data", "docs"]),
    },
    Shape {
        name: "products",
        extract: |v| at_path(v, &["products"]),
    },
    Shape {
        name: "result",
        extract: |v| at_path(v, &["result"]),
    },
    Shape {
        name: "results",
        extract: |v| at_path(v, &["results"]),
    },
    Shape {
        name: "docs",
        extract: |v| at_path(v, &["docs"]),
    },
    Shape {
        name: "deals",
        extract: |v| at_path(v, &["deals"]),
    },
];

/// Where reviews endpoints put their list, tried before [`SHAPES`].
pub const REVIEW_SHAPES: &[Shape] = &[
    Shape {
        name: "data.reviews",
        extract: |v| at_path(v, &["data", "reviews"]),
    },
    Shape {
        name: "reviews",
        extract: |v| at_path(v, &["reviews"]),
    },
];

/// Find the review list in `body`.
pub fn extract_reviews(body: &Value) -> Option<&Vec<Value>> {
    REVIEW_SHAPES
        .iter()
        .find_map(|shape| (shape.extract)(body))
        .or_else(|| extract_items(body))
}

/// Find the product list in `body`, or `None` if no known shape matches.
pub fn extract_items(body: &Value) -> Option<&Vec<Value>> {
    for shape in SHAPES {
        if let Some(items) = (shape.extract)(body) {
            debug!(shape = shape.name, count = items.len(), "Matched response shape");
            return Some(items);
        }
    }
    None
}

/// Like [`extract_items`], but logs the offending keys and yields an empty
/// slice when nothing matches.
pub fn extract_items_or_empty<'a>(body: &'a Value, keyword: &str) -> &'a [Value] {
    match extract_items(body) {
        Some(items) => items,
        None => {
            match body {
                Value::Object(map) => {
                    let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                    warn!(%keyword, ?keys, "Unrecognized response shape");
                }
                other => warn!(%keyword, kind = json_kind(other), "Unrecognized response type"),
            }
            &[]
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
