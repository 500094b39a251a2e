//! Unwrapping provider responses into flat lists of raw product objects.
//!
//! The rerun API nests extracted data under `data.data`, whose shape
//! depends on how the scraper was configured. Older runs reported results
//! under `data.results[].content`, and the AI API answers with a top-level
//! `result` array.

use serde_json::{Map, Value};
use tracing::warn;

/// Keys under which a wrapper object may hold the product array.
const WRAPPER_KEYS: [&str; 5] = ["products", "items", "data", "listings", "results"];

/// Keys that mark an object as a single product rather than metadata.
const PRODUCT_KEYS: [&str; 5] = ["product_name", "name", "title", "current_price", "price"];

/// Result statuses whose content is usable.
const USABLE_STATUSES: [&str; 3] = ["succeeded", "success", "unknown"];

/// Flatten a rerun API response.
pub fn unwrap_rerun(response: Value) -> Vec<Value> {
    let response = match response {
        Value::Array(products) => return products,
        Value::Object(map) => map,
        other => {
            warn!(kind = json_kind(&other), "Unexpected response structure");
            return Vec::new();
        }
    };

    if let Some(Value::Object(outer)) = response.get("data") {
        if let Some(inner) = outer.get("data").filter(|inner| !inner.is_null()) {
            return unwrap_inner(inner.clone());
        }
        if let Some(Value::Array(results)) = outer.get("results") {
            if !results.is_empty() {
                return unwrap_results(results);
            }
        }
    }

    if let Some(Value::Array(products)) = response.get("result") {
        return products.clone();
    }

    warn!(
        keys = ?response.keys().collect::<Vec<_>>(),
        "Unexpected response structure, no products extracted"
    );
    Vec::new()
}

/// Flatten an AI API response.
pub fn unwrap_ai(response: Value) -> Vec<Value> {
    match response {
        Value::Object(mut map) => match map.remove("result") {
            Some(Value::Array(products)) => products,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                warn!(kind = json_kind(&other), "AI API result is not an array");
                Vec::new()
            }
        },
        Value::Array(products) => products,
        other => {
            warn!(kind = json_kind(&other), "Unexpected AI API response");
            Vec::new()
        }
    }
}

/// `data.data` may be an array, a wrapper object, a single product, or any
/// of those encoded as a JSON string.
fn unwrap_inner(inner: Value) -> Vec<Value> {
    let inner = match inner {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, preview = %preview(&text), "Inner data is not valid JSON");
                return Vec::new();
            }
        },
        other => other,
    };

    match inner {
        Value::Array(products) => products,
        Value::Object(map) => {
            if let Some(products) = wrapped_products(&map, &WRAPPER_KEYS) {
                return products;
            }
            if PRODUCT_KEYS.iter().any(|key| map.contains_key(*key)) {
                return vec![Value::Object(map)];
            }
            warn!(
                keys = ?map.keys().collect::<Vec<_>>(),
                "Inner data holds no recognizable products"
            );
            Vec::new()
        }
        other => {
            warn!(kind = json_kind(&other), "Could not extract products from inner data");
            Vec::new()
        }
    }
}

fn unwrap_results(results: &[Value]) -> Vec<Value> {
    let mut products = Vec::new();

    for result in results {
        let status = result
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if !USABLE_STATUSES.contains(&status) {
            warn!(status, "Skipping result");
            continue;
        }

        let content = match result.get("content") {
            Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(error = %err, preview = %preview(text), "Result content is not valid JSON");
                    continue;
                }
            },
            Some(content) => content.clone(),
            None => result.clone(),
        };

        match content {
            Value::Array(items) => products.extend(items),
            Value::Object(map) => {
                if let Some(items) = wrapped_products(&map, &WRAPPER_KEYS[..4]) {
                    products.extend(items);
                } else if ["product_name", "name", "title"]
                    .iter()
                    .any(|key| map.contains_key(*key))
                {
                    products.push(Value::Object(map));
                }
            }
            _ => {}
        }
    }

    products
}

fn wrapped_products(map: &Map<String, Value>, keys: &[&str]) -> Option<Vec<Value>> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::Array(items)) => Some(items.clone()),
        _ => None,
    })
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

fn preview(text: &str) -> &str {
    match text.char_indices().nth(100) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
