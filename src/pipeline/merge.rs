//! Document merging: fold per-page JSON objects into one document.
//!
//! Pages are merged in page order. The first parsed page seeds the
//! accumulator; each later page is merged key by key with the first
//! matching rule:
//!
//! | Accumulator        | Addition      | Result                        |
//! |--------------------|---------------|-------------------------------|
//! | key absent         | any           | copy                          |
//! | array              | array         | concatenate, accumulator first|
//! | object             | object        | recurse                       |
//! | bool               | bool          | logical OR                    |
//! | empty              | non-empty     | replace                       |
//! | anything else      | anything      | keep accumulator (first wins) |
//!
//! "Empty" is null, `""`, `[]` or `{}`. Text that is not a JSON object is
//! skipped silently; the verification keys a page may have invented are
//! removed from the result.

use crate::pipeline::response::parse_object;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Keys reserved for verification reports; never taken from page output.
pub const RESERVED_KEYS: [&str; 2] = ["mathVerification", "extractionVerification"];

/// Merge page outputs in order. `None` when no page parsed.
pub fn merge_pages<S: AsRef<str>>(pages: &[S]) -> Option<Value> {
    let mut acc: Option<Map<String, Value>> = None;

    for (i, text) in pages.iter().enumerate() {
        let addition = match parse_object(text.as_ref()) {
            Ok(map) => map,
            Err(e) => {
                warn!("Page output {} is not a JSON object, skipping: {}", i + 1, e.detail);
                continue;
            }
        };
        match acc.as_mut() {
            None => acc = Some(addition),
            Some(acc) => deep_merge(acc, addition),
        }
    }

    let mut merged = acc?;
    strip_verification(&mut merged);
    debug!("Merged document has {} top-level keys", merged.len());
    Some(Value::Object(merged))
}

/// Merge `addition` into `acc` in place.
pub fn deep_merge(acc: &mut Map<String, Value>, addition: Map<String, Value>) {
    for (key, incoming) in addition {
        let Some(existing) = acc.get_mut(&key) else {
            acc.insert(key, incoming);
            continue;
        };
        merge_value(existing, incoming);
    }
}

fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Array(a), Value::Array(b)) => a.extend(b),
        (Value::Object(a), Value::Object(b)) => deep_merge(a, b),
        (Value::Bool(a), Value::Bool(b)) => *a = *a || b,
        (existing, incoming) => {
            if is_empty(existing) && !is_empty(&incoming) {
                *existing = incoming;
            }
        }
    }
}

/// Null, empty string, empty array or empty object.
pub fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Remove any reserved verification keys from the top level.
pub fn strip_verification(doc: &mut Map<String, Value>) {
    for key in RESERVED_KEYS {
        if doc.remove(key).is_some() {
            debug!("Dropped page-supplied '{}'", key);
        }
    }
}
