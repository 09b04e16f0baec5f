//! Tolerant JSON payload decoding.
//!
//! Scanners emit one of: a single object, an array, newline-delimited JSON,
//! or any of those cut off mid-record by an output cap or a killed process.
//! The decoder keeps every complete top-level value and reports whether
//! anything had to be discarded.

use serde_json::{Deserializer, Value};

/// Decode a byte stream into its complete top-level JSON values.
///
/// Returns `(documents, truncated)` where `truncated` is true when trailing
/// bytes could not be decoded (a cut-off record or interleaved non-JSON
/// noise). Concatenated values and NDJSON both work: the stream deserializer
/// does not care about the whitespace between values.
#[must_use]
pub fn decode_documents(raw: &[u8]) -> (Vec<Value>, bool) {
    let mut docs = Vec::new();
    let mut stream = Deserializer::from_slice(raw).into_iter::<Value>();
    let mut truncated = false;

    for item in &mut stream {
        match item {
            Ok(value) => docs.push(value),
            Err(_) => {
                truncated = true;
                break;
            }
        }
    }
    (docs, truncated)
}

/// Splice top-level arrays into their elements; other values pass through.
/// Tools that emit `[{...}, {...}]` and tools that emit NDJSON end up with
/// the same shape after this.
#[must_use]
pub fn flatten_documents(docs: &[Value]) -> Vec<&Value> {
    let mut out = Vec::new();
    for doc in docs {
        match doc {
            Value::Array(items) => out.extend(items.iter()),
            other => out.push(other),
        }
    }
    out
}
