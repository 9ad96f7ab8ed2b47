//! Response normalization for Space outputs.
//!
//! The third output slot of the emotion Space is loosely typed: sometimes a mapping,
//! sometimes a JSON string, sometimes a source-literal rendering of a mapping. Downstream
//! consumers either see structured data or the original raw value; decoding never fails.

use serde_json::Value;

use crate::literal::parse_literal;

/// Decision chain: structured passthrough → strict JSON → permissive literal → raw value.
pub fn parse_struct(raw: Value) -> Value {
    // mappings and non-text values are already as structured as they get
    let decoded = match raw.as_str() {
        Some(text) => decode_text(text),
        None => return raw,
    };
    match decoded {
        Some(value) => value,
        None => {
            tracing::debug!("Space output is neither JSON nor a literal; passing through as text");
            raw
        }
    }
}

fn decode_text(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .or_else(|| parse_literal(text).ok())
}
