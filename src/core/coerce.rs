// Lenient string/bytes coercion: parse failures become `None` instead of errors.
use serde_json::Value;

use crate::core::codec::LoadOptions;

pub fn read_str(input: &str) -> Option<Value> {
    if input.is_empty() {
        return None;
    }
    match serde_json::from_str(input) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(input, error = %err, "not a json value");
            None
        }
    }
}

pub fn read_str_or(input: &str, default: Value) -> Value {
    read_str(input).unwrap_or(default)
}

pub fn read_bytes(input: &[u8]) -> Option<serde_pickle::Value> {
    if input.is_empty() {
        return None;
    }
    match serde_pickle::value_from_slice(input, LoadOptions::default().pickle()) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(len = input.len(), error = %err, "not a pickle value");
            None
        }
    }
}
