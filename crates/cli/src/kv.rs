// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Enqueue argument parsing.
//!
//! Each `K=V` (or `K:V`) token is rewritten to `"K": V` and the tokens are
//! joined into one JSON object. When that parse fails and exactly one token
//! was supplied, the token itself is parsed as a JSON object. Anything else
//! is a parse error.

use serde_json::{Map, Value};

/// Parse enqueue argument tokens into a JSON object map.
pub fn parse_args(tokens: &[String]) -> Result<Map<String, Value>, String> {
    if tokens.is_empty() {
        return Ok(Map::new());
    }

    let mut pairs = Vec::with_capacity(tokens.len());
    for token in tokens {
        match rewrite_pair(token) {
            Some(pair) => pairs.push(pair),
            None => return fallback(tokens),
        }
    }

    let object = format!("{{{}}}", pairs.join(", "));
    match serde_json::from_str::<Map<String, Value>>(&object) {
        Ok(map) => Ok(map),
        Err(_) => fallback(tokens),
    }
}

/// Rewrite `key=value` / `key: value` to `"key": value`. The key must be a
/// bare identifier; the value is passed through as raw JSON.
fn rewrite_pair(token: &str) -> Option<String> {
    let sep = token.find(['=', ':'])?;
    let key = token[..sep].trim();
    let value = token[sep + 1..].trim();
    if key.is_empty()
        || value.is_empty()
        || !key.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return None;
    }
    Some(format!("\"{}\": {}", key, value))
}

fn fallback(tokens: &[String]) -> Result<Map<String, Value>, String> {
    if tokens.len() == 1 {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&tokens[0]) {
            return Ok(map);
        }
    }
    Err(format!("failed to parse {:?}", tokens))
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod tests;
