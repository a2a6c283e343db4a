//! Dot-path lookup into a JSON document.
//!
//! Supported syntax:
//!
//! - `a.b.c` walks object keys
//! - `items.0.height` indexes arrays by position
//! - `a\.b` matches a key that contains a literal dot
//! - `items.#` yields the length of an array

use serde_json::Value;

use crate::error::{Result, WatchError};

/// Splits `path` on unescaped dots.
fn segments(path: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                current.push('.');
                chars.next();
            }
            '.' => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn step(value: &Value, segment: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(segment).cloned(),
        Value::Array(items) if segment == "#" => Some(Value::from(items.len())),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i).cloned()),
        _ => None,
    }
}

/// Renders a found value as the height string.
///
/// Strings are returned without quotes; every other value is its compact
/// JSON text.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extracts the value at `path` from the JSON text `body`.
///
/// # Errors
///
/// [`WatchError::Fetch`] if `body` is not JSON, [`WatchError::MissingHeight`]
/// if nothing (or `null`) lives at `path`.
pub fn extract(body: &str, path: &str) -> Result<String> {
    let document: Value = serde_json::from_str(body)
        .map_err(|e| WatchError::fetch(format!("response is not JSON: {e}")))?;

    let mut current = document;
    for segment in segments(path) {
        current = step(&current, &segment).ok_or_else(|| WatchError::MissingHeight {
            path: path.to_string(),
        })?;
    }

    if current.is_null() {
        return Err(WatchError::MissingHeight {
            path: path.to_string(),
        });
    }
    Ok(render(&current))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = r#"{
        "jsonrpc": "2.0",
        "result": {
            "sync_info": { "latest_block_height": "1234", "catching_up": false },
            "blocks": [ { "number": 7 }, { "number": 8 } ],
            "a.b": { "c": 1.5 },
            "empty": null
        }
    }"#;

    #[test]
    fn test_nested_string_is_unquoted() {
        assert_eq!(
            extract(STATUS, "result.sync_info.latest_block_height").unwrap(),
            "1234"
        );
    }

    #[test]
    fn test_numbers_and_bools_render_as_json() {
        assert_eq!(extract(STATUS, "result.blocks.1.number").unwrap(), "8");
        assert_eq!(extract(STATUS, "result.sync_info.catching_up").unwrap(), "false");
        assert_eq!(extract(r#"{"result":"0x1b4"}"#, "result").unwrap(), "0x1b4");
    }

    #[test]
    fn test_escaped_dot_and_array_length() {
        assert_eq!(extract(STATUS, r"result.a\.b.c").unwrap(), "1.5");
        assert_eq!(extract(STATUS, "result.blocks.#").unwrap(), "2");
    }

    #[test]
    fn test_objects_render_compact() {
        assert_eq!(extract(STATUS, "result.blocks.0").unwrap(), r#"{"number":7}"#);
    }

    #[test]
    fn test_missing_or_null_is_missing_height() {
        for path in ["result.nope", "result.blocks.5", "result.empty", "jsonrpc.x"] {
            let err = extract(STATUS, path).unwrap_err();
            assert!(
                matches!(err, WatchError::MissingHeight { path: ref p } if p == path),
                "{path}: {err:?}"
            );
        }
    }

    #[test]
    fn test_non_json_body_is_fetch_error() {
        let err = extract("<html>bad gateway</html>", "result").unwrap_err();
        assert!(matches!(err, WatchError::Fetch { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_segments_split() {
        assert_eq!(segments("a.b"), vec!["a", "b"]);
        assert_eq!(segments(r"a\.b.c"), vec!["a.b", "c"]);
        assert_eq!(segments("x"), vec!["x"]);
    }
}
