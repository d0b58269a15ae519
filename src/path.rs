//! Dot/bracket path extraction for nested bindings.
//!
//! A deliberately small navigator: `a.b`, `a[0]`, `a["key"]` and
//! combinations thereof. No filters, no wildcards, no expressions.

use serde_json::Value;

enum Segment {
    Key(String),
    Index(usize),
}

/// Pluck a nested value out of `value`. Returns `None` when the path does
/// not parse or any segment is missing.
pub fn extract<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in parse(path)? {
        current = match segment {
            Segment::Key(key) => current.get(key.as_str())?,
            Segment::Index(index) => current.get(index)?,
        };
    }
    Some(current)
}

fn parse(path: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']')?;
            let inner = &after[..end];
            let first = inner.chars().next()?;
            if first == '"' || first == '\'' {
                if inner.len() < 2 || !inner.ends_with(first) {
                    return None;
                }
                segments.push(Segment::Key(inner[1..inner.len() - 1].to_string()));
            } else {
                segments.push(Segment::Index(inner.parse().ok()?));
            }
            rest = &after[end + 1..];
        } else {
            let end = rest
                .find(|c| c == '.' || c == '[')
                .unwrap_or(rest.len());
            if end == 0 {
                return None;
            }
            segments.push(Segment::Key(rest[..end].to_string()));
            rest = &rest[end..];
        }
        if let Some(after_dot) = rest.strip_prefix('.') {
            if after_dot.is_empty() {
                return None;
            }
            rest = after_dot;
        }
    }
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dots_navigate_objects() {
        let value = json!({"foo": {"bar": "wizzle"}});
        assert_eq!(extract(&value, "foo.bar"), Some(&json!("wizzle")));
        assert_eq!(extract(&value, "foo"), Some(&json!({"bar": "wizzle"})));
    }

    #[test]
    fn brackets_navigate_arrays_and_keys() {
        let value = json!({"xs": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(extract(&value, "xs[1].name"), Some(&json!("b")));
        assert_eq!(extract(&value, r#"xs[0]["name"]"#), Some(&json!("a")));
        assert_eq!(extract(&value, "xs[0]['name']"), Some(&json!("a")));
    }

    #[test]
    fn missing_or_malformed_is_none() {
        let value = json!({"a": [1]});
        assert_eq!(extract(&value, "a[5]"), None);
        assert_eq!(extract(&value, "b"), None);
        assert_eq!(extract(&value, "a["), None);
        assert_eq!(extract(&value, "a..b"), None);
        assert_eq!(extract(&value, "a."), None);
    }
}
