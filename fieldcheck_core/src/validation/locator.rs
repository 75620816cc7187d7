//! Field path resolution against a single request location.
//!
//! Paths are dot-separated keys, each optionally followed by bracket
//! segments: `foo[0]`, `a.b[2].c`, `matrix[1][0]`, `a[b]`. The empty path
//! addresses the container itself.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    if path.is_empty() {
        return segments;
    }

    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if !key.is_empty() || rest.is_empty() {
            segments.push(PathSegment::Key(key.to_string()));
        }

        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(end) = stripped.find(']') else {
                // Unbalanced bracket, keep the remainder as a literal key.
                segments.push(PathSegment::Key(rest.to_string()));
                rest = "";
                break;
            };
            let inner = &stripped[..end];
            match inner.parse::<usize>() {
                Ok(index) => segments.push(PathSegment::Index(index)),
                Err(_) => {
                    let unquoted = inner.trim_matches(|c| c == '\'' || c == '"');
                    segments.push(PathSegment::Key(unquoted.to_string()));
                }
            }
            rest = &stripped[end + 1..];
        }

        // `a[0]x` reads as `a[0].x`.
        if !rest.is_empty() {
            segments.push(PathSegment::Key(rest.to_string()));
        }
    }

    segments
}

fn step<'a>(value: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Object(map), PathSegment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get_mut(key),
        (Value::Object(map), PathSegment::Index(index)) => map.get_mut(&index.to_string()),
        (Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index),
        _ => None,
    }
}

/// Returns the value at `path`, or `None` when any segment is missing.
pub fn locate<'a>(container: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return match container {
            Value::Null => None,
            other => Some(other),
        };
    }

    parse_path(path)
        .iter()
        .try_fold(container, |current, segment| step(current, segment))
}

pub fn locate_mut<'a>(container: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    parse_path(path)
        .iter()
        .try_fold(container, |current, segment| step_mut(current, segment))
}

/// Overwrites the value at an existing `path`. Returns false when the path
/// does not resolve; nothing is created.
pub fn assign(container: &mut Value, path: &str, value: Value) -> bool {
    match locate_mut(container, path) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => false,
    }
}
