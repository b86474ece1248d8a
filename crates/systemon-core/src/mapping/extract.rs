// ── JSON path extraction ──
//
// Mapping files name payload fields with dotted paths. Gateways nest the
// same field at different depths depending on model and firmware, so
// lookups fall back to a recursive key search when the exact path misses.

use serde_json::Value;

/// Exact dotted navigation. Numeric segments index into arrays.
pub fn lookup<'a>(node: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(node, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Resolve a mapping path to a display string.
///
/// Tries the exact dotted path first. On a miss, each segment is searched
/// for recursively (depth-first, document order) and the first non-empty
/// scalar wins.
pub fn find_path(node: &Value, path: &str) -> Option<String> {
    if let Some(value) = lookup(node, path).and_then(value_to_string) {
        return Some(value);
    }
    path.split('.').find_map(|segment| find_key(node, segment))
}

fn find_key(node: &Value, key: &str) -> Option<String> {
    match node {
        Value::Object(map) => map
            .get(key)
            .and_then(value_to_string)
            .or_else(|| map.values().find_map(|child| find_key(child, key))),
        Value::Array(items) => items.iter().find_map(|child| find_key(child, key)),
        _ => None,
    }
}

/// Render a scalar (or array of scalars) as a string. Empty strings, nulls
/// and objects yield `None`.
pub fn value_to_string(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Array(_) | Value::Object(_) => None,
                scalar => value_to_string(scalar),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => return None,
    };
    (!rendered.is_empty()).then_some(rendered)
}
