use serde_json::Value;

/// Look up a dotted path (`main.temp`, `list.0.name`, `list[0].name`) inside `root`.
///
/// Returns `None` when a segment is missing or the value at that point is not
/// traversable. An empty path returns `root` itself.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(path) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Split a path on `.` and `[n]`, skipping empty pieces.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['.', '[', ']']).filter(|s| !s.is_empty())
}
