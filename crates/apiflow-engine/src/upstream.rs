use std::collections::HashMap;

use serde_json::{Map, Value};

use apiflow_core::types::Edge;

use crate::path::resolve_path;

/// Sentinel marking a parameter that reads from upstream results.
pub const UPSTREAM: &str = "upstream";

/// A parameter as declared in a node's configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Sent as-is (after template resolution for strings).
    Literal(Value),
    /// Path into the data produced by upstream nodes.
    UpstreamRef(String),
}

impl ParamValue {
    /// Classify a raw config value. `"upstream"` and `"upstream.<path>"` are references.
    pub fn parse(raw: &Value) -> Self {
        if let Value::String(s) = raw {
            if s == UPSTREAM {
                return ParamValue::UpstreamRef(String::new());
            }
            if let Some(path) = s.strip_prefix("upstream.") {
                return ParamValue::UpstreamRef(path.to_string());
            }
        }
        ParamValue::Literal(raw.clone())
    }
}

/// Look up `path` in one upstream result.
///
/// `upstream.data.x` is accepted as a spelling of `upstream.x`: the literal
/// path is tried first so results that really contain a `data` key (GraphQL
/// responses) keep working.
fn lookup_in<'a>(result: &'a Value, path: &str) -> Option<&'a Value> {
    resolve_path(result, path).or_else(|| {
        let rest = if path == "data" {
            ""
        } else {
            path.strip_prefix("data.")?
        };
        resolve_path(result, rest)
    })
}

/// Resolve an upstream reference across incoming edges.
///
/// Edges are visited in the supplied order and the last one whose source
/// produced a value at `path` wins. `None` means the parameter is omitted.
pub fn resolve_upstream_ref(
    path: &str,
    incoming: &[&Edge],
    results: &HashMap<String, Value>,
) -> Option<Value> {
    incoming
        .iter()
        .filter_map(|edge| results.get(&edge.source))
        .filter_map(|result| lookup_in(result, path))
        .last()
        .cloned()
}

/// Substitute every upstream reference in `params`.
///
/// Literals pass through untouched; references that resolve nowhere are
/// dropped from the returned map.
pub fn resolve_upstream_params(
    params: &Map<String, Value>,
    incoming: &[&Edge],
    results: &HashMap<String, Value>,
) -> Map<String, Value> {
    let mut resolved = Map::new();
    for (key, raw) in params {
        let value = match ParamValue::parse(raw) {
            ParamValue::Literal(v) => Some(v),
            ParamValue::UpstreamRef(path) => resolve_upstream_ref(&path, incoming, results),
        };
        if let Some(v) = value {
            resolved.insert(key.clone(), v);
        }
    }
    resolved
}
