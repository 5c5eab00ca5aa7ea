//! `{{nodeId.path}}` placeholder substitution.
//!
//! Resolution is best effort: a placeholder naming an unknown node, a missing
//! path, or a `null` value stays in the output verbatim so the user can see
//! which interpolation did not resolve.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use apiflow_core::types::value_to_text;

use crate::path::resolve_path;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder regex is valid"))
}

/// Replace every `{{nodeId.path}}` in `text` using `lookup` to fetch node snapshots.
pub fn resolve_template<F>(text: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<Value>,
{
    if !text.contains("{{") {
        return text.to_string();
    }

    placeholder_re()
        .replace_all(text, |caps: &Captures| {
            let inner = caps[1].trim();
            let (node_id, path) = inner.split_once('.').unwrap_or((inner, ""));
            let resolved = lookup(node_id).and_then(|snapshot| {
                resolve_path(&snapshot, path)
                    .filter(|v| !v.is_null())
                    .map(value_to_text)
            });
            resolved.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Apply [`resolve_template`] to every string inside `value`, recursing into
/// objects and arrays. Non-string leaves are copied unchanged.
pub fn resolve_template_value<F>(value: &Value, lookup: &F) -> Value
where
    F: Fn(&str) -> Option<Value>,
{
    match value {
        Value::String(s) => Value::String(resolve_template(s, lookup)),
        Value::Object(map) => Value::Object(resolve_template_map(map, lookup)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_template_value(item, lookup))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Object form of [`resolve_template_value`].
pub fn resolve_template_map<F>(map: &Map<String, Value>, lookup: &F) -> Map<String, Value>
where
    F: Fn(&str) -> Option<Value>,
{
    map.iter()
        .map(|(k, v)| (k.clone(), resolve_template_value(v, lookup)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry(id: &str) -> Option<Value> {
        match id {
            "start-node" => Some(json!({ "fields": { "city": "Paris", "days": 3 } })),
            "http1" => Some(json!({
                "response": { "status": 200, "data": { "id": 42, "tags": ["a", "b"] } }
            })),
            _ => None,
        }
    }

    #[test]
    fn test_substitutes_scalars() {
        let out = resolve_template(
            "https://api.example.com/{{start-node.fields.city}}?d={{ start-node.fields.days }}",
            &registry,
        );
        assert_eq!(out, "https://api.example.com/Paris?d=3");
    }

    #[test]
    fn test_serializes_arrays_and_objects() {
        let out = resolve_template("{{http1.response.data.tags}}", &registry);
        assert_eq!(out, r#"["a","b"]"#);
        let out = resolve_template("{{http1.response.data}}", &registry);
        assert_eq!(out, r#"{"id":42,"tags":["a","b"]}"#);
    }

    #[test]
    fn test_unresolved_placeholders_stay() {
        let text = "{{ghost.value}} and {{http1.response.data.missing}}";
        assert_eq!(resolve_template(text, &registry), text);
    }

    #[test]
    fn test_repeated_placeholder() {
        let out = resolve_template(
            "{{start-node.fields.city}}/{{start-node.fields.city}}",
            &registry,
        );
        assert_eq!(out, "Paris/Paris");
    }

    #[test]
    fn test_idempotent_on_plain_text() {
        let text = "no placeholders here {single} braces";
        let once = resolve_template(text, &registry);
        let twice = resolve_template(&once, &registry);
        assert_eq!(once, text);
        assert_eq!(twice, text);
    }

    #[test]
    fn test_value_recursion_leaves_non_strings() {
        let input = json!({
            "Authorization": "Bearer {{http1.response.data.id}}",
            "retries": 3,
            "nested": { "city": "{{start-node.fields.city}}" },
            "list": ["{{start-node.fields.days}}", false]
        });
        let out = resolve_template_value(&input, &registry);
        assert_eq!(
            out,
            json!({
                "Authorization": "Bearer 42",
                "retries": 3,
                "nested": { "city": "Paris" },
                "list": ["3", false]
            })
        );
        // input untouched
        assert_eq!(input["nested"]["city"], json!("{{start-node.fields.city}}"));
    }
}
