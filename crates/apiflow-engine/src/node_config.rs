//! Typed views over a node's free-form `config` map.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

use apiflow_core::error::{FlowError, Result};
use apiflow_core::types::Node;

/// Configuration of an `http` node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpNodeConfig {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "object_or_json")]
    pub headers: Map<String, Value>,
    #[serde(default, alias = "query_params", deserialize_with = "object_or_json")]
    pub query_params: Map<String, Value>,
    #[serde(default)]
    pub body: Value,
    #[serde(default, alias = "form_data", deserialize_with = "object_or_json")]
    pub form_data: Map<String, Value>,
    #[serde(default, alias = "timeout_secs")]
    pub timeout_secs: Option<u64>,
}

fn default_method() -> String {
    "GET".into()
}

/// Configuration of a `graphql` node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlNodeConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub query: String,
    /// Object, or a JSON string that may contain placeholders.
    #[serde(default)]
    pub variables: Value,
    #[serde(default, deserialize_with = "object_or_json")]
    pub headers: Map<String, Value>,
    #[serde(default, alias = "timeout_secs")]
    pub timeout_secs: Option<u64>,
}

/// Configuration of a `source` node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceNodeConfig {
    #[serde(default)]
    pub fields: Value,
}

impl SourceNodeConfig {
    /// The static data this node echoes; missing fields echo an empty map.
    pub fn data(&self) -> Value {
        match self.fields {
            Value::Null => Value::Object(Map::new()),
            ref fields => fields.clone(),
        }
    }
}

/// Parse a node's config into one of the typed views.
pub fn parse_config<T>(node: &Node) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(Value::Object(node.config.clone())).map_err(|e| {
        FlowError::InvalidConfig {
            node: node.id.clone(),
            message: e.to_string(),
        }
    })
}

/// Accept either a JSON object or a string holding a JSON object.
///
/// Editors often store headers and query params as raw text. Unparseable
/// text is treated as empty rather than failing the whole node.
fn object_or_json<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::Object(map) => map,
        Value::String(s) if s.trim().is_empty() => Map::new(),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!(raw = %s, "Ignoring config value that is not a JSON object");
                Map::new()
            }
        },
        _ => Map::new(),
    })
}
