use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FlowError;

/// What a node does when executed.
///
/// Editor exports use names like `startNode` or `httpNode`; those are accepted
/// on input and normalized. Anything unrecognized is kept as `Unknown` so the
/// executor can reject it at run time instead of failing the whole import.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Source,
    Http,
    Graphql,
    Unknown(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Source => "source",
            NodeKind::Http => "http",
            NodeKind::Graphql => "graphql",
            NodeKind::Unknown(kind) => kind,
        }
    }

    /// Whether the executor knows how to run this kind.
    pub fn is_known(&self) -> bool {
        !matches!(self, NodeKind::Unknown(_))
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "source" | "start" | "startNode" | "start-node" => NodeKind::Source,
            "http" | "httpNode" => NodeKind::Http,
            "graphql" | "graphqlNode" => NodeKind::Graphql,
            _ => NodeKind::Unknown(s),
        }
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work in the flow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier for this node.
    pub id: String,
    /// Node kind. `type` is accepted for editor exports.
    #[serde(alias = "type")]
    pub kind: NodeKind,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Kind-specific configuration (URL, headers, query, fields, ...).
    #[serde(default, alias = "data")]
    pub config: Map<String, Value>,
    /// Result of this node's most recent execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<NodeResult>,
}

impl Node {
    /// Create a node with an empty configuration.
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            config: Map::new(),
            last_result: None,
        }
    }

    /// A source node echoing the given static fields.
    pub fn source(id: impl Into<String>, fields: Value) -> Self {
        Self::new(id, NodeKind::Source).with_field("fields", fields)
    }

    /// An HTTP node issuing a GET against `url`.
    pub fn http(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Http)
            .with_field("method", Value::String("GET".into()))
            .with_field("url", Value::String(url.into()))
    }

    /// A GraphQL node posting `query` to `endpoint`.
    pub fn graphql(
        id: impl Into<String>,
        endpoint: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self::new(id, NodeKind::Graphql)
            .with_field("endpoint", Value::String(endpoint.into()))
            .with_field("query", Value::String(query.into()))
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set a single configuration field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Point-in-time view used by template placeholders.
    ///
    /// Contains the node's configuration fields plus `id`, `kind`, `label`,
    /// and `response` (the last result) when present.
    pub fn snapshot(&self) -> Value {
        let mut map = self.config.clone();
        map.insert("id".into(), Value::String(self.id.clone()));
        map.insert("kind".into(), Value::String(self.kind.to_string()));
        if let Some(ref label) = self.label {
            map.insert("label".into(), Value::String(label.clone()));
        }
        if let Some(ref result) = self.last_result {
            map.insert(
                "response".into(),
                serde_json::to_value(result).unwrap_or(Value::Null),
            );
        }
        Value::Object(map)
    }
}

/// A directed "target depends on source" relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Classification carried by an error result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    UnknownNodeKind,
    InvalidConfig,
    Cancelled,
    #[default]
    Other,
}

/// Error attached to a node result or status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(default)]
    pub kind: ErrorKind,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl From<&FlowError> for ErrorInfo {
    fn from(err: &FlowError) -> Self {
        let kind = match err {
            FlowError::Network { .. } => ErrorKind::Network,
            FlowError::UnknownNodeKind { .. } => ErrorKind::UnknownNodeKind,
            FlowError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            FlowError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

/// Normalized outcome of executing one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    /// HTTP status, `200` for source nodes, `0` when no response was received.
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

impl NodeResult {
    pub fn success(status: u16, data: Value) -> Self {
        Self {
            status,
            status_text: None,
            data,
            headers: None,
            error: None,
        }
    }

    pub fn failure(error: ErrorInfo) -> Self {
        Self {
            status: 0,
            status_text: None,
            data: Value::Null,
            headers: None,
            error: Some(error),
        }
    }

    pub fn from_response(response: TransportResponse) -> Self {
        Self {
            status: response.status,
            status_text: response.status_text,
            data: response.body,
            headers: Some(response.headers),
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the remote side answered with a 2xx status.
    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Status update delivered to the UI for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub is_loading: bool,
    pub response: Option<NodeResult>,
    pub error: Option<ErrorInfo>,
}

impl NodeStatus {
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            response: None,
            error: None,
        }
    }

    /// Settled status: error results carry only the error, successes only the response.
    pub fn settled(result: &NodeResult) -> Self {
        match result.error {
            Some(ref error) => Self::failed(error.clone()),
            None => Self {
                is_loading: false,
                response: Some(result.clone()),
                error: None,
            },
        }
    }

    pub fn failed(error: ErrorInfo) -> Self {
        Self {
            is_loading: false,
            response: None,
            error: Some(error),
        }
    }
}

/// Body of an outbound request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    None,
    Json(Value),
    Text(String),
    Form(Map<String, Value>),
}

/// A fully resolved request ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Query parameters; omitted parameters are simply absent.
    pub query: Map<String, Value>,
    pub body: RequestBody,
    pub timeout: Duration,
}

/// What came back from the remote endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON for JSON content types, otherwise `Value::String` of the raw text.
    pub body: Value,
}

/// Render a JSON value as text for query strings, headers and templates.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
