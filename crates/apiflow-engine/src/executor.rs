use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use apiflow_core::error::{FlowError, Result};
use apiflow_core::flow::Flow;
use apiflow_core::traits::Transport;
use apiflow_core::types::{
    value_to_text, ErrorInfo, Node, NodeKind, NodeResult, OutboundRequest, RequestBody,
};

use crate::node_config::{parse_config, GraphqlNodeConfig, HttpNodeConfig, SourceNodeConfig};
use crate::template::{resolve_template, resolve_template_map, resolve_template_value};
use crate::upstream::{resolve_upstream_params, ParamValue};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What a node can see while it executes.
pub struct ExecutionContext<'a> {
    /// The graph, used for incoming edges and template snapshots.
    pub flow: &'a Flow,
    /// `data` of every node that already completed in this run.
    pub results: &'a HashMap<String, Value>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(flow: &'a Flow, results: &'a HashMap<String, Value>) -> Self {
        Self { flow, results }
    }

    fn lookup(&self) -> impl Fn(&str) -> Option<Value> + 'a {
        let flow = self.flow;
        move |id: &str| flow.snapshot(id)
    }
}

/// Executes a single node and normalizes whatever happens into a `NodeResult`.
///
/// The executor never touches shared state; storing the result is up to the caller.
pub struct NodeExecutor {
    transport: Arc<dyn Transport>,
    default_timeout: Duration,
}

impl NodeExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the timeout used by nodes without their own `timeoutSecs`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run `node`. Failures come back as an error result, never as `Err`.
    pub async fn execute(&self, node: &Node, ctx: &ExecutionContext<'_>) -> NodeResult {
        match self.try_execute(node, ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!(node_id = %node.id, error = %e, "Node execution failed");
                NodeResult::failure(ErrorInfo::from(&e))
            }
        }
    }

    async fn try_execute(&self, node: &Node, ctx: &ExecutionContext<'_>) -> Result<NodeResult> {
        match node.kind {
            NodeKind::Source => {
                let config: SourceNodeConfig = parse_config(node).unwrap_or_default();
                Ok(NodeResult::success(200, config.data()))
            }
            NodeKind::Http => {
                let request = self.build_http_request(node, ctx)?;
                self.dispatch(&node.id, request).await
            }
            NodeKind::Graphql => {
                let request = self.build_graphql_request(node, ctx)?;
                self.dispatch(&node.id, request).await
            }
            NodeKind::Unknown(ref kind) => Err(FlowError::UnknownNodeKind {
                node: node.id.clone(),
                kind: kind.clone(),
            }),
        }
    }

    async fn dispatch(&self, node_id: &str, request: OutboundRequest) -> Result<NodeResult> {
        debug!(
            node_id = %node_id,
            method = %request.method,
            url = %request.url,
            "Dispatching request"
        );
        let response = self.transport.send(request).await?;
        Ok(NodeResult::from_response(response))
    }

    /// Resolve an `http` node's configuration into a concrete request.
    ///
    /// Query params go through upstream resolution; URL, headers, literal
    /// params and body go through template resolution.
    pub fn build_http_request(
        &self,
        node: &Node,
        ctx: &ExecutionContext<'_>,
    ) -> Result<OutboundRequest> {
        let config: HttpNodeConfig = parse_config(node)?;
        let lookup = ctx.lookup();
        let invalid = |message: &str| FlowError::InvalidConfig {
            node: node.id.clone(),
            message: message.to_string(),
        };

        let method = config.method.trim().to_uppercase();
        if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid(&format!("invalid HTTP method '{}'", config.method)));
        }

        let url = resolve_template(config.url.trim(), &lookup);
        if url.trim().is_empty() {
            return Err(invalid("URL is required"));
        }

        let incoming = ctx.flow.incoming(&node.id);
        let mut query = resolve_upstream_params(&config.query_params, &incoming, ctx.results);
        // Only literals are templated; upstream values are sent as received.
        for (key, raw) in &config.query_params {
            if let ParamValue::Literal(_) = ParamValue::parse(raw) {
                if let Some(value) = query.get_mut(key) {
                    *value = resolve_template_value(value, &lookup);
                }
            }
        }

        let body = if method == "GET" {
            RequestBody::None
        } else if !config.form_data.is_empty() {
            RequestBody::Form(resolve_template_map(&config.form_data, &lookup))
        } else {
            match config.body {
                Value::Null => RequestBody::None,
                Value::String(ref s) if s.trim().is_empty() => RequestBody::None,
                Value::String(ref s) => {
                    let resolved = resolve_template(s, &lookup);
                    match serde_json::from_str::<Value>(&resolved) {
                        Ok(json) => RequestBody::Json(json),
                        Err(_) => RequestBody::Text(resolved),
                    }
                }
                ref other => RequestBody::Json(resolve_template_value(other, &lookup)),
            }
        };

        Ok(OutboundRequest {
            method,
            url,
            headers: text_map(&resolve_template_map(&config.headers, &lookup)),
            query,
            body,
            timeout: self.timeout_for(config.timeout_secs),
        })
    }

    /// Resolve a `graphql` node into a single JSON POST of `{query, variables}`.
    pub fn build_graphql_request(
        &self,
        node: &Node,
        ctx: &ExecutionContext<'_>,
    ) -> Result<OutboundRequest> {
        let config: GraphqlNodeConfig = parse_config(node)?;
        let lookup = ctx.lookup();
        let invalid = |message: &str| FlowError::InvalidConfig {
            node: node.id.clone(),
            message: message.to_string(),
        };

        let endpoint = resolve_template(config.endpoint.trim(), &lookup);
        if endpoint.is_empty() {
            return Err(invalid("GraphQL endpoint is required"));
        }
        let query = resolve_template(&config.query, &lookup);
        if query.trim().is_empty() {
            return Err(invalid("GraphQL query is required"));
        }

        let variables = match config.variables {
            Value::Null => Value::Object(Map::new()),
            Value::String(ref s) if s.trim().is_empty() => Value::Object(Map::new()),
            Value::String(ref s) => {
                let resolved = resolve_template(s, &lookup);
                serde_json::from_str(&resolved).unwrap_or_else(|e| {
                    warn!(node_id = %node.id, error = %e, "Invalid GraphQL variables, sending {{}}");
                    Value::Object(Map::new())
                })
            }
            ref other => resolve_template_value(other, &lookup),
        };

        let mut headers = text_map(&resolve_template_map(&config.headers, &lookup));
        headers
            .entry("Content-Type".to_string())
            .or_insert_with(|| "application/json".to_string());

        Ok(OutboundRequest {
            method: "POST".into(),
            url: endpoint,
            headers,
            query: Map::new(),
            body: RequestBody::Json(serde_json::json!({
                "query": query,
                "variables": variables,
            })),
            timeout: self.timeout_for(config.timeout_secs),
        })
    }

    fn timeout_for(&self, secs: Option<u64>) -> Duration {
        secs.map(Duration::from_secs).unwrap_or(self.default_timeout)
    }
}

fn text_map(map: &Map<String, Value>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.clone(), value_to_text(v)))
        .collect()
}
