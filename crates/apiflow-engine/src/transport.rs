use std::collections::BTreeMap;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::debug;

use apiflow_core::config::HttpClientConfig;
use apiflow_core::error::{FlowError, Result};
use apiflow_core::traits::Transport;
use apiflow_core::types::{value_to_text, OutboundRequest, RequestBody, TransportResponse};

/// `Transport` backed by a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FlowError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

/// Flatten params into `key=value` pairs; arrays repeat the key.
fn pairs(map: &Map<String, Value>) -> Vec<(String, String)> {
    let mut out = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Array(items) => {
                out.extend(items.iter().map(|item| (key.clone(), value_to_text(item))));
            }
            other => out.push((key.clone(), value_to_text(other))),
        }
    }
    out
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        let ct = ct.to_ascii_lowercase();
        ct.contains("application/json") || ct.contains("+json")
    })
}

impl Transport for ReqwestTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<TransportResponse>> {
        Box::pin(async move {
            let url = request.url.clone();
            let network = |e: reqwest::Error| {
                let message = if e.is_timeout() {
                    format!("timed out after {}s", request.timeout.as_secs_f64())
                } else {
                    e.to_string()
                };
                FlowError::Network {
                    url: url.clone(),
                    message,
                }
            };

            let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
                FlowError::Config(format!("Invalid HTTP method '{}'", request.method))
            })?;

            let mut req = self
                .client
                .request(method, &request.url)
                .timeout(request.timeout);
            for (k, v) in &request.headers {
                req = req.header(k.as_str(), v.as_str());
            }
            if !request.query.is_empty() {
                req = req.query(&pairs(&request.query));
            }
            req = match request.body {
                RequestBody::None => req,
                RequestBody::Json(ref body) => req.json(body),
                RequestBody::Text(ref body) => req.body(body.clone()),
                RequestBody::Form(ref form) => req.form(&pairs(form)),
            };

            let resp = req.send().await.map_err(network)?;
            let status = resp.status();
            let headers: BTreeMap<String, String> = resp
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("?").to_string()))
                .collect();
            let json = is_json(headers.get("content-type").map(String::as_str));

            let text = resp.text().await.map_err(network)?;
            let body = if json {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            } else {
                Value::String(text)
            };

            debug!(url = %url, status = status.as_u16(), "Response received");

            Ok(TransportResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().map(str::to_string),
                headers,
                body,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pairs_repeat_arrays() {
        let map = json!({ "id": [1, 2], "q": "rust", "n": 3 });
        let out = pairs(map.as_object().unwrap());
        assert_eq!(
            out,
            vec![
                ("id".to_string(), "1".to_string()),
                ("id".to_string(), "2".to_string()),
                ("n".to_string(), "3".to_string()),
                ("q".to_string(), "rust".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_method_is_config_error() {
        let transport = ReqwestTransport::new(&HttpClientConfig::default()).unwrap();
        let request = OutboundRequest {
            method: "GE T".into(),
            url: "http://127.0.0.1:9/".into(),
            headers: BTreeMap::new(),
            query: Map::new(),
            body: RequestBody::None,
            timeout: std::time::Duration::from_secs(1),
        };

        match transport.send(request).await {
            Err(FlowError::Config(msg)) => assert!(msg.contains("GE T")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_is_json() {
        assert!(is_json(Some("application/json; charset=utf-8")));
        assert!(is_json(Some("application/problem+json")));
        assert!(!is_json(Some("text/html")));
        assert!(!is_json(None));
    }
}
