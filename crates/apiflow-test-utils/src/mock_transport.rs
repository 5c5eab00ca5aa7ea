use std::collections::BTreeMap;
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde_json::Value;

use apiflow_core::error::{FlowError, Result};
use apiflow_core::traits::Transport;
use apiflow_core::types::{OutboundRequest, TransportResponse};

/// Canned behaviour for requests whose URL starts with a given prefix.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with a status and JSON body.
    Respond { status: u16, body: Value },
    /// Fail as if no response was received.
    Fail { message: String },
    /// Never complete (for cancellation tests).
    Hang,
}

/// Scripted `Transport` that records every request it sees.
///
/// Routes are matched by longest URL prefix. Unmatched URLs fail with a
/// network error, like an unreachable host.
#[derive(Default)]
pub struct MockTransport {
    routes: Vec<(String, MockReply)>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, prefix: impl Into<String>, status: u16, body: Value) -> Self {
        self.routes
            .push((prefix.into(), MockReply::Respond { status, body }));
        self
    }

    pub fn fail(mut self, prefix: impl Into<String>, message: impl Into<String>) -> Self {
        self.routes.push((
            prefix.into(),
            MockReply::Fail {
                message: message.into(),
            },
        ));
        self
    }

    pub fn hang(mut self, prefix: impl Into<String>) -> Self {
        self.routes.push((prefix.into(), MockReply::Hang));
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }

    /// URLs requested so far, in order.
    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    fn route(&self, url: &str) -> Option<&MockReply> {
        self.routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, reply)| reply)
    }
}

impl Transport for MockTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<TransportResponse>> {
        let url = request.url.clone();
        let reply = self.route(&url).cloned();
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request);

        Box::pin(async move {
            match reply {
                Some(MockReply::Respond { status, body }) => {
                    let mut headers = BTreeMap::new();
                    headers.insert("content-type".to_string(), "application/json".to_string());
                    Ok(TransportResponse {
                        status,
                        status_text: None,
                        headers,
                        body,
                    })
                }
                Some(MockReply::Fail { message }) => Err(FlowError::Network { url, message }),
                Some(MockReply::Hang) => futures::future::pending().await,
                None => Err(FlowError::Network {
                    url,
                    message: "no mock route".into(),
                }),
            }
        })
    }
}
