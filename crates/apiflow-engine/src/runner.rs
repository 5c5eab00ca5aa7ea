use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use apiflow_core::error::{FlowError, Result};
use apiflow_core::event::{EventBus, FlowEvent};
use apiflow_core::flow::Flow;
use apiflow_core::types::{ErrorInfo, NodeResult, NodeStatus};

use crate::executor::{ExecutionContext, NodeExecutor};
use crate::topo::topological_order;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every node in the order executed.
    Succeeded,
    /// A node produced an error result; later nodes never ran.
    Failed { node_id: String, error: ErrorInfo },
    /// The cancellation token fired. `node_id` is the node that was in flight, if any.
    Cancelled { node_id: Option<String> },
}

/// Everything a run produced. Runs are not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Full execution order computed for this run.
    pub order: Vec<String>,
    /// Node ids that actually executed, in order (including a failed one).
    pub executed: Vec<String>,
    /// `data` of each node that completed without error.
    pub results: HashMap<String, Value>,
    pub outcome: RunOutcome,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded)
    }
}

/// Drives a flow through its nodes in dependency order.
///
/// Nodes run strictly one at a time. Each node is marked loading, executed,
/// and its full result written back before the next one starts. The first
/// error result stops the run; nodes after it keep whatever state they had.
pub struct FlowRunner {
    executor: NodeExecutor,
    events: Arc<EventBus>,
    cancel: Option<CancellationToken>,
}

impl FlowRunner {
    pub fn new(executor: NodeExecutor, events: Arc<EventBus>) -> Self {
        Self {
            executor,
            events,
            cancel: None,
        }
    }

    /// Abort the run (including an in-flight request) when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Execute every node of `flow`.
    ///
    /// Returns `Err` only when the run cannot start (cycle, dangling edge);
    /// node failures are reported through `RunReport::outcome`.
    pub async fn run_all(&self, flow: &mut Flow) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        let order = match topological_order(&flow.nodes, &flow.edges) {
            Ok(order) => order,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Flow rejected");
                self.events.publish(FlowEvent::RunFailed {
                    run_id,
                    node_id: None,
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        info!(run_id = %run_id, nodes = order.len(), "Starting flow run");
        self.events.publish(FlowEvent::RunStarted {
            run_id: run_id.clone(),
            order: order.clone(),
        });

        let mut results: HashMap<String, Value> = HashMap::new();
        let mut executed = Vec::new();
        let mut outcome = RunOutcome::Succeeded;

        for node_id in &order {
            if self.is_cancelled() {
                outcome = RunOutcome::Cancelled { node_id: None };
                break;
            }

            flow.set_result(node_id, None)?;
            self.publish_status(node_id, NodeStatus::loading());
            executed.push(node_id.clone());

            let node_start = Instant::now();
            let result = match self.execute_one(flow, node_id, &results).await? {
                Some(result) => result,
                None => {
                    warn!(node_id = %node_id, "Run cancelled while node was executing");
                    let error = ErrorInfo::from(&FlowError::Cancelled);
                    self.publish_status(node_id, NodeStatus::failed(error));
                    outcome = RunOutcome::Cancelled {
                        node_id: Some(node_id.clone()),
                    };
                    break;
                }
            };

            debug!(
                node_id = %node_id,
                status = result.status,
                elapsed_ms = node_start.elapsed().as_millis() as u64,
                "Node execution complete"
            );

            let failure = result.error.clone();
            if failure.is_none() {
                results.insert(node_id.clone(), result.data.clone());
            }
            let status = NodeStatus::settled(&result);
            flow.set_result(node_id, Some(result))?;
            self.publish_status(node_id, status);

            if let Some(error) = failure {
                error!(node_id = %node_id, error = %error.message, "Node failed, halting run");
                outcome = RunOutcome::Failed {
                    node_id: node_id.clone(),
                    error,
                };
                break;
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match outcome {
            RunOutcome::Succeeded => {
                info!(run_id = %run_id, elapsed_ms, "Flow run complete");
                self.events.publish(FlowEvent::RunFinished {
                    run_id: run_id.clone(),
                    executed: executed.len(),
                });
            }
            RunOutcome::Failed {
                ref node_id,
                ref error,
            } => {
                self.events.publish(FlowEvent::RunFailed {
                    run_id: run_id.clone(),
                    node_id: Some(node_id.clone()),
                    error: error.message.clone(),
                });
            }
            RunOutcome::Cancelled { ref node_id } => {
                self.events.publish(FlowEvent::RunFailed {
                    run_id: run_id.clone(),
                    node_id: node_id.clone(),
                    error: FlowError::Cancelled.to_string(),
                });
            }
        }

        Ok(RunReport {
            run_id,
            started_at,
            order,
            executed,
            results,
            outcome,
            elapsed_ms,
        })
    }

    /// Execute a single node on demand.
    ///
    /// Upstream values come from the current `lastResult` of the node's
    /// sources rather than from a run in progress.
    pub async fn run_node(&self, flow: &mut Flow, node_id: &str) -> Result<NodeResult> {
        if flow.node(node_id).is_none() {
            return Err(FlowError::NodeNotFound(node_id.to_string()));
        }

        let results: HashMap<String, Value> = flow
            .incoming(node_id)
            .into_iter()
            .filter_map(|edge| {
                let source = flow.node(&edge.source)?;
                let result = source.last_result.as_ref().filter(|r| !r.is_error())?;
                Some((source.id.clone(), result.data.clone()))
            })
            .collect();

        flow.set_result(node_id, None)?;
        self.publish_status(node_id, NodeStatus::loading());

        let result = match self.execute_one(flow, node_id, &results).await? {
            Some(result) => result,
            None => {
                let error = ErrorInfo::from(&FlowError::Cancelled);
                self.publish_status(node_id, NodeStatus::failed(error));
                return Err(FlowError::Cancelled);
            }
        };

        let status = NodeStatus::settled(&result);
        flow.set_result(node_id, Some(result.clone()))?;
        self.publish_status(node_id, status);
        Ok(result)
    }

    /// Execute one node against a read-only view of the flow.
    /// `None` means the cancellation token fired first.
    async fn execute_one(
        &self,
        flow: &Flow,
        node_id: &str,
        results: &HashMap<String, Value>,
    ) -> Result<Option<NodeResult>> {
        let node = flow
            .node(node_id)
            .ok_or_else(|| FlowError::NodeNotFound(node_id.to_string()))?;
        let ctx = ExecutionContext::new(flow, results);
        let execution = self.executor.execute(node, &ctx);

        Ok(match self.cancel {
            Some(ref token) => tokio::select! {
                result = execution => Some(result),
                _ = token.cancelled() => None,
            },
            None => Some(execution.await),
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    fn publish_status(&self, node_id: &str, status: NodeStatus) {
        self.events.publish(FlowEvent::NodeStatus {
            node_id: node_id.to_string(),
            status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiflow_core::types::{Edge, Node};
    use apiflow_test_utils::MockTransport;
    use serde_json::json;

    fn runner(transport: MockTransport) -> FlowRunner {
        FlowRunner::new(
            NodeExecutor::new(Arc::new(transport)),
            Arc::new(EventBus::default()),
        )
    }

    #[tokio::test]
    async fn test_results_hold_data_not_envelope() {
        let transport = MockTransport::new().respond("https://api", 200, json!({ "id": 42 }));
        let mut flow = Flow::new(
            vec![
                Node::source("start-node", json!({ "city": "Paris" })),
                Node::http("h", "https://api/x"),
            ],
            vec![Edge::new("e", "start-node", "h")],
        );

        let report = runner(transport).run_all(&mut flow).await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.executed, vec!["start-node", "h"]);
        assert_eq!(report.results["h"], json!({ "id": 42 }));
        assert_eq!(report.results["start-node"], json!({ "city": "Paris" }));
        assert_eq!(flow.node("h").unwrap().last_result.as_ref().unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let mut flow = Flow::new(vec![Node::source("s", json!({}))], vec![]);

        let report = runner(MockTransport::new())
            .with_cancellation(token)
            .run_all(&mut flow)
            .await
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled { node_id: None });
        assert!(report.executed.is_empty());
        assert!(flow.node("s").unwrap().last_result.is_none());
    }

    #[tokio::test]
    async fn test_run_node_uses_previous_results() {
        let transport = Arc::new(MockTransport::new().respond("https://api", 200, json!({})));
        let runner = FlowRunner::new(
            NodeExecutor::new(transport.clone()),
            Arc::new(EventBus::default()),
        );
        let mut upstream = Node::http("a", "https://api/a");
        upstream.last_result = Some(NodeResult::success(200, json!({ "id": 7 })));
        let downstream = Node::http("b", "https://api/b")
            .with_field("queryParams", json!({ "ref": "upstream.id" }));
        let mut flow = Flow::new(vec![upstream, downstream], vec![Edge::new("e", "a", "b")]);

        let result = runner.run_node(&mut flow, "b").await.unwrap();
        assert_eq!(result.status, 200);
        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].query["ref"], json!(7));
        assert!(flow.node("b").unwrap().last_result.is_some());

        assert!(matches!(
            runner.run_node(&mut flow, "nope").await,
            Err(FlowError::NodeNotFound(_))
        ));
    }
}
