use serde::{Deserialize, Serialize};

use crate::types::NodeStatus;

/// Progress of a run, as seen by the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// Execution order computed, nodes about to run.
    RunStarted { run_id: String, order: Vec<String> },
    /// A node changed state (loading, then settled).
    NodeStatus { node_id: String, status: NodeStatus },
    /// Every node in the order executed without error.
    RunFinished { run_id: String, executed: usize },
    /// The run was rejected or halted. `node_id` is `None` for graph-level errors.
    RunFailed {
        run_id: String,
        node_id: Option<String>,
        error: String,
    },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<FlowEvent>,
}

impl EventBus {
    /// Capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: FlowEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<FlowEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
