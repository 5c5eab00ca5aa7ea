use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    // Graph errors
    #[error("Cycle detected in flow among nodes: {}", nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },

    #[error("Edge {edge} references unknown node '{node}'")]
    DanglingEdge { edge: String, node: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid flow document: {0}")]
    InvalidFlow(String),

    // Node execution errors
    #[error("Unknown node kind '{kind}' for node {node}")]
    UnknownNodeKind { node: String, kind: String },

    #[error("Invalid configuration for node {node}: {message}")]
    InvalidConfig { node: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Run cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
