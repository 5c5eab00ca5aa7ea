//! Flow Execution Engine — runs a graph of request nodes in dependency order.
//!
//! A flow is a set of `Node`s connected by `Edge`s meaning "target depends on
//! source". The `FlowRunner` orders the graph with Kahn's algorithm, then
//! executes each node through the `NodeExecutor`, passing data downstream via
//! `upstream.<path>` parameters and `{{nodeId.path}}` placeholders.

pub mod executor;
pub mod node_config;
pub mod path;
pub mod runner;
pub mod template;
pub mod topo;
pub mod transport;
pub mod upstream;

pub use executor::{ExecutionContext, NodeExecutor, DEFAULT_TIMEOUT};
pub use path::resolve_path;
pub use runner::{FlowRunner, RunOutcome, RunReport};
pub use template::{resolve_template, resolve_template_map, resolve_template_value};
pub use topo::topological_order;
pub use transport::ReqwestTransport;
pub use upstream::{resolve_upstream_params, resolve_upstream_ref, ParamValue};
