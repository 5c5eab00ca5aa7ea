use serde_json::json;

use apiflow_core::flow::{Flow, START_NODE_ID};
use apiflow_core::types::{Edge, Node};

/// Edge with a readable id: `e-<source>-<target>`.
pub fn edge(source: &str, target: &str) -> Edge {
    Edge::new(format!("e-{}-{}", source, target), source, target)
}

/// `start-node → http1 → http2`.
///
/// `http1` calls `https://api.example.com/<city>`; `http2` calls
/// `https://api.example.com/detail` with `ref` read from `http1`'s `id`.
pub fn chain_flow() -> Flow {
    Flow::new(
        vec![
            Node::source(START_NODE_ID, json!({ "city": "Paris" })),
            Node::http("http1", "https://api.example.com/{{start-node.fields.city}}"),
            Node::http("http2", "https://api.example.com/detail")
                .with_field("queryParams", json!({ "ref": "upstream.id" })),
        ],
        vec![edge(START_NODE_ID, "http1"), edge("http1", "http2")],
    )
}

/// `a → b → c → a`.
pub fn cycle_flow() -> Flow {
    Flow::new(
        vec![
            Node::http("a", "https://api.example.com/a"),
            Node::http("b", "https://api.example.com/b"),
            Node::http("c", "https://api.example.com/c"),
        ],
        vec![edge("a", "b"), edge("b", "c"), edge("c", "a")],
    )
}
