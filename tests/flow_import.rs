use serde_json::json;

use apiflow_core::flow::Flow;
use apiflow_core::types::NodeKind;
use apiflow_engine::topological_order;

/// Export produced by the visual editor: `type`/`data`, positions, UI flags.
const EDITOR_EXPORT: &str = r#"{
  "nodes": [
    {
      "id": "start-node",
      "type": "startNode",
      "position": { "x": 100, "y": 100 },
      "data": { "label": "Start", "type": "start", "fields": { "city": "Paris" } }
    },
    {
      "id": "http-1a2b3c4d",
      "type": "httpNode",
      "position": { "x": 400, "y": 100 },
      "data": {
        "label": "HTTP Request",
        "method": "GET",
        "url": "https://api.example.com/{{start-node.fields.city}}",
        "headers": {},
        "queryParams": "{\"units\": \"metric\"}",
        "body": "",
        "isLoading": false,
        "response": { "id": 99, "stale": true },
        "error": null
      }
    },
    {
      "id": "graph-9",
      "type": "graphNode",
      "position": { "x": 700, "y": 100 },
      "data": {}
    }
  ],
  "edges": [
    { "id": "edge-start-node-http-1a2b3c4d-1", "source": "start-node", "target": "http-1a2b3c4d", "animated": false },
    { "id": "edge-http-graph", "source": "http-1a2b3c4d", "target": "graph-9" }
  ]
}"#;

#[test]
fn test_import_editor_export() {
    let flow = Flow::from_json(EDITOR_EXPORT).expect("import");

    assert_eq!(flow.nodes.len(), 3);
    assert_eq!(flow.nodes[0].kind, NodeKind::Source);
    assert_eq!(flow.nodes[1].kind, NodeKind::Http);
    assert_eq!(flow.nodes[2].kind, NodeKind::Unknown("graphNode".into()));
    assert_eq!(flow.nodes[0].config["fields"]["city"], json!("Paris"));

    let order = topological_order(&flow.nodes, &flow.edges).unwrap();
    assert_eq!(order, vec!["start-node", "http-1a2b3c4d", "graph-9"]);
}

#[test]
fn test_export_round_trips_kind_names() {
    let flow = Flow::from_json(EDITOR_EXPORT).expect("import");
    let exported: serde_json::Value =
        serde_json::from_str(&flow.to_json_pretty().unwrap()).unwrap();

    assert_eq!(exported["nodes"][0]["kind"], json!("source"));
    assert_eq!(exported["nodes"][2]["kind"], json!("graphNode"));
    assert!(exported["nodes"][0].get("lastResult").is_none());
    assert!(exported["nodes"][1]["config"].get("isLoading").is_none());
}

#[test]
fn test_import_drops_stale_editor_response() {
    let flow = Flow::from_json(EDITOR_EXPORT).expect("import");
    let http = flow.node("http-1a2b3c4d").unwrap();

    for key in ["response", "isLoading", "error"] {
        assert!(http.config.get(key).is_none(), "{} kept in config", key);
    }
    assert!(http.last_result.is_none());
    let snapshot = flow.snapshot("http-1a2b3c4d").unwrap();
    assert!(snapshot.get("response").is_none());
    assert_eq!(snapshot["method"], json!("GET"));
}
