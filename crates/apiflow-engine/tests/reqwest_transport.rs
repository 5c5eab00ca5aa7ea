use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use apiflow_core::config::HttpClientConfig;
use apiflow_core::event::EventBus;
use apiflow_core::flow::Flow;
use apiflow_core::types::{Edge, ErrorKind, Node};
use apiflow_engine::{FlowRunner, NodeExecutor, ReqwestTransport, RunOutcome};

async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/json", get(|| async { Json(json!({ "id": 42 })) }))
        .route("/text", get(|| async { "plain body" }))
        .route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, Json(json!({ "error": "nope" }))) }),
        )
        .route(
            "/echo",
            get(|Query(q): Query<HashMap<String, String>>| async move { Json(q) }),
        )
        .route(
            "/graphql",
            post(|Json(body): Json<Value>| async move { Json(json!({ "data": { "echo": body } })) }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn runner(timeout: Duration) -> FlowRunner {
    let transport = ReqwestTransport::new(&HttpClientConfig::default()).unwrap();
    FlowRunner::new(
        NodeExecutor::new(Arc::new(transport)).with_timeout(timeout),
        Arc::new(EventBus::default()),
    )
}

#[tokio::test]
async fn test_json_and_text_bodies() {
    let addr = serve().await;
    let mut flow = Flow::new(
        vec![
            Node::http("j", format!("http://{}/json", addr)),
            Node::http("t", format!("http://{}/text", addr)),
        ],
        vec![],
    );

    let report = runner(Duration::from_secs(5)).run_all(&mut flow).await.unwrap();

    assert!(report.succeeded());
    assert_eq!(report.results["j"], json!({ "id": 42 }));
    assert_eq!(report.results["t"], json!("plain body"));
    let j = flow.node("j").unwrap().last_result.clone().unwrap();
    assert_eq!(j.status, 200);
    assert_eq!(j.status_text.as_deref(), Some("OK"));
    assert!(j.headers.unwrap()["content-type"].contains("application/json"));
}

#[tokio::test]
async fn test_non_2xx_passes_through() {
    let addr = serve().await;
    let mut flow = Flow::new(
        vec![Node::http("m", format!("http://{}/missing", addr))],
        vec![],
    );

    let report = runner(Duration::from_secs(5)).run_all(&mut flow).await.unwrap();

    assert!(report.succeeded());
    let result = flow.node("m").unwrap().last_result.clone().unwrap();
    assert_eq!(result.status, 404);
    assert!(result.error.is_none());
    assert_eq!(result.data, json!({ "error": "nope" }));
}

#[tokio::test]
async fn test_upstream_query_reaches_server() {
    let addr = serve().await;
    let mut flow = Flow::new(
        vec![
            Node::http("first", format!("http://{}/json", addr)),
            Node::http("second", format!("http://{}/echo", addr))
                .with_field("queryParams", json!({ "ref": "upstream.id", "units": "metric" })),
        ],
        vec![Edge::new("e", "first", "second")],
    );

    let report = runner(Duration::from_secs(5)).run_all(&mut flow).await.unwrap();

    assert_eq!(report.results["second"], json!({ "ref": "42", "units": "metric" }));
}

#[tokio::test]
async fn test_graphql_posts_query_and_variables() {
    let addr = serve().await;
    let mut flow = Flow::new(
        vec![
            Node::source("start-node", json!({ "code": "FR" })),
            Node::graphql("g", format!("http://{}/graphql", addr), "{ country { name } }")
                .with_field("variables", json!({ "code": "{{start-node.fields.code}}" })),
        ],
        vec![Edge::new("e", "start-node", "g")],
    );

    let report = runner(Duration::from_secs(5)).run_all(&mut flow).await.unwrap();

    assert_eq!(
        report.results["g"],
        json!({
            "data": {
                "echo": { "query": "{ country { name } }", "variables": { "code": "FR" } }
            }
        })
    );
}

#[tokio::test]
async fn test_timeout_is_network_error() {
    let addr = serve().await;
    let mut flow = Flow::new(
        vec![
            Node::http("slow", format!("http://{}/slow", addr)),
            Node::http("after", format!("http://{}/json", addr)),
        ],
        vec![Edge::new("e", "slow", "after")],
    );

    let report = runner(Duration::from_millis(200))
        .run_all(&mut flow)
        .await
        .unwrap();

    match report.outcome {
        RunOutcome::Failed { node_id, error } => {
            assert_eq!(node_id, "slow");
            assert_eq!(error.kind, ErrorKind::Network);
            assert!(error.message.contains("timed out"));
        }
        other => panic!("expected timeout failure, got {:?}", other),
    }
    assert!(flow.node("after").unwrap().last_result.is_none());
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut flow = Flow::new(
        vec![Node::http("down", format!("http://{}/", addr))],
        vec![],
    );
    let report = runner(Duration::from_secs(2)).run_all(&mut flow).await.unwrap();

    assert!(!report.succeeded());
    let result = flow.node("down").unwrap().last_result.clone().unwrap();
    assert_eq!(result.status, 0);
    assert_eq!(result.error.unwrap().kind, ErrorKind::Network);
}
