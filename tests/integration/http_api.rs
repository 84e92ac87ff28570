//! Integration test: HTTP API over a durable node.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use reef_integration_tests::TestNode;
use serde_json::Value;
use tower::ServiceExt;

async fn send(app: axum::Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// PUT, restart the node, then GET, stats and health over HTTP.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_http_writes_survive_restart() {
    let mut node = TestNode::start(3).await;

    for i in 0..20 {
        let (status, body) = send(
            node.router(),
            "PUT",
            &format!("/kv/user:{i}"),
            Some(&format!(r#"{{"value":"name-{i}"}}"#)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["key"], format!("user:{i}"));
    }
    let (status, _) = send(node.router(), "DELETE", "/kv/user:0", None).await;
    assert_eq!(status, StatusCode::OK);

    node.restart().await;

    let (status, body) = send(node.router(), "GET", "/kv/user:7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "name-7");

    let (status, _) = send(node.router(), "GET", "/kv/user:0", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = send(node.router(), "GET", "/stats", None).await;
    assert_eq!(stats["total_keys"], 19);
    assert_eq!(stats["num_shards"], 3);

    let (_, health) = send(node.router(), "GET", "/health", None).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["keys_stored"], 19);
    assert_eq!(health["node_id"], "integration");
}

/// Stats over HTTP agree with each shard's log on disk.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_stats_agree_with_logs() {
    let node = TestNode::start(3).await;
    for i in 0..60 {
        send(
            node.router(),
            "PUT",
            &format!("/kv/k{i}"),
            Some(r#"{"value":"v"}"#),
        )
        .await;
    }

    let (_, stats) = send(node.router(), "GET", "/stats", None).await;
    for shard in &node.manager().config().shard_ids {
        let log = std::fs::read_to_string(node.wal_path(shard)).unwrap();
        assert_eq!(
            stats["shards"][shard.as_str()].as_u64().unwrap() as usize,
            log.lines().count(),
            "{shard}"
        );
    }
}
