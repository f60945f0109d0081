//! HTTP surface: SSE framing, protocol header, health and metrics.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use part_relay::config::Config;
use part_relay::metrics::RelayMetrics;
use part_relay::producer::{Script, ScriptedModel, SharedModel, StubSearch};
use part_relay::relay::log::PartLog;
use part_relay::relay::{Part, SequentialIds};
use part_relay::server::api::{build_router, AppState};
use part_relay::workflows::Models;

async fn spawn_server(model: Arc<ScriptedModel>) -> String {
    spawn_server_with(Config::default(), model).await
}

async fn spawn_server_with(mut config: Config, model: Arc<ScriptedModel>) -> String {
    config.relay.keep_alive_secs = 1;

    let shared: SharedModel = model;
    let state = Arc::new(AppState::new(
        Arc::new(config),
        Models::new(shared.clone(), shared),
        Arc::new(StubSearch::new()),
        SequentialIds::shared("id"),
        Arc::new(RelayMetrics::new().unwrap()),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

/// Split an SSE body into `data:` payloads.
fn sse_payloads(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim_start().to_string())
        .collect()
}

fn parse_parts(payloads: &[String]) -> Vec<Part> {
    payloads
        .iter()
        .filter(|p| p.as_str() != "[DONE]")
        .map(|p| serde_json::from_str(p).unwrap())
        .collect()
}

fn body(text: &str) -> Value {
    json!({
        "messages": [
            { "id": "m1", "role": "user", "parts": [{ "type": "text", "text": text }] }
        ]
    })
}

#[tokio::test]
async fn test_chat_streams_ui_message_parts() {
    let model = Arc::new(ScriptedModel::new("m").with_script(Script::text("Hello over SSE")));
    let base = spawn_server(model).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .json(&body("hi"))
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(resp.headers()["x-vercel-ai-ui-message-stream"], "v1");
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let payloads = sse_payloads(&resp.text().await.unwrap());
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));

    let parts = parse_parts(&payloads);
    assert!(parts[0].is_start());
    assert_eq!(parts.last(), Some(&Part::Finish));
    assert_eq!(PartLog::from_parts(&parts).text(), "Hello over SSE");
}

#[tokio::test]
async fn test_research_over_http() {
    let base = spawn_server(Arc::new(ScriptedModel::new("m").with_chunking(12, None))).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/research"))
        .json(&body("rust web frameworks"))
        .send()
        .await
        .unwrap();
    let parts = parse_parts(&sse_payloads(&resp.text().await.unwrap()));
    let log = PartLog::from_parts(&parts);

    assert_eq!(log.start_count(), 1);
    assert_eq!(log.values_for_tag("data-plan"), vec![&json!("rust web frameworks")]);
    assert_eq!(log.values_for_tag("data-search-results").len(), 3);
    assert!(log.is_finished());
}

#[tokio::test]
async fn test_producer_failure_is_an_error_part() {
    let model = Arc::new(ScriptedModel::new("m").with_script(Script::fail_after(["par", "tial"], "boom")));
    let base = spawn_server(model).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .json(&body("hi"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let parts = parse_parts(&sse_payloads(&resp.text().await.unwrap()));
    let log = PartLog::from_parts(&parts);
    assert!(log.error().unwrap().contains("boom"));
    assert_eq!(log.text(), "partial");
    assert!(!log.is_finished());
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let base = spawn_server(Arc::new(ScriptedModel::new("m"))).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn test_health_and_metrics() {
    let base = spawn_server(Arc::new(ScriptedModel::new("m"))).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["active_sessions"], 0);
    assert_eq!(health["available_slots"], 64);

    client
        .post(format!("{base}/api/model-router"))
        .json(&body("hello"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    // The session records its outcome just after the stream ends.
    let mut metrics = String::new();
    for _ in 0..50 {
        metrics = client
            .get(format!("{base}/metrics"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        if metrics.contains("relay_sessions_total") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(metrics.contains(r#"relay_sessions_total{outcome="complete",workflow="model-router"} 1"#));
    assert!(metrics.contains("relay_parts_total"));
}

#[tokio::test]
async fn test_streaming_sessions_hold_their_slot() {
    let mut config = Config::default();
    config.server.max_concurrent_requests = 1;
    let model = Arc::new(
        ScriptedModel::new("m")
            .with_chunking(1, Some(Duration::from_millis(10)))
            .with_script(Script::text("a".repeat(60)))
            .with_script(Script::text("second")),
    );
    let base = spawn_server_with(config, model).await;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("{base}/api/chat"))
        .json(&body("one"))
        .send()
        .await
        .unwrap();
    assert!(first.status().is_success());

    let second = tokio::spawn({
        let client = client.clone();
        let url = format!("{base}/api/chat");
        async move { client.post(url).json(&body("two")).send().await.unwrap() }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!second.is_finished(), "second stream started while the first was still open");

    // Routes without a session are not queued behind it.
    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["available_slots"], 0);

    let first_parts = parse_parts(&sse_payloads(&first.text().await.unwrap()));
    assert_eq!(first_parts.last(), Some(&Part::Finish));

    let second = tokio::time::timeout(Duration::from_secs(5), second)
        .await
        .unwrap()
        .unwrap();
    assert!(second.status().is_success());
    let second_parts = parse_parts(&sse_payloads(&second.text().await.unwrap()));
    assert_eq!(PartLog::from_parts(&second_parts).text(), "second");
}
