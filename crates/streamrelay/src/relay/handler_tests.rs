use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use streamrelay_core::{FrameEncoding, RelayConfig};

use super::handler::COMPLETED_MESSAGE;
use super::*;
use crate::agent::{AgentEvent, AgentService};
use crate::delivery::{Connection, DeliveryChannel};
use crate::test_helpers::{FailMode, RecordingChannel, ScriptedAgent};

fn raw_config() -> RelayConfig {
    RelayConfig {
        agent_id: "AGENT".into(),
        agent_alias_id: "ALIAS".into(),
        encoding: FrameEncoding::Raw,
        ..RelayConfig::default()
    }
}

fn handler_with(
    config: &RelayConfig,
    agent: &Arc<ScriptedAgent>,
    channel: &Arc<RecordingChannel>,
) -> RelayHandler {
    RelayHandler::new(
        config,
        Arc::clone(agent) as Arc<dyn AgentService>,
        Arc::clone(channel) as Arc<dyn DeliveryChannel>,
    )
}

fn event(input: Option<&str>) -> serde_json::Value {
    let body = match input {
        Some(text) => json!({ "input": text }).to_string(),
        None => json!({}).to_string(),
    };
    json!({
        "requestContext": {
            "connectionId": "conn-1",
            "domainName": "example.execute-api.ap-northeast-1.amazonaws.com",
            "stage": "dev",
        },
        "body": body,
    })
}

fn body_field(outcome: &streamrelay_core::Outcome, key: &str) -> String {
    let v: serde_json::Value = serde_json::from_str(&outcome.body).unwrap();
    v[key].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn hello_scenario_streams_chunks_then_sentinel() {
    let agent = Arc::new(ScriptedAgent::chunks(&["Hi", " there"]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler.handle(event(Some("hello"))).await;

    assert_eq!(outcome.status_code, 200);
    assert_eq!(body_field(&outcome, "message"), COMPLETED_MESSAGE);
    assert_eq!(channel.texts().await, vec!["Hi", " there", "EOS"]);
    assert!(channel.posts().await.iter().all(|(id, _)| id == "conn-1"));

    let calls = agent.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].input, "hello");
    assert_eq!(calls[0].agent_id, "AGENT");
    assert_eq!(calls[0].agent_alias_id, "ALIAS");
}

#[tokio::test]
async fn json_encoding_frames_chunks_for_browser_clients() {
    let config = RelayConfig {
        encoding: FrameEncoding::Json,
        ..raw_config()
    };
    let agent = Arc::new(ScriptedAgent::chunks(&["Hi"]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&config, &agent, &channel);

    handler.handle(event(Some("hello"))).await;

    assert_eq!(
        channel.texts().await,
        vec![r#"{"chunk":"Hi"}"#, r#"{"chunk":"[DONE]"}"#]
    );
}

#[tokio::test]
async fn json_frames_keep_whitespace_chunks_between_words() {
    let config = RelayConfig {
        encoding: FrameEncoding::Json,
        ..raw_config()
    };
    let agent = Arc::new(ScriptedAgent::chunks(&["Hello", " ", "world"]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&config, &agent, &channel);

    let outcome = handler.handle(event(Some("hello"))).await;

    assert_eq!(outcome.status_code, 200);
    let texts = channel.texts().await;
    assert_eq!(
        texts,
        vec![
            r#"{"chunk":"Hello"}"#,
            r#"{"chunk":" "}"#,
            r#"{"chunk":"world"}"#,
            r#"{"chunk":"[DONE]"}"#,
        ]
    );
    let answer: String = texts[..3]
        .iter()
        .map(|t| {
            let v: serde_json::Value = serde_json::from_str(t).unwrap();
            v["chunk"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(answer, "Hello world");
}

#[tokio::test]
async fn empty_input_is_rejected_without_agent_call() {
    let agent = Arc::new(ScriptedAgent::chunks(&["never"]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler.handle(event(Some(""))).await;

    assert_eq!(outcome.status_code, 400);
    assert_eq!(body_field(&outcome, "error"), "No input provided");
    assert!(agent.calls().await.is_empty());
    // Only the error notification reaches the client.
    assert_eq!(channel.texts().await, vec!["[ERROR] No input provided"]);
}

#[tokio::test]
async fn missing_input_is_rejected_without_agent_call() {
    let agent = Arc::new(ScriptedAgent::chunks(&["never"]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler.handle(event(None)).await;

    assert_eq!(outcome.status_code, 400);
    assert!(agent.calls().await.is_empty());
    assert!(!channel.texts().await.iter().any(|t| t == "EOS"));
}

#[tokio::test]
async fn missing_connection_is_rejected_silently() {
    let agent = Arc::new(ScriptedAgent::chunks(&["never"]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler
        .handle(json!({ "body": json!({ "input": "hello" }).to_string() }))
        .await;

    assert_eq!(outcome.status_code, 400);
    assert!(agent.calls().await.is_empty());
    assert_eq!(channel.attempts(), 0);
}

#[tokio::test]
async fn undecodable_event_is_a_client_error() {
    let agent = Arc::new(ScriptedAgent::chunks(&[]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler.handle(json!([1, 2, 3])).await;

    assert_eq!(outcome.status_code, 400);
    assert!(agent.calls().await.is_empty());
    assert_eq!(channel.attempts(), 0);
}

#[tokio::test]
async fn undecodable_body_still_notifies_known_connection() {
    let agent = Arc::new(ScriptedAgent::chunks(&["never"]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler
        .handle(json!({
            "requestContext": { "connectionId": "conn-7" },
            "body": { "input": "hello" },
        }))
        .await;

    assert_eq!(outcome.status_code, 400);
    assert!(agent.calls().await.is_empty());
    let posts = channel.posts().await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "conn-7");
    assert!(String::from_utf8_lossy(&posts[0].1).starts_with("[ERROR] Invalid invocation event"));
}

#[tokio::test]
async fn whitespace_input_reaches_the_agent() {
    let agent = Arc::new(ScriptedAgent::chunks(&["ok"]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler.handle(event(Some("   "))).await;

    assert_eq!(outcome.status_code, 200);
    let calls = agent.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].input, "   ");
    assert_eq!(channel.texts().await, vec!["ok", "EOS"]);
}

#[tokio::test]
async fn agent_failure_returns_500_without_sentinel() {
    let agent = Arc::new(ScriptedAgent::failing("AccessDeniedException"));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler.handle(event(Some("hello"))).await;

    assert_eq!(outcome.status_code, 500);
    assert!(body_field(&outcome, "error").contains("AccessDeniedException"));
    let texts = channel.texts().await;
    assert!(!texts.iter().any(|t| t == "EOS"));
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("[ERROR] An internal error occurred"));
}

#[tokio::test]
async fn mid_stream_failure_stops_relay_without_sentinel() {
    let agent = Arc::new(ScriptedAgent::events(vec![
        Ok(AgentEvent::Chunk(b"partial".to_vec())),
        Err("throttled".into()),
        Ok(AgentEvent::Chunk(b"unreached".to_vec())),
    ]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler.handle(event(Some("hello"))).await;

    assert_eq!(outcome.status_code, 500);
    let texts = channel.texts().await;
    assert_eq!(texts[0], "partial");
    assert!(!texts.iter().any(|t| t == "unreached" || t == "EOS"));
    assert!(texts[1].contains("throttled"));
}

#[tokio::test]
async fn invalid_utf8_chunk_is_a_server_error() {
    let agent = Arc::new(ScriptedAgent::events(vec![Ok(AgentEvent::Chunk(vec![
        0xff, 0xfe,
    ]))]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler.handle(event(Some("hello"))).await;

    assert_eq!(outcome.status_code, 500);
    assert!(body_field(&outcome, "error").contains("UTF-8"));
    assert!(!channel.texts().await.iter().any(|t| t == "EOS"));
}

#[tokio::test]
async fn delivery_failure_skips_chunk_and_continues() {
    let agent = Arc::new(ScriptedAgent::chunks(&["a", "b", "c"]));
    let channel = Arc::new(RecordingChannel::new());
    channel.fail_on(1, FailMode::Other).await;
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler.handle(event(Some("hello"))).await;

    assert_eq!(outcome.status_code, 200);
    assert_eq!(channel.texts().await, vec!["a", "c", "EOS"]);
    assert_eq!(channel.attempts(), 4);
}

#[tokio::test]
async fn gone_connection_still_attempts_every_chunk() {
    let agent = Arc::new(ScriptedAgent::chunks(&["a", "b"]));
    let channel = Arc::new(RecordingChannel::new());
    channel.fail_all(FailMode::Gone).await;
    let handler = handler_with(&raw_config(), &agent, &channel);

    let stats = handler
        .relay(&Connection::new("conn-1"), "hello".into())
        .await
        .unwrap();

    assert_eq!(stats.chunks, 2);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.delivered, 0);
    assert!(!stats.sentinel_delivered);
    // Two chunks and the sentinel were all attempted.
    assert_eq!(channel.attempts(), 3);
}

#[tokio::test]
async fn non_content_events_are_ignored() {
    let agent = Arc::new(ScriptedAgent::events(vec![
        Ok(AgentEvent::Other("trace".into())),
        Ok(AgentEvent::Chunk(b"answer".to_vec())),
        Ok(AgentEvent::Other("trace".into())),
    ]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let stats = handler
        .relay(&Connection::new("conn-1"), "hello".into())
        .await
        .unwrap();

    assert_eq!(stats.ignored, 2);
    assert_eq!(stats.chunks, 1);
    assert_eq!(channel.texts().await, vec!["answer", "EOS"]);
}

#[tokio::test]
async fn blank_chunks_are_skipped_but_sentinel_sent() {
    let agent = Arc::new(ScriptedAgent::chunks(&["Hi", "  ", ""]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let stats = handler
        .relay(&Connection::new("conn-1"), "hello".into())
        .await
        .unwrap();

    assert_eq!(stats.skipped, 2);
    assert!(stats.sentinel_delivered);
    assert_eq!(channel.texts().await, vec!["Hi", "EOS"]);
}

#[tokio::test]
async fn empty_answer_sends_only_sentinel() {
    let agent = Arc::new(ScriptedAgent::chunks(&[]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let outcome = handler.handle(event(Some("hello"))).await;

    assert_eq!(outcome.status_code, 200);
    assert_eq!(channel.texts().await, vec!["EOS"]);
}

#[tokio::test]
async fn every_invocation_gets_a_fresh_session() {
    let agent = Arc::new(ScriptedAgent::chunks(&["x"]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    for _ in 0..5 {
        handler.handle(event(Some("hello"))).await;
    }

    let calls = agent.calls().await;
    assert_eq!(calls.len(), 5);
    let ids: HashSet<_> = calls.iter().map(|c| c.session_id.clone()).collect();
    assert_eq!(ids.len(), 5);
    assert!(ids.iter().all(|id| uuid::Uuid::parse_str(id).is_ok()));
}

#[tokio::test]
async fn stats_carry_the_session_id_sent_to_agent() {
    let agent = Arc::new(ScriptedAgent::chunks(&["x"]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = handler_with(&raw_config(), &agent, &channel);

    let stats = handler
        .relay(&Connection::new("conn-1"), "hello".into())
        .await
        .unwrap();

    assert_eq!(agent.calls().await[0].session_id, stats.session_id);
}

#[tokio::test]
async fn concurrent_invocations_do_not_interfere() {
    let agent = Arc::new(ScriptedAgent::chunks(&["a", "b"]));
    let channel = Arc::new(RecordingChannel::new());
    let handler = Arc::new(handler_with(&raw_config(), &agent, &channel));

    let mut tasks = Vec::new();
    for i in 0..4 {
        let handler = Arc::clone(&handler);
        tasks.push(tokio::spawn(async move {
            let ev = json!({
                "requestContext": { "connectionId": format!("conn-{i}") },
                "body": json!({ "input": "hi" }).to_string(),
            });
            handler.handle(ev).await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().status_code, 200);
    }

    let posts = channel.posts().await;
    for i in 0..4 {
        let id = format!("conn-{i}");
        let per_conn: Vec<String> = posts
            .iter()
            .filter(|(c, _)| *c == id)
            .map(|(_, p)| String::from_utf8_lossy(p).into_owned())
            .collect();
        assert_eq!(per_conn, vec!["a", "b", "EOS"]);
    }
}
