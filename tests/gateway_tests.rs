//! # Gateway Integration Tests
//!
//! Drives the full router with `tower::ServiceExt::oneshot` against
//! wiremock upstreams standing in for each backend.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chatgate::{
    create_router, AdapterContext, AppState, CredentialKind, ModelRegistry, StaticCredentials, UpstreamSettings,
};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use tower::ServiceExt;
use tracing::{
    field::{Field, Visit},
    Level,
};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use wiremock::{
    matchers::{body_partial_json, header as header_is, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const SERVICE_KEY: &str = "test-service-key";

/// Registry with one model per backend, all pointed at `upstream`.
fn registry(upstream: &str) -> ModelRegistry {
    ModelRegistry::from_yaml_str(&format!(
        r#"
models:
  claude-sonnet:
    backend: anthropic
    api_model: claude-sonnet-4-5
    base_url: {upstream}
  gpt-high:
    backend: azure
    api_model: gpt-5
    reasoning_effort: high
  gpt-unset:
    backend: azure
    api_model: gpt-5
  kimi-k2:
    backend: kimi
    api_model: Kimi-K2-Thinking
    base_url: {upstream}/openai/deployments/Kimi-K2-Thinking
"#
    ))
    .unwrap()
}

fn app(upstream: &str) -> Router {
    let settings = UpstreamSettings {
        azure_base_url: Some(upstream.to_string()),
        ..Default::default()
    };
    let credentials = StaticCredentials::new()
        .with(CredentialKind::AzureApiKey, "test-azure-key")
        .with(CredentialKind::AnthropicApiKey, "test-anthropic-key");
    let context = AdapterContext::with_credentials(settings, credentials).unwrap();
    create_router(AppState::with_context(registry(upstream), context, SERVICE_KEY, true))
}

fn chat(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", SERVICE_KEY))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn sse(events: &[Value]) -> String {
    events
        .iter()
        .map(|e| format!("event: {}\ndata: {}\n\n", e["type"].as_str().unwrap_or("message"), e))
        .collect()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Parsed chunk frames plus whether the stream ended with the sentinel.
fn frames(text: &str) -> (Vec<Value>, bool) {
    let payloads: Vec<&str> = text
        .split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| frame.strip_prefix("data: ").unwrap())
        .collect();
    let done = payloads.last() == Some(&"[DONE]");
    let chunks = payloads
        .iter()
        .filter(|p| **p != "[DONE]")
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    (chunks, done)
}

#[tokio::test]
async fn test_messages_style_hello_streams_canonical_chunks() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header_is("x-api-key", "test-anthropic-key"))
        .and(header_is("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[
                json!({"type": "message_start", "message": {"id": "msg_1", "role": "assistant"}}),
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hello"}}),
                json!({"type": "content_block_stop", "index": 0}),
                json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}}),
                json!({"type": "message_stop"}),
            ]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = app(&upstream.uri())
        .oneshot(chat(json!({
            "model": "claude-sonnet",
            "messages": [
                {"role": "system", "content": "Be friendly."},
                {"role": "user", "content": "Say hello"}
            ]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream; charset=utf-8");
    assert_eq!(response.headers()["x-accel-buffering"], "no");

    let (chunks, done) = frames(&body_text(response).await);
    assert!(done);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0]["choices"][0]["delta"], json!({"role": "assistant", "content": ""}));
    assert_eq!(chunks[1]["choices"][0]["delta"], json!({"content": "Hello"}));
    assert_eq!(chunks[2]["choices"][0]["finish_reason"], "stop");

    let id = chunks[0]["id"].as_str().unwrap();
    assert!(id.starts_with("chatcmpl-"));
    for chunk in &chunks {
        assert_eq!(chunk["id"], id);
        assert_eq!(chunk["model"], "claude-sonnet");
        assert_eq!(chunk["object"], "chat.completion.chunk");
    }

    let sent: Value = serde_json::from_slice(&upstream.received_requests().await.unwrap()[0].body).unwrap();
    assert_eq!(sent["system"], "Be friendly.");
    assert_eq!(sent["messages"], json!([{"role": "user", "content": "Say hello"}]));
    assert_eq!(sent["stream"], true);
}

#[tokio::test]
async fn test_responses_style_401_becomes_400_with_redacted_report() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/responses"))
        .and(query_param("api-version", "2025-04-01-preview"))
        .and(header_is("api-key", "test-azure-key"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": "401", "message": "Access denied due to invalid subscription key."}
        })))
        .mount(&upstream)
        .await;

    let response = app(&upstream.uri())
        .oneshot(chat(json!({
            "model": "gpt-high",
            "messages": [
                {"role": "system", "content": "You are a meticulous assistant."},
                {"role": "user", "content": "top secret question"},
                {"role": "assistant", "content": "an answer"},
                {"role": "user", "content": "follow up"}
            ],
            "tools": [
                {"type": "function", "function": {"name": "read_file", "parameters": {"type": "object"}}},
                {"type": "function", "function": {"name": "write_file", "parameters": {"type": "object"}}}
            ]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let text = body_text(response).await;
    assert!(!text.contains("top secret question"));

    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["error"]["type"], "upstream_error");
    assert_eq!(body["report"]["upstream_status_code"], 401);
    assert_eq!(
        body["report"]["upstream_response"]["error"]["message"],
        "Access denied due to invalid subscription key."
    );
    let request_body = &body["report"]["request_body"];
    assert_eq!(request_body["tools"], "...redacted 2 tools...");
    assert_eq!(request_body["input"], "...redacted 3 input items...");
    assert_eq!(request_body["instructions"], "You are a meticu...");
    assert_eq!(request_body["model"], "gpt-5");
}

#[tokio::test]
async fn test_responses_style_tool_call_stream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[
                json!({"type": "response.created", "response": {"id": "resp_1"}}),
                json!({"type": "response.output_item.added", "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "read_file"}}),
                json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "{\"path\":"}),
                json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "\"src/lib.rs\"}"}),
                json!({"type": "response.completed", "response": {"status": "completed"}}),
            ]),
            "text/event-stream",
        ))
        .mount(&upstream)
        .await;

    let response = app(&upstream.uri())
        .oneshot(chat(json!({
            "model": "gpt-high",
            "messages": [{"role": "user", "content": "open lib.rs"}],
            "tools": [{"type": "function", "function": {"name": "read_file"}}]
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (chunks, done) = frames(&body_text(response).await);
    assert!(done);
    let arguments: String = chunks
        .iter()
        .filter_map(|c| c["choices"][0]["delta"]["tool_calls"][0]["function"]["arguments"].as_str())
        .collect();
    assert_eq!(arguments, "{\"path\":\"src/lib.rs\"}");
    assert_eq!(chunks[1]["choices"][0]["delta"]["tool_calls"][0]["id"], "call_1");
    assert_eq!(chunks.last().unwrap()["choices"][0]["finish_reason"], "tool_calls");
}

#[tokio::test]
async fn test_pass_through_retags_upstream_chunks() {
    let upstream = MockServer::start().await;
    let upstream_chunk = |delta: Value, finish: Value| {
        format!(
            "data: {}\n\n",
            json!({
                "id": "upstream-1",
                "object": "chat.completion.chunk",
                "created": 1,
                "model": "Kimi-K2-Thinking",
                "choices": [{"index": 0, "delta": delta, "finish_reason": finish}]
            })
        )
    };
    let body = [
        upstream_chunk(json!({"role": "assistant", "content": ""}), Value::Null),
        upstream_chunk(json!({"reasoning_content": "thinking"}), Value::Null),
        upstream_chunk(json!({"content": "Hi!"}), Value::Null),
        upstream_chunk(json!({}), json!("stop")),
        "data: [DONE]\n\n".to_string(),
    ]
    .concat();

    Mock::given(method("POST"))
        .and(path("/openai/deployments/Kimi-K2-Thinking/chat/completions"))
        .and(query_param("api-version", "2024-05-01-preview"))
        .and(header_is("authorization", "Bearer test-azure-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&upstream)
        .await;

    let response = app(&upstream.uri())
        .oneshot(chat(json!({
            "model": "kimi-k2",
            "messages": [{"role": "user", "content": "Hi", "cache_control": {"type": "ephemeral"}}]
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    assert_eq!(text.matches("[DONE]").count(), 1);
    let (chunks, done) = frames(&text);
    assert!(done);
    assert!(chunks.iter().all(|c| c["id"] != "upstream-1" && c["model"] == "kimi-k2"));
    assert_eq!(chunks[1]["choices"][0]["delta"], json!({"thinking": "thinking"}));
    assert_eq!(chunks[2]["choices"][0]["delta"], json!({"content": "Hi!"}));
    assert_eq!(chunks[3]["choices"][0]["finish_reason"], "stop");

    let sent: Value = serde_json::from_slice(&upstream.received_requests().await.unwrap()[0].body).unwrap();
    assert_eq!(sent["model"], "Kimi-K2-Thinking");
    assert_eq!(sent["messages"][0]["cache_control"], json!({"type": "ephemeral"}));
}

#[tokio::test]
async fn test_pass_through_streams_even_when_client_disables_streaming() {
    let upstream = MockServer::start().await;
    let body = [
        json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": "The answer is 42"}, "finish_reason": null}]}),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
    ]
    .iter()
    .map(|chunk| format!("data: {}\n\n", chunk))
    .collect::<String>();

    Mock::given(method("POST"))
        .and(path("/openai/deployments/Kimi-K2-Thinking/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = app(&upstream.uri())
        .oneshot(chat(json!({
            "model": "kimi-k2",
            "stream": false,
            "messages": [{"role": "user", "content": "What is the answer?"}]
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (chunks, done) = frames(&body_text(response).await);
    assert!(done);
    let content: String = chunks
        .iter()
        .filter_map(|c| c["choices"][0]["delta"]["content"].as_str())
        .collect();
    assert_eq!(content, "The answer is 42");
    assert_eq!(chunks.last().unwrap()["choices"][0]["finish_reason"], "stop");
}

/// Log events seen while a test runs, as (level, message).
#[derive(Clone, Default)]
struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

impl CapturedEvents {
    fn snapshot(&self) -> Vec<(Level, String)> {
        self.0.lock().unwrap().clone()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0.lock().unwrap().push((*event.metadata().level(), visitor.0));
    }
}

/// Upstream that answers with a single SSE frame and then holds the
/// connection open. The task finishes once the gateway hangs up.
async fn stalled_upstream(first_frame: String) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 8192];
        let mut request = Vec::new();
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let read = socket.read(&mut buf).await.unwrap();
            assert!(read > 0, "gateway closed before sending a request");
            request.extend_from_slice(&buf[..read]);
        }

        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n";
        socket.write_all(head.as_bytes()).await.unwrap();
        let chunk = format!("{:x}\r\n{}\r\n", first_frame.len(), first_frame);
        socket.write_all(chunk.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        // Drain the rest of the request; EOF means the connection was released.
        while let Ok(read) = socket.read(&mut buf).await {
            if read == 0 {
                break;
            }
        }
    });

    (format!("http://{}", address), task)
}

#[tokio::test]
async fn test_client_disconnect_releases_upstream_without_upstream_error() {
    let events = CapturedEvents::default();
    let _subscriber = tracing::subscriber::set_default(tracing_subscriber::registry().with(events.clone()));

    let first_frame = format!(
        "data: {}\n\n",
        json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": "Once upon"}, "finish_reason": null}]})
    );
    let (upstream, upstream_task) = stalled_upstream(first_frame).await;

    let response = app(&upstream)
        .oneshot(chat(json!({"model": "kimi-k2", "messages": [{"role": "user", "content": "Tell me a story"}]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    assert!(std::str::from_utf8(&first).unwrap().contains("\"role\":\"assistant\""));
    drop(body);

    tokio::time::timeout(Duration::from_secs(5), upstream_task)
        .await
        .expect("upstream connection was not released")
        .unwrap();

    let events = events.snapshot();
    assert!(events
        .iter()
        .any(|(level, message)| *level == Level::INFO && message.starts_with("Stream abandoned")));
    assert!(
        events.iter().all(|(level, _)| *level > Level::WARN),
        "unexpected warnings: {:?}",
        events
    );
}

#[tokio::test]
async fn test_in_stream_error_is_surfaced_then_terminated() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[
                json!({"type": "message_start", "message": {"id": "msg_1"}}),
                json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
            ]),
            "text/event-stream",
        ))
        .mount(&upstream)
        .await;

    let response = app(&upstream.uri())
        .oneshot(chat(json!({"model": "claude-sonnet", "messages": [{"role": "user", "content": "Hi"}]})))
        .await
        .unwrap();

    let (chunks, done) = frames(&body_text(response).await);
    assert!(done);
    assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "\n\n[upstream error] Overloaded");
    assert_eq!(chunks.last().unwrap()["choices"][0]["finish_reason"], "stop");
}

#[tokio::test]
async fn test_unknown_model_lists_available_models() {
    let response = app("http://127.0.0.1:9")
        .oneshot(chat(json!({"model": "gpt-9000", "messages": []})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert_eq!(body["error"]["code"], "model_not_found");
    assert_eq!(body["error"]["param"], "model");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Model 'gpt-9000' is not configured."));
    assert!(message.contains("claude-sonnet, gpt-high, gpt-unset, kimi-k2"));
}

#[tokio::test]
async fn test_missing_model_field() {
    let response = app("http://127.0.0.1:9")
        .oneshot(chat(json!({"messages": [{"role": "user", "content": "Hi"}]})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Missing 'model' field in request");
    assert_eq!(body["error"]["param"], "model");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/chat/completions")
        .header(header::AUTHORIZATION, format!("Bearer {}", SERVICE_KEY))
        .body(Body::from("{not json"))
        .unwrap();
    let response = app("http://127.0.0.1:9").oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_missing_reasoning_effort_is_plain_text_client_error() {
    let response = app("http://127.0.0.1:9")
        .oneshot(chat(json!({"model": "gpt-unset", "messages": [{"role": "user", "content": "Hi"}]})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(
        body_text(response).await,
        "Client configuration error, check your model settings.\n\n\t\
         Model 'gpt-unset' is missing reasoning_effort configuration"
    );
}

#[tokio::test]
async fn test_wrong_service_key_is_rejected() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/chat/completions")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::from(json!({"model": "gpt-high", "messages": []}).to_string()))
        .unwrap();
    let response = app("http://127.0.0.1:9").oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "invalid_api_key");
}

#[tokio::test]
async fn test_models_are_listed_in_registry_order() {
    for uri in ["/models", "/v1/models"] {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", SERVICE_KEY))
            .body(Body::empty())
            .unwrap();
        let response = app("http://127.0.0.1:9").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["object"], "list");
        let ids: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["claude-sonnet", "gpt-high", "gpt-unset", "kimi-k2"]);
        assert_eq!(body["data"][0], json!({"id": "claude-sonnet", "object": "model", "created": 1686935002, "owned_by": "system"}));
    }
}

#[tokio::test]
async fn test_health_needs_no_key() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app("http://127.0.0.1:9").oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}
