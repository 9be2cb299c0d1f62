//! # Streaming Module
//!
//! Server-Sent Events output for translated upstream streams. Chunks are
//! written as `data: <json>\n\n` the moment the translator produces them,
//! followed by a `data: [DONE]\n\n` sentinel that is sent even when the
//! upstream ends irregularly.

pub mod core;

pub use self::core::{completion_id, ChunkEmitter, EventHandler, LineFramer, StreamTranslator};

use crate::error::GatewayError;
use crate::schemas::ChatCompletionChunk;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures_util::StreamExt;
use std::convert::Infallible;
use tracing::{debug, info, warn};

pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Encode one chunk as an SSE frame.
pub fn encode_chunk(chunk: &ChatCompletionChunk) -> Bytes {
    match serde_json::to_string(chunk) {
        Ok(json) => Bytes::from(format!("data: {}\n\n", json)),
        Err(err) => {
            warn!(error = %err, "Failed to serialize chunk");
            Bytes::new()
        }
    }
}

/// Logs a client disconnect if the body is dropped before the sentinel went
/// out. Dropping the body also drops the upstream response, which closes
/// the upstream connection.
struct DisconnectGuard {
    id: String,
    model: String,
    completed: bool,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.completed {
            info!(
                id = %self.id,
                model = %self.model,
                reason = %GatewayError::ClientClosed,
                "Stream abandoned, upstream connection released"
            );
        }
    }
}

/// Assembled completion text, kept only when completion logging is on.
#[derive(Default)]
struct CompletionLog {
    enabled: bool,
    content: String,
    thinking: String,
    tool_calls: usize,
}

impl CompletionLog {
    fn observe(&mut self, chunk: &ChatCompletionChunk) {
        if !self.enabled {
            return;
        }
        for choice in &chunk.choices {
            if let Some(content) = &choice.delta.content {
                self.content.push_str(content);
            }
            if let Some(thinking) = &choice.delta.thinking {
                self.thinking.push_str(thinking);
            }
            if let Some(calls) = &choice.delta.tool_calls {
                self.tool_calls += calls.iter().filter(|c| c.id.is_some()).count();
            }
        }
    }

    fn emit(&self, id: &str, model: &str) {
        if self.enabled {
            debug!(
                id,
                model,
                tool_calls = self.tool_calls,
                thinking = %self.thinking,
                completion = %self.content,
                "Completion finished"
            );
        }
    }
}

/// Build the streaming response for a successful upstream call.
pub fn sse_response(upstream: reqwest::Response, mut translator: StreamTranslator, log_completion: bool) -> Response {
    let mut guard = DisconnectGuard {
        id: translator.id().to_string(),
        model: translator.model().to_string(),
        completed: false,
    };
    let mut completion = CompletionLog {
        enabled: log_completion,
        ..Default::default()
    };

    let frames = async_stream::stream! {
        let mut upstream_bytes = upstream.bytes_stream();

        while let Some(read) = upstream_bytes.next().await {
            match read {
                Ok(bytes) => {
                    for chunk in translator.feed(&bytes) {
                        completion.observe(&chunk);
                        yield Ok::<Bytes, Infallible>(encode_chunk(&chunk));
                    }
                }
                Err(err) => {
                    warn!(id = %guard.id, error = %err, "Upstream stream failed, closing response");
                    break;
                }
            }
        }

        for chunk in translator.finish() {
            completion.observe(&chunk);
            yield Ok(encode_chunk(&chunk));
        }
        yield Ok(Bytes::from_static(DONE_FRAME));

        guard.completed = true;
        completion.emit(&guard.id, &guard.model);
    };

    let mut response = Response::new(Body::from_stream(frames));
    *response.status_mut() = StatusCode::OK;
    apply_stream_headers(response.headers_mut());
    response
}

/// Event-stream content type with caching and proxy buffering disabled.
pub fn apply_stream_headers(headers: &mut axum::http::HeaderMap) {
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream; charset=utf-8"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
}
