//! # Core Streaming Functionality
//!
//! The backend-independent half of stream translation: splitting the
//! upstream byte stream into SSE data payloads, and building canonical
//! chunks that all share one completion id. Backends plug in an
//! [`EventHandler`] that maps their own event vocabulary onto a
//! [`ChunkEmitter`].

use crate::schemas::{
    ChatCompletionChunk, FinishReason, StreamChoice, StreamDelta, StreamFunctionCall, StreamToolCall,
};
use serde_json::Value;
use tracing::{debug, warn};

const COMPLETION_ID_PREFIX: &str = "chatcmpl-";
const COMPLETION_ID_LEN: usize = 24;
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a completion id: fixed prefix plus 24 random alphanumerics.
pub fn completion_id() -> String {
    let mut id = String::with_capacity(COMPLETION_ID_PREFIX.len() + COMPLETION_ID_LEN);
    id.push_str(COMPLETION_ID_PREFIX);
    for _ in 0..COMPLETION_ID_LEN {
        id.push(ALPHANUMERIC[fastrand::usize(..ALPHANUMERIC.len())] as char);
    }
    id
}

/// Splits raw upstream bytes into SSE `data:` payloads.
///
/// Bytes after the last `\n` stay buffered until the next push, so a line
/// split across network reads is decoded exactly once.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `bytes` and return the payloads of every completed line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split(|b| *b == b'\n')
            .filter_map(data_payload)
            .collect()
    }

    /// Flush an unterminated trailing line, if any.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.pending);
        data_payload(&tail)
    }
}

/// Payload of one SSE line, or `None` for blank lines, comments, `event:`
/// lines and the `[DONE]` marker.
fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(payload.to_string())
}

/// Maps one backend's decoded upstream events onto canonical deltas.
pub trait EventHandler: Send {
    fn handle(&mut self, event: &Value, out: &mut ChunkEmitter);
}

/// Builds canonical chunks for one response and tracks the per-stream state
/// every backend shares: role announcement, tool-call numbering and whether
/// the finish chunk went out.
#[derive(Debug)]
pub struct ChunkEmitter {
    id: String,
    model: String,
    last_created: i64,
    tool_call_count: u32,
    role_sent: bool,
    finish_sent: bool,
    ready: Vec<ChatCompletionChunk>,
}

impl ChunkEmitter {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_id(completion_id(), model)
    }

    pub fn with_id(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            last_created: 0,
            tool_call_count: 0,
            role_sent: false,
            finish_sent: false,
            ready: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tool_call_count(&self) -> u32 {
        self.tool_call_count
    }

    pub fn finish_sent(&self) -> bool {
        self.finish_sent
    }

    /// Index of the most recently opened tool call.
    pub fn current_tool_call(&self) -> Option<u32> {
        self.tool_call_count.checked_sub(1)
    }

    /// Announce the assistant role. Only the first call emits anything.
    pub fn role(&mut self) {
        if self.role_sent {
            return;
        }
        self.role_sent = true;
        self.push(
            StreamDelta {
                role: Some("assistant".to_string()),
                content: Some(String::new()),
                ..Default::default()
            },
            None,
        );
    }

    pub fn content(&mut self, text: impl Into<String>) {
        self.push(
            StreamDelta {
                content: Some(text.into()),
                ..Default::default()
            },
            None,
        );
    }

    pub fn reasoning(&mut self, text: impl Into<String>) {
        self.push(
            StreamDelta {
                thinking: Some(text.into()),
                ..Default::default()
            },
            None,
        );
    }

    /// Empty reasoning chunk marking the start of a reasoning block.
    pub fn reasoning_marker(&mut self) {
        self.reasoning(String::new());
    }

    /// Announce a new tool call and return the index assigned to it.
    pub fn open_tool_call(&mut self, id: impl Into<String>, name: impl Into<String>) -> u32 {
        let index = self.tool_call_count;
        self.tool_call_count += 1;
        self.push(
            StreamDelta {
                tool_calls: Some(vec![StreamToolCall {
                    index,
                    id: Some(id.into()),
                    tool_type: Some("function".to_string()),
                    function: StreamFunctionCall {
                        name: Some(name.into()),
                        arguments: String::new(),
                    },
                }]),
                ..Default::default()
            },
            None,
        );
        index
    }

    /// Append a raw argument fragment to an already announced tool call.
    pub fn tool_arguments(&mut self, index: u32, fragment: impl Into<String>) {
        if index >= self.tool_call_count {
            debug!(index, "Dropping arguments for a tool call that was never announced");
            return;
        }
        self.push(
            StreamDelta {
                tool_calls: Some(vec![StreamToolCall {
                    index,
                    id: None,
                    tool_type: None,
                    function: StreamFunctionCall {
                        name: None,
                        arguments: fragment.into(),
                    },
                }]),
                ..Default::default()
            },
            None,
        );
    }

    /// Append to the most recently opened tool call.
    pub fn current_tool_arguments(&mut self, fragment: impl Into<String>) {
        match self.current_tool_call() {
            Some(index) => self.tool_arguments(index, fragment),
            None => debug!("Dropping tool arguments received before any tool call"),
        }
    }

    pub fn finish(&mut self, reason: FinishReason) {
        if self.finish_sent {
            return;
        }
        self.push(StreamDelta::default(), Some(reason));
        self.finish_sent = true;
    }

    /// `tool_calls` if any call was opened during the stream, else `stop`.
    pub fn default_finish_reason(&self) -> FinishReason {
        if self.tool_call_count > 0 {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        }
    }

    /// Surface an error reported inside an otherwise successful stream.
    pub fn upstream_error(&mut self, message: &str) {
        warn!(id = %self.id, model = %self.model, error = message, "Upstream reported an error mid-stream");
        self.content(format!("\n\n[upstream error] {}", message));
    }

    fn push(&mut self, delta: StreamDelta, finish_reason: Option<FinishReason>) {
        if self.finish_sent {
            debug!(id = %self.id, "Ignoring delta received after the finish chunk");
            return;
        }
        self.last_created = chrono::Utc::now().timestamp().max(self.last_created);
        self.ready.push(ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.last_created,
            model: self.model.clone(),
            choices: vec![StreamChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        });
    }

    fn drain(&mut self) -> Vec<ChatCompletionChunk> {
        std::mem::take(&mut self.ready)
    }
}

/// Per-response state machine turning upstream bytes into canonical chunks.
///
/// Feeding the same bytes split at different boundaries yields the same
/// chunk sequence (ids and timestamps aside).
pub struct StreamTranslator {
    framer: LineFramer,
    emitter: ChunkEmitter,
    handler: Box<dyn EventHandler>,
}

impl StreamTranslator {
    pub fn new(model: impl Into<String>, handler: impl EventHandler + 'static) -> Self {
        Self::with_emitter(ChunkEmitter::new(model), handler)
    }

    pub fn with_emitter(emitter: ChunkEmitter, handler: impl EventHandler + 'static) -> Self {
        Self {
            framer: LineFramer::new(),
            emitter,
            handler: Box::new(handler),
        }
    }

    pub fn id(&self) -> &str {
        self.emitter.id()
    }

    /// Logical model name every chunk is tagged with.
    pub fn model(&self) -> &str {
        self.emitter.model()
    }

    pub fn is_finished(&self) -> bool {
        self.emitter.finish_sent()
    }

    /// Consume one read from upstream.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ChatCompletionChunk> {
        for payload in self.framer.push(bytes) {
            self.dispatch(&payload);
        }
        self.emitter.drain()
    }

    /// Upstream closed: flush the buffered tail and make sure a finish chunk
    /// went out.
    pub fn finish(&mut self) -> Vec<ChatCompletionChunk> {
        if let Some(payload) = self.framer.finish() {
            self.dispatch(&payload);
        }
        if !self.emitter.finish_sent() {
            let reason = self.emitter.default_finish_reason();
            debug!(id = %self.emitter.id(), ?reason, "Upstream ended without a finish signal");
            self.emitter.finish(reason);
        }
        self.emitter.drain()
    }

    fn dispatch(&mut self, payload: &str) {
        match serde_json::from_str::<Value>(payload) {
            Ok(event) => self.handler.handle(&event, &mut self.emitter),
            Err(err) => debug!(error = %err, payload, "Discarding malformed upstream frame"),
        }
    }
}
