//! Messages API event stream → canonical chunks.

use crate::schemas::FinishReason;
use crate::streaming::{ChunkEmitter, EventHandler};
use serde_json::Value;
use tracing::debug;

/// Stateless apart from the emitter: Anthropic streams at most one content
/// block at a time, so argument deltas always belong to the latest tool call.
#[derive(Debug, Default)]
pub struct MessagesEventHandler;

impl MessagesEventHandler {
    pub fn new() -> Self {
        Self
    }
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

impl EventHandler for MessagesEventHandler {
    fn handle(&mut self, event: &Value, out: &mut ChunkEmitter) {
        let event_type = str_at(event, "/type").unwrap_or_default();

        match event_type {
            "message_start" => out.role(),
            "content_block_start" => match str_at(event, "/content_block/type") {
                Some("tool_use") => {
                    out.role();
                    out.open_tool_call(
                        str_at(event, "/content_block/id").unwrap_or_default(),
                        str_at(event, "/content_block/name").unwrap_or_default(),
                    );
                }
                Some("thinking") => {
                    out.role();
                    out.reasoning_marker();
                }
                _ => {}
            },
            "content_block_delta" => match str_at(event, "/delta/type") {
                Some("text_delta") => {
                    out.role();
                    out.content(str_at(event, "/delta/text").unwrap_or_default());
                }
                Some("thinking_delta") => {
                    out.role();
                    out.reasoning(str_at(event, "/delta/thinking").unwrap_or_default());
                }
                Some("input_json_delta") => {
                    out.current_tool_arguments(str_at(event, "/delta/partial_json").unwrap_or_default())
                }
                other => debug!(delta_type = ?other, "Ignoring content block delta"),
            },
            "message_delta" => match str_at(event, "/delta/stop_reason") {
                Some("end_turn") => out.finish(FinishReason::Stop),
                Some("tool_use") => out.finish(FinishReason::ToolCalls),
                Some(reason) => debug!(reason, "Stop reason left to end-of-stream handling"),
                None => {}
            },
            "error" => out.upstream_error(str_at(event, "/error/message").unwrap_or("upstream reported an error")),
            _ => debug!(event_type, "Ignoring Messages event"),
        }
    }
}
