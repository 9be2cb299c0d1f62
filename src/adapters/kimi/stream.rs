//! Upstream chat completion chunks → gateway chunks.
//!
//! The upstream already emits the canonical shape, but its ids, timestamps
//! and tool-call numbering are replaced with the gateway's own.

use crate::schemas::FinishReason;
use crate::streaming::{ChunkEmitter, EventHandler};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ChatCompletionsEventHandler {
    /// upstream tool-call index → gateway index
    tool_indexes: HashMap<u64, u32>,
}

impl ChatCompletionsEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn tool_call_delta(&mut self, call: &Value, out: &mut ChunkEmitter) {
        let upstream_index = call.get("index").and_then(Value::as_u64).unwrap_or_default();
        let arguments = call
            .pointer("/function/arguments")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if let Some(id) = call.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) {
            let name = call.pointer("/function/name").and_then(Value::as_str).unwrap_or_default();
            let index = out.open_tool_call(id, name);
            self.tool_indexes.insert(upstream_index, index);
            if !arguments.is_empty() {
                out.tool_arguments(index, arguments);
            }
        } else if !arguments.is_empty() {
            match self.tool_indexes.get(&upstream_index) {
                Some(index) => out.tool_arguments(*index, arguments),
                None => out.current_tool_arguments(arguments),
            }
        }
    }
}

impl EventHandler for ChatCompletionsEventHandler {
    fn handle(&mut self, event: &Value, out: &mut ChunkEmitter) {
        if let Some(error) = event.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            out.upstream_error(&message);
            return;
        }

        let Some(choice) = event.pointer("/choices/0") else {
            debug!("Ignoring chunk without choices");
            return;
        };
        let delta = choice.get("delta").unwrap_or(&Value::Null);

        if delta.get("role").is_some() {
            out.role();
        }
        if let Some(content) = delta.get("content").and_then(Value::as_str).filter(|c| !c.is_empty()) {
            out.role();
            out.content(content);
        }
        let reasoning = delta
            .get("reasoning_content")
            .or_else(|| delta.get("reasoning"))
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty());
        if let Some(reasoning) = reasoning {
            out.role();
            out.reasoning(reasoning);
        }
        if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
            out.role();
            for call in calls {
                self.tool_call_delta(call, out);
            }
        }

        match choice.get("finish_reason").and_then(Value::as_str) {
            Some("stop") => out.finish(FinishReason::Stop),
            Some("tool_calls") => out.finish(FinishReason::ToolCalls),
            Some(reason) => debug!(reason, "Finish reason left to end-of-stream handling"),
            None => {}
        }
    }
}
