//! Responses API event stream → canonical chunks.

use crate::schemas::FinishReason;
use crate::streaming::{ChunkEmitter, EventHandler};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Handles the `response.*` event vocabulary. Function-call argument deltas
/// carry the upstream output item id, which is mapped to the index assigned
/// when the item was announced.
#[derive(Debug, Default)]
pub struct ResponsesEventHandler {
    items: HashMap<String, u32>,
}

impl ResponsesEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn output_item_added(&mut self, event: &Value, out: &mut ChunkEmitter) {
        let Some(item) = event.get("item") else {
            return;
        };
        match item.get("type").and_then(Value::as_str) {
            Some("function_call") => {
                let call_id = str_field(item, "call_id");
                let name = str_field(item, "name");
                let index = out.open_tool_call(call_id, name);
                if let Some(item_id) = item.get("id").and_then(Value::as_str) {
                    self.items.insert(item_id.to_string(), index);
                }
            }
            Some("reasoning") => out.reasoning_marker(),
            _ => {}
        }
    }

    fn arguments_delta(&self, event: &Value, out: &mut ChunkEmitter) {
        let delta = str_field(event, "delta");
        let mapped = event
            .get("item_id")
            .and_then(Value::as_str)
            .and_then(|id| self.items.get(id));
        match mapped {
            Some(index) => out.tool_arguments(*index, delta),
            None => out.current_tool_arguments(delta),
        }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn error_message(event: &Value) -> String {
    event
        .pointer("/response/error/message")
        .or_else(|| event.pointer("/error/message"))
        .or_else(|| event.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("upstream reported a failure")
        .to_string()
}

impl EventHandler for ResponsesEventHandler {
    fn handle(&mut self, event: &Value, out: &mut ChunkEmitter) {
        let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default();

        match event_type {
            "response.created" => out.role(),
            "response.output_item.added" => {
                out.role();
                self.output_item_added(event, out);
            }
            "response.output_text.delta" => {
                out.role();
                out.content(str_field(event, "delta"));
            }
            "response.reasoning_summary_text.delta" => {
                out.role();
                out.reasoning(str_field(event, "delta"));
            }
            "response.function_call_arguments.delta" => self.arguments_delta(event, out),
            "response.completed" | "response.incomplete" => {
                let reason = out.default_finish_reason();
                out.finish(reason);
            }
            "response.failed" | "error" => out.upstream_error(&error_message(event)),

            // Foundry-hosted Claude speaks a looser dialect of the same protocol
            "response.content.delta" => {
                if let Some(text) = event.pointer("/delta/text").and_then(Value::as_str) {
                    out.role();
                    out.content(text);
                }
            }
            "response.done" => out.finish(FinishReason::Stop),
            _ => match event.pointer("/delta/text").and_then(Value::as_str) {
                Some(text) => {
                    out.role();
                    out.content(text);
                }
                None => debug!(event_type, "Ignoring Responses event"),
            },
        }
    }
}
