//! Canonical request → single-transcript Responses body, for Claude models
//! hosted behind a Responses-compatible endpoint.

use crate::{
    adapters::anthropic::request::DEFAULT_MAX_TOKENS,
    adapters::base::AdapterUtils,
    registry::ModelConfig,
    schemas::{ChatCompletionRequest, Message, Role, Tool},
};
use serde_json::{json, Map, Value};

pub fn build_body(request: &ChatCompletionRequest, config: &ModelConfig) -> Value {
    let max_tokens = request.max_tokens.or(config.max_tokens).unwrap_or(DEFAULT_MAX_TOKENS);

    let mut body = Map::new();
    body.insert("model".into(), Value::String(config.api_model.clone()));
    body.insert("input".into(), Value::String(transcript(&request.messages)));
    body.insert("max_output_tokens".into(), json!(max_tokens));
    if let Some(temperature) = request.temperature {
        body.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = request.top_p {
        body.insert("top_p".into(), json!(top_p));
    }
    let tools = convert_tools(request.tools.as_deref());
    if !tools.is_empty() {
        body.insert("tools".into(), Value::Array(tools));
    }
    body.insert("stream".into(), Value::Bool(true));

    Value::Object(body)
}

/// Flatten the conversation into `Role: text` paragraphs.
pub fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| {
            let text = message.text();
            match message.role {
                Role::System | Role::Developer => format!("System: {}", text),
                Role::User => format!("User: {}", text),
                Role::Assistant => format!("Assistant: {}", text),
                Role::Tool => format!("Tool Result ({}): {}", message.name.as_deref().unwrap_or("tool"), text),
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn convert_tools(tools: Option<&[Tool]>) -> Vec<Value> {
    tools
        .unwrap_or_default()
        .iter()
        .filter(|tool| tool.is_function())
        .map(|tool| {
            json!({
                "type": "function",
                "name": tool.function.name,
                "description": tool.function.description.as_deref().unwrap_or_default(),
                "parameters": tool.function.parameters.clone().unwrap_or_else(|| json!({})),
            })
        })
        .collect()
}

pub fn redact(body: &Value) -> Value {
    let mut redacted = body.clone();
    if let Some(map) = redacted.as_object_mut() {
        map.insert("input".into(), AdapterUtils::redact_count(body.get("input"), "input characters"));
        if body.get("tools").is_some() {
            map.insert("tools".into(), AdapterUtils::redact_count(body.get("tools"), "tools"));
        }
    }
    redacted
}
