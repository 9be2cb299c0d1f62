//! Canonical request → OpenAI-compatible chat completions body.

use crate::{
    adapters::base::AdapterUtils,
    registry::ModelConfig,
    schemas::ChatCompletionRequest,
    Result,
};
use serde_json::{json, Map, Value};

pub const API_VERSION: &str = "2024-05-01-preview";

/// The upstream already speaks the canonical dialect, so messages and tools
/// go out as they came; only the model name and a few defaults change.
/// `stream` is always on: the response is decoded as an event stream
/// whatever the client asked for.
pub fn build_body(request: &ChatCompletionRequest, config: &ModelConfig) -> Result<Value> {
    let mut body = Map::new();
    body.insert("model".into(), Value::String(config.api_model.clone()));
    body.insert("messages".into(), serde_json::to_value(&request.messages)?);

    if let Some(temperature) = request.temperature {
        body.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = request.top_p {
        body.insert("top_p".into(), json!(top_p));
    }
    if let Some(max_tokens) = request.max_tokens.or(config.max_tokens) {
        body.insert("max_tokens".into(), json!(max_tokens));
    }
    body.insert("stream".into(), Value::Bool(true));
    if let Some(tools) = &request.tools {
        body.insert("tools".into(), serde_json::to_value(tools)?);
    }
    if let Some(tool_choice) = &request.tool_choice {
        body.insert("tool_choice".into(), tool_choice.clone());
    }

    Ok(Value::Object(body))
}

pub fn redact(body: &Value) -> Value {
    let mut redacted = body.clone();
    if let Some(map) = redacted.as_object_mut() {
        map.insert("messages".into(), AdapterUtils::redact_count(body.get("messages"), "messages"));
        if body.get("tools").is_some() {
            map.insert("tools".into(), AdapterUtils::redact_count(body.get("tools"), "tools"));
        }
    }
    redacted
}
