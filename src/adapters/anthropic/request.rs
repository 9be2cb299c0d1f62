//! Canonical request → Anthropic Messages API body.

use crate::{
    adapters::base::AdapterUtils,
    registry::ModelConfig,
    schemas::{ChatCompletionRequest, ContentPart, Message, MessageContent, Role, Tool, ToolCall},
};
use serde_json::{json, Map, Value};

/// Ceiling used when neither the request nor the model sets one. It covers
/// thinking and answer tokens together.
pub const DEFAULT_MAX_TOKENS: u32 = 64000;

pub fn build_body(request: &ChatCompletionRequest, config: &ModelConfig) -> Value {
    let max_tokens = request.max_tokens.or(config.max_tokens).unwrap_or(DEFAULT_MAX_TOKENS);

    let mut body = Map::new();
    body.insert("model".into(), Value::String(config.api_model.clone()));
    body.insert("messages".into(), Value::Array(convert_messages(&request.messages)));
    body.insert("max_tokens".into(), json!(max_tokens));
    body.insert("stream".into(), Value::Bool(true));

    if let Some(system) = system_prompt(&request.messages) {
        body.insert("system".into(), Value::String(system));
    }
    if let Some(temperature) = request.temperature {
        body.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = request.top_p {
        body.insert("top_p".into(), json!(top_p));
    }

    let tools = convert_tools(request.tools.as_deref());
    if !tools.is_empty() {
        if let Some(choice) = request.tool_choice.as_ref().and_then(convert_tool_choice) {
            body.insert("tool_choice".into(), choice);
        }
        body.insert("tools".into(), Value::Array(tools));
    }

    if let Some(budget) = config.thinking_budget {
        body.insert("thinking".into(), json!({"type": "enabled", "budget_tokens": budget}));
    }

    Value::Object(body)
}

/// Text of every system and developer message, blank-line separated.
pub fn system_prompt(messages: &[Message]) -> Option<String> {
    let parts: Vec<String> = messages
        .iter()
        .filter(|m| m.role.is_instruction())
        .flat_map(|m| match &m.content {
            Some(MessageContent::Text(text)) => vec![text.clone()],
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text, .. } => Some(text.clone()),
                    _ => None,
                })
                .collect(),
            None => Vec::new(),
        })
        .collect();

    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

pub fn convert_messages(messages: &[Message]) -> Vec<Value> {
    let mut converted: Vec<Value> = Vec::new();

    for message in messages {
        match message.role {
            Role::System | Role::Developer => continue,
            Role::User | Role::Assistant => converted.push(json!({
                "role": message.role.as_str(),
                "content": convert_content(message.content.as_ref()),
            })),
            Role::Tool => converted.push(json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id.as_deref().unwrap_or_default(),
                    "content": message.content.as_ref().map(content_value).unwrap_or_else(|| json!("")),
                }],
            })),
        }

        if let Some(calls) = message.tool_calls.as_deref().filter(|calls| !calls.is_empty()) {
            attach_tool_uses(&mut converted, calls.iter().map(tool_use).collect());
        }
    }

    converted
}

/// Tool uses join the assistant turn they belong to, or start a new one.
fn attach_tool_uses(converted: &mut Vec<Value>, mut uses: Vec<Value>) {
    if let Some(last) = converted.last_mut().filter(|m| m["role"] == "assistant") {
        let mut blocks = match last["content"].take() {
            Value::String(text) if !text.is_empty() => vec![json!({"type": "text", "text": text})],
            Value::Array(blocks) => blocks,
            _ => Vec::new(),
        };
        blocks.append(&mut uses);
        last["content"] = Value::Array(blocks);
    } else {
        converted.push(json!({"role": "assistant", "content": uses}));
    }
}

fn tool_use(call: &ToolCall) -> Value {
    let input = serde_json::from_str::<Value>(&call.function.arguments)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({}));
    json!({
        "type": "tool_use",
        "id": call.id,
        "name": call.function.name,
        "input": input,
    })
}

fn content_value(content: &MessageContent) -> Value {
    serde_json::to_value(content).unwrap_or_else(|_| Value::String(content.text()))
}

/// Strings pass through. In part lists, text is kept with its options, `data:` images become
/// base64 image blocks, other images are dropped and unknown parts are
/// forwarded. A list that converts to nothing is sent as it came.
fn convert_content(content: Option<&MessageContent>) -> Value {
    let parts = match content {
        None => return Value::String(String::new()),
        Some(MessageContent::Text(text)) => return Value::String(text.clone()),
        Some(MessageContent::Parts(parts)) => parts,
    };

    let converted: Vec<Value> = parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text, extra } => Some(with_extra(json!({"type": "text", "text": text}), extra)),
            ContentPart::ImageUrl { image_url, extra } => {
                image_block(image_url.url()).map(|block| with_extra(block, extra))
            }
            ContentPart::Other(value) => Some(value.clone()),
        })
        .collect();

    if converted.is_empty() {
        content_value(&MessageContent::Parts(parts.clone()))
    } else {
        Value::Array(converted)
    }
}

/// Carry part-level options (`cache_control` and the like) onto the block.
fn with_extra(mut block: Value, extra: &Map<String, Value>) -> Value {
    if let Some(map) = block.as_object_mut() {
        for (key, value) in extra {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    block
}

/// `data:image/png;base64,AAAA` → Anthropic base64 image source.
fn image_block(url: &str) -> Option<Value> {
    let (header, data) = url.strip_prefix("data:")?.split_once(',')?;
    let media_type = header.split(';').next().unwrap_or_default();
    Some(json!({
        "type": "image",
        "source": {"type": "base64", "media_type": media_type, "data": data},
    }))
}

pub fn convert_tools(tools: Option<&[Tool]>) -> Vec<Value> {
    tools
        .unwrap_or_default()
        .iter()
        .filter(|tool| tool.is_function())
        .map(|tool| {
            json!({
                "name": tool.function.name,
                "description": tool.function.description.as_deref().unwrap_or_default(),
                "input_schema": tool.function.parameters.clone().unwrap_or_else(|| json!({})),
            })
        })
        .collect()
}

fn convert_tool_choice(choice: &Value) -> Option<Value> {
    match choice {
        Value::String(mode) => match mode.as_str() {
            "auto" => Some(json!({"type": "auto"})),
            "required" => Some(json!({"type": "any"})),
            "none" => Some(json!({"type": "none"})),
            _ => None,
        },
        Value::Object(_) => choice
            .pointer("/function/name")
            .and_then(Value::as_str)
            .map(|name| json!({"type": "tool", "name": name})),
        _ => None,
    }
}

pub fn redact(body: &Value) -> Value {
    let mut redacted = body.clone();
    if let Some(map) = redacted.as_object_mut() {
        if let Some(system) = body.get("system").and_then(Value::as_str) {
            map.insert("system".into(), Value::String(AdapterUtils::preview(system)));
        }
        map.insert("messages".into(), AdapterUtils::redact_count(body.get("messages"), "messages"));
        if body.get("tools").is_some() {
            map.insert("tools".into(), AdapterUtils::redact_count(body.get("tools"), "tools"));
        }
    }
    redacted
}
