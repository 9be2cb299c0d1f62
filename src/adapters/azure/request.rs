//! Canonical request → Azure Responses API body.

use crate::{
    adapters::base::AdapterUtils,
    config::UpstreamSettings,
    error::GatewayError,
    registry::ModelConfig,
    schemas::{ChatCompletionRequest, ContentPart, Message, MessageContent, Role, Tool},
    Result,
};
use serde_json::{json, Map, Value};

pub const SUMMARY_LEVELS: [&str; 3] = ["auto", "detailed", "concise"];
pub const VERBOSITY_LEVELS: [&str; 3] = ["low", "medium", "high"];
pub const TRUNCATION_STRATEGIES: [&str; 2] = ["auto", "disabled"];

/// Build the Responses API body for `request`.
pub fn build_body(request: &ChatCompletionRequest, config: &ModelConfig, settings: &UpstreamSettings) -> Result<Value> {
    let reasoning_effort = config.reasoning_effort.as_deref().ok_or_else(|| {
        GatewayError::client_config(format!(
            "Model '{}' is missing reasoning_effort configuration",
            config.name
        ))
    })?;

    let summary = resolve_policy(
        "summary_level",
        config.summary_level.as_deref(),
        &settings.summary_level,
        &SUMMARY_LEVELS,
    )?;
    let verbosity = resolve_policy(
        "verbosity_level",
        config.verbosity_level.as_deref(),
        &settings.verbosity_level,
        &VERBOSITY_LEVELS,
    )?;
    let truncation = resolve_policy(
        "truncation_strategy",
        config.truncation_strategy.as_deref(),
        &settings.truncation,
        &TRUNCATION_STRATEGIES,
    )?;

    let (instructions, input) = messages_to_input(&request.messages);

    let mut body = Map::new();
    if let Some(instructions) = instructions {
        body.insert("instructions".into(), Value::String(instructions));
    }
    body.insert("input".into(), Value::Array(input));
    body.insert(
        "model".into(),
        Value::String(config.deployment_name.clone().unwrap_or_else(|| config.api_model.clone())),
    );
    body.insert("tools".into(), Value::Array(convert_tools(request.tools.as_deref())));
    if let Some(tool_choice) = &request.tool_choice {
        body.insert("tool_choice".into(), tool_choice.clone());
    }
    if let Some(user) = &request.user {
        body.insert("prompt_cache_key".into(), Value::String(user.clone()));
    }
    body.insert("stream".into(), Value::Bool(true));
    body.insert("reasoning".into(), json!({"effort": reasoning_effort, "summary": summary}));
    if matches!(verbosity, "low" | "high") {
        body.insert("text".into(), json!({"verbosity": verbosity}));
    }
    body.insert("store".into(), Value::Bool(false));
    body.insert("stream_options".into(), json!({"include_obfuscation": false}));
    if truncation == "auto" {
        body.insert("truncation".into(), Value::String(truncation.to_string()));
    }

    Ok(Value::Object(body))
}

/// Per-model value wins over the environment default; either must belong to
/// `allowed`. A bad per-model value is the client's to fix, a bad default
/// the operator's.
fn resolve_policy<'a>(
    field: &str,
    model_value: Option<&'a str>,
    default: &'a str,
    allowed: &[&str],
) -> Result<&'a str> {
    let value = model_value.unwrap_or(default);
    if allowed.contains(&value) {
        return Ok(value);
    }

    let message = format!("{} must be either {}.\n\nGot: {}", field, either(allowed), value);
    Err(if model_value.is_some() {
        GatewayError::client_config(message)
    } else {
        GatewayError::service_config(message)
    })
}

/// "a, b, or c" / "a or b"
fn either(allowed: &[&str]) -> String {
    match allowed {
        [] => String::new(),
        [only] => only.to_string(),
        [first, second] => format!("{} or {}", first, second),
        [init @ .., last] => format!("{}, or {}", init.join(", "), last),
    }
}

/// Split messages into the instructions string and the typed input items.
pub fn messages_to_input(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut instructions = Vec::new();
    let mut input = Vec::new();

    for message in messages {
        match message.role {
            role if role.is_instruction() => instructions.push(message.text()),
            Role::Tool => input.push(json!({
                "type": "function_call_output",
                "output": message.text(),
                "status": "completed",
                "call_id": message.tool_call_id,
            })),
            role => {
                let content = convert_content(message.content.as_ref(), role);
                if !content.is_empty() {
                    input.push(json!({"role": role.as_str(), "content": content}));
                }
                for call in message.tool_calls.iter().flatten() {
                    input.push(json!({
                        "type": "function_call",
                        "name": call.function.name,
                        "arguments": call.function.arguments,
                        "call_id": call.id,
                    }));
                }
            }
        }
    }

    let instructions = (!instructions.is_empty()).then(|| instructions.join("\n\n"));
    (instructions, input)
}

fn convert_content(content: Option<&MessageContent>, role: Role) -> Vec<Value> {
    let text_type = if role == Role::User { "input_text" } else { "output_text" };

    match content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) => vec![json!({"type": text_type, "text": text})],
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text, .. } if !text.is_empty() => Some(json!({"type": text_type, "text": text})),
                ContentPart::ImageUrl { image_url, .. } if !image_url.url().is_empty() => {
                    Some(json!({"type": "input_image", "image_url": image_url.url()}))
                }
                _ => None,
            })
            .collect(),
    }
}

/// Flatten function tools into the Responses shape.
pub fn convert_tools(tools: Option<&[Tool]>) -> Vec<Value> {
    tools
        .unwrap_or_default()
        .iter()
        .filter(|tool| tool.is_function())
        .map(|tool| {
            json!({
                "type": "function",
                "name": tool.function.name,
                "description": tool.function.description,
                "parameters": tool.function.parameters,
                "strict": false,
            })
        })
        .collect()
}

/// Error-report copy of a Responses body with prompt, tools and input
/// replaced by previews and counts.
pub fn redact(body: &Value) -> Value {
    let mut redacted = body.clone();
    if let Some(map) = redacted.as_object_mut() {
        let instructions = map
            .get("instructions")
            .and_then(Value::as_str)
            .unwrap_or("no instructions")
            .to_string();
        map.insert("instructions".into(), Value::String(AdapterUtils::preview(&instructions)));
        map.insert("tools".into(), AdapterUtils::redact_count(body.get("tools"), "tools"));
        map.insert("input".into(), AdapterUtils::redact_count(body.get("input"), "input items"));
        if let Some(key) = body.get("prompt_cache_key").and_then(Value::as_str) {
            map.insert("prompt_cache_key".into(), Value::String(AdapterUtils::mask_secret(key)));
        }
    }
    redacted
}
