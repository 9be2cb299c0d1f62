//! # Server Handlers
//!
//! HTTP route handlers: health, model listing, and the chat forwarding
//! fallback that resolves the model and hands the request to its adapter.

use super::{auth::authorize, AppState};
use crate::{
    adapters::{AdapterFactory, AdapterUtils},
    error::GatewayError,
    schemas::ChatCompletionRequest,
    Result,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Fixed creation time reported for every listed model.
const MODEL_CREATED: i64 = 1686935002;

/// Health check handler
pub async fn health_check() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Registry contents in document order.
pub async fn list_models(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>> {
    authorize(&headers, &state.service_api_key)?;

    let data: Vec<Value> = state
        .registry
        .list_names()
        .iter()
        .map(|name| {
            json!({
                "id": name,
                "object": "model",
                "created": MODEL_CREATED,
                "owned_by": "system",
            })
        })
        .collect();

    Ok(Json(json!({"object": "list", "data": data})))
}

/// Chat completions handler, mounted as the router fallback so clients may
/// use whatever path their SDK defaults to.
pub async fn forward_chat(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    authorize(&headers, &state.service_api_key)?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::BadRequest(format!("Request body must be a JSON object: {}", e)))?;
    state.recorder().record(&payload, "downstream_request").await;

    if state.log_context {
        info!(request = %context_summary(&headers, &payload), "Inbound request");
    }

    let request: ChatCompletionRequest = serde_json::from_value(payload)?;
    let model = request.model.as_deref().ok_or(GatewayError::MissingModel)?;
    let config = state.registry.lookup(model)?.clone();

    let adapter = AdapterFactory::create(config, &state.context);
    debug!(model, adapter = adapter.name(), "Forwarding chat completion");

    adapter.forward(&request, &headers).await
}

/// Request summary safe for logs: credentials masked, conversation and
/// tools reduced to counts.
pub fn context_summary(headers: &HeaderMap, payload: &Value) -> Value {
    let headers: serde_json::Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>");
            let shown = if is_credential_header(name.as_str()) {
                AdapterUtils::mask_secret(value)
            } else {
                value.to_string()
            };
            (name.to_string(), Value::String(shown))
        })
        .collect();

    let mut body = payload.clone();
    if let Some(map) = body.as_object_mut() {
        for (field, noun) in [("messages", "messages"), ("tools", "tools")] {
            if map.contains_key(field) {
                map.insert(field.into(), AdapterUtils::redact_count(payload.get(field), noun));
            }
        }
    }

    json!({"headers": headers, "body": body})
}

fn is_credential_header(name: &str) -> bool {
    name == header::AUTHORIZATION.as_str() || name.contains("api-key") || name.contains("token")
}
