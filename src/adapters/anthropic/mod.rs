//! # Anthropic Adapter
//!
//! Serves `anthropic` models. The default Messages protocol talks to
//! `/v1/messages` (Anthropic directly, or an Azure Foundry base URL); the
//! `responses` sub-protocol flattens the conversation into one transcript and
//! reuses the Responses-style stream decoding.

pub mod request;
pub mod responses_request;
pub mod stream;

pub use stream::MessagesEventHandler;

use crate::{
    adapters::azure::ResponsesEventHandler,
    adapters::base::{AdapterContext, AdapterTrait, UpstreamRequest},
    credentials::CredentialKind,
    error::GatewayError,
    registry::{ApiFormat, ModelConfig},
    schemas::ChatCompletionRequest,
    streaming::StreamTranslator,
    Result,
};
use axum::http::HeaderMap;
use serde_json::Value;

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    config: ModelConfig,
    context: AdapterContext,
}

impl AnthropicAdapter {
    pub fn new(config: ModelConfig, context: AdapterContext) -> Self {
        Self { config, context }
    }

    pub fn api_format(&self) -> ApiFormat {
        self.config.api_format
    }

    fn messages_request(&self, request: &ChatCompletionRequest, api_key: &str) -> Result<UpstreamRequest> {
        let url = format!("{}/v1/messages", self.config.base_url().unwrap_or(ANTHROPIC_API_URL));

        UpstreamRequest::post(url, request::build_body(request, &self.config))
            .header("x-api-key", api_key)?
            .header("anthropic-version", ANTHROPIC_VERSION)?
            .header("content-type", "application/json")
    }

    fn responses_request(&self, request: &ChatCompletionRequest, api_key: &str) -> Result<UpstreamRequest> {
        let base_url = self.config.base_url().ok_or_else(|| {
            GatewayError::service_config(
                "base_url must be set for Responses API (e.g., \
                 https://xxx.services.ai.azure.com/api/projects/xxx/openai)",
            )
        })?;

        UpstreamRequest::post(
            format!("{}/responses", base_url),
            responses_request::build_body(request, &self.config),
        )
        .header("authorization", &format!("Bearer {}", api_key))?
        .header("content-type", "application/json")
    }
}

#[async_trait::async_trait]
impl AdapterTrait for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn model_config(&self) -> &ModelConfig {
        &self.config
    }

    fn context(&self) -> &AdapterContext {
        &self.context
    }

    fn translate_request(&self, request: &ChatCompletionRequest, _headers: &HeaderMap) -> Result<UpstreamRequest> {
        let api_key = self.context.require(CredentialKind::AnthropicApiKey)?;
        match self.config.api_format {
            ApiFormat::Messages => self.messages_request(request, &api_key),
            ApiFormat::Responses => self.responses_request(request, &api_key),
        }
    }

    fn stream_translator(&self) -> StreamTranslator {
        let model = self.config.name.clone();
        match self.config.api_format {
            ApiFormat::Messages => StreamTranslator::new(model, MessagesEventHandler::new()),
            ApiFormat::Responses => StreamTranslator::new(model, ResponsesEventHandler::new()),
        }
    }

    fn redact_request_body(&self, body: &Value) -> Value {
        match self.config.api_format {
            ApiFormat::Messages => request::redact(body),
            ApiFormat::Responses => responses_request::redact(body),
        }
    }
}
