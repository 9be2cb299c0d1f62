//! # Azure Responses Adapter
//!
//! Serves `azure` models through the Azure OpenAI Responses API: system and
//! developer messages become `instructions`, the rest become typed input
//! items, and the `response.*` event stream is mapped back onto canonical
//! chunks.

pub mod request;
pub mod stream;

pub use stream::ResponsesEventHandler;

use crate::{
    adapters::base::{AdapterContext, AdapterTrait, AdapterUtils, UpstreamRequest},
    credentials::CredentialKind,
    error::GatewayError,
    registry::ModelConfig,
    schemas::ChatCompletionRequest,
    streaming::StreamTranslator,
    Result,
};
use axum::http::HeaderMap;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct AzureAdapter {
    config: ModelConfig,
    context: AdapterContext,
}

impl AzureAdapter {
    pub fn new(config: ModelConfig, context: AdapterContext) -> Self {
        Self { config, context }
    }
}

#[async_trait::async_trait]
impl AdapterTrait for AzureAdapter {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn model_config(&self) -> &ModelConfig {
        &self.config
    }

    fn context(&self) -> &AdapterContext {
        &self.context
    }

    fn translate_request(&self, request: &ChatCompletionRequest, headers: &HeaderMap) -> Result<UpstreamRequest> {
        let api_key = self.context.require(CredentialKind::AzureApiKey)?;
        let url = self
            .context
            .settings
            .azure_responses_url()
            .ok_or_else(|| GatewayError::service_config("AZURE_BASE_URL not set in environment"))?;

        let body = request::build_body(request, &self.config, &self.context.settings)?;

        UpstreamRequest::post(url, body)
            .with_headers(AdapterUtils::forwardable_headers(headers))
            .header("api-key", &api_key)
    }

    fn stream_translator(&self) -> StreamTranslator {
        StreamTranslator::new(self.config.name.clone(), ResponsesEventHandler::new())
    }

    fn redact_request_body(&self, body: &Value) -> Value {
        request::redact(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamSettings;
    use crate::credentials::StaticCredentials;
    use crate::registry::ModelEntry;
    use crate::schemas::{Message, Role};
    use axum::http::HeaderValue;

    fn adapter(settings: UpstreamSettings, credentials: StaticCredentials) -> AzureAdapter {
        let mut entry = ModelEntry::new("azure", "gpt-5");
        entry.reasoning_effort = Some("medium".into());
        let config = ModelConfig::new("gpt-medium", entry).unwrap();
        AzureAdapter::new(config, AdapterContext::with_credentials(settings, credentials).unwrap())
    }

    fn settings() -> UpstreamSettings {
        UpstreamSettings {
            azure_base_url: Some("https://res.openai.azure.com/".into()),
            ..Default::default()
        }
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: Some("gpt-medium".into()),
            messages: vec![Message::new(Role::User, "Hi")],
            ..Default::default()
        }
    }

    #[test]
    fn test_translate_targets_responses_endpoint() {
        let adapter = adapter(
            settings(),
            StaticCredentials::new().with(CredentialKind::AzureApiKey, "az-key"),
        );
        let mut inbound = HeaderMap::new();
        inbound.insert("authorization", HeaderValue::from_static("Bearer gateway"));
        inbound.insert("x-trace", HeaderValue::from_static("t1"));

        let upstream = adapter.translate_request(&request(), &inbound).unwrap();
        assert_eq!(
            upstream.url,
            "https://res.openai.azure.com/openai/responses?api-version=2025-04-01-preview"
        );
        assert_eq!(upstream.headers["api-key"], "az-key");
        assert_eq!(upstream.headers["x-trace"], "t1");
        assert!(upstream.headers.get("authorization").is_none());
        assert_eq!(upstream.body["reasoning"]["effort"], "medium");
    }

    #[test]
    fn test_missing_key_is_service_error() {
        let adapter = adapter(settings(), StaticCredentials::new());
        let err = adapter.translate_request(&request(), &HeaderMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "AZURE_API_KEY not set in environment");
    }

    #[test]
    fn test_missing_base_url_is_service_error() {
        let adapter = adapter(
            UpstreamSettings::default(),
            StaticCredentials::new().with(CredentialKind::AzureApiKey, "az-key"),
        );
        let err = adapter.translate_request(&request(), &HeaderMap::new()).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "AZURE_BASE_URL not set in environment");
    }
}
