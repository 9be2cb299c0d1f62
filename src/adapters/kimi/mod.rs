//! # Kimi Adapter
//!
//! Pass-through adapter for OpenAI-compatible chat completion deployments
//! (Kimi on Azure AI Foundry). The request body is forwarded nearly as-is
//! and the upstream stream is re-tagged with the gateway's own ids.

pub mod request;
pub mod stream;

pub use stream::ChatCompletionsEventHandler;

use crate::{
    adapters::base::{AdapterContext, AdapterTrait, UpstreamRequest},
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
pub struct KimiAdapter {
    config: ModelConfig,
    context: AdapterContext,
}

impl KimiAdapter {
    pub fn new(config: ModelConfig, context: AdapterContext) -> Self {
        Self { config, context }
    }
}

#[async_trait::async_trait]
impl AdapterTrait for KimiAdapter {
    fn name(&self) -> &'static str {
        "kimi"
    }

    fn model_config(&self) -> &ModelConfig {
        &self.config
    }

    fn context(&self) -> &AdapterContext {
        &self.context
    }

    fn translate_request(&self, request: &ChatCompletionRequest, _headers: &HeaderMap) -> Result<UpstreamRequest> {
        let api_key = self.context.require(CredentialKind::AzureApiKey)?;
        let base_url = self.config.base_url().ok_or_else(|| {
            GatewayError::service_config(
                "base_url must be set for Kimi models (e.g., \
                 https://xxx.cognitiveservices.azure.com/openai/deployments/Kimi-K2-Thinking)",
            )
        })?;
        let url = format!("{}/chat/completions?api-version={}", base_url, request::API_VERSION);

        UpstreamRequest::post(url, request::build_body(request, &self.config)?)
            .header("authorization", &format!("Bearer {}", api_key))?
            .header("content-type", "application/json")
    }

    fn stream_translator(&self) -> StreamTranslator {
        StreamTranslator::new(self.config.name.clone(), ChatCompletionsEventHandler::new())
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

    fn adapter(base_url: Option<&str>) -> KimiAdapter {
        let mut entry = ModelEntry::new("kimi", "Kimi-K2-Thinking");
        entry.base_url = base_url.map(str::to_string);
        KimiAdapter::new(
            ModelConfig::new("kimi-k2", entry).unwrap(),
            AdapterContext::with_credentials(
                UpstreamSettings::default(),
                StaticCredentials::new().with(CredentialKind::AzureApiKey, "az-key"),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_endpoint_and_bearer() {
        let upstream = adapter(Some("https://k.cognitiveservices.azure.com/openai/deployments/Kimi-K2-Thinking/"))
            .translate_request(&ChatCompletionRequest::default(), &HeaderMap::new())
            .unwrap();
        assert_eq!(
            upstream.url,
            "https://k.cognitiveservices.azure.com/openai/deployments/Kimi-K2-Thinking/chat/completions?api-version=2024-05-01-preview"
        );
        assert_eq!(upstream.headers["authorization"], "Bearer az-key");
    }

    #[test]
    fn test_base_url_required() {
        let err = adapter(None)
            .translate_request(&ChatCompletionRequest::default(), &HeaderMap::new())
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().starts_with("base_url must be set for Kimi models"));
    }
}
