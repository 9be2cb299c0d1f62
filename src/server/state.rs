//! # Application State
//!
//! Shared state passed to all HTTP handlers: the read-only model registry
//! and the adapter context every per-request adapter is built from.

use crate::{
    adapters::AdapterContext,
    config::Config,
    core::http_client::{HttpClientBuilder, HttpClientError},
    credentials::EnvCredentials,
    recording::TrafficRecorder,
    registry::ModelRegistry,
};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub context: AdapterContext,
    /// Bearer token clients must present
    pub service_api_key: Arc<str>,
    /// Log a redacted summary of every inbound request
    pub log_context: bool,
}

impl AppState {
    /// Build state from configuration: one pooled client, secrets from the
    /// environment, and traffic recording when enabled.
    pub fn new(config: &Config, registry: ModelRegistry) -> Result<Self, HttpClientError> {
        let client = HttpClientBuilder::from_config(config).build()?;
        let context = AdapterContext::new(
            client,
            config.upstream_settings(),
            Arc::new(EnvCredentials::from_config(config)),
            Arc::new(TrafficRecorder::new(config.record_traffic, config.recordings_dir.clone())),
        );

        Ok(Self::with_context(
            registry,
            context,
            config.service_api_key.as_str(),
            config.log_context,
        ))
    }

    pub fn with_context(
        registry: ModelRegistry,
        context: AdapterContext,
        service_api_key: &str,
        log_context: bool,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            context,
            service_api_key: Arc::from(service_api_key),
            log_context,
        }
    }

    pub fn recorder(&self) -> &TrafficRecorder {
        &self.context.recorder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_creation() {
        let registry = ModelRegistry::from_yaml_str("models:\n  gpt:\n    backend: azure\n    api_model: gpt-5\n").unwrap();
        let state = AppState::new(&Config::for_test(), registry).unwrap();

        assert_eq!(state.registry.list_names(), ["gpt".to_string()]);
        assert_eq!(&*state.service_api_key, "test-service-key");
        assert!(!state.recorder().is_enabled());
        assert_eq!(
            state.context.settings.azure_responses_url().as_deref(),
            Some("https://test-resource.openai.azure.com/openai/responses?api-version=2025-04-01-preview")
        );
    }
}
