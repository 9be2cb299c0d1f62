//! # Backend Adapters Module
//!
//! One adapter per upstream API family. Each adapter owns the request
//! translation for its backend, knows how to decode the backend's stream,
//! and shares the forward flow defined in [`base::AdapterTrait`].
//!
//! ## Supported Backends:
//!
//! - **azure**: Azure OpenAI Responses API
//! - **anthropic**: Anthropic Messages API, or the Responses sub-protocol
//!   when the model sets `api_format: responses`
//! - **kimi**: OpenAI-compatible chat completions, passed through

use crate::{
    registry::{Backend, ModelConfig, ModelEntry},
    schemas::ChatCompletionRequest,
    Result,
};
use axum::{http::HeaderMap, response::Response};

// Base adapter functionality
pub mod base;

// Individual adapter modules
pub mod anthropic;
pub mod azure;
pub mod kimi;

pub use anthropic::AnthropicAdapter;
pub use azure::AzureAdapter;
pub use kimi::KimiAdapter;

pub use base::{AdapterContext, AdapterTrait, AdapterUtils, UpstreamRequest};

/// # Adapter Enum
///
/// Closed set of backend adapters. A fresh adapter is built for every
/// request, so no state is shared between concurrent calls beyond the
/// read-only [`AdapterContext`].
#[derive(Clone, Debug)]
pub enum Adapter {
    Azure(AzureAdapter),
    Anthropic(AnthropicAdapter),
    Kimi(KimiAdapter),
}

impl Adapter {
    fn inner(&self) -> &dyn AdapterTrait {
        match self {
            Self::Azure(adapter) => adapter,
            Self::Anthropic(adapter) => adapter,
            Self::Kimi(adapter) => adapter,
        }
    }

    /// Get adapter name for logging
    pub fn name(&self) -> &'static str {
        self.inner().name()
    }

    pub fn model_config(&self) -> &ModelConfig {
        self.inner().model_config()
    }

    pub fn backend(&self) -> Backend {
        self.model_config().backend
    }

    /// Forward a chat completion request and return the streaming response
    /// (or the upstream diagnostic report).
    pub async fn forward(&self, request: &ChatCompletionRequest, headers: &HeaderMap) -> Result<Response> {
        self.inner().forward(request, headers).await
    }
}

/// Builds the adapter matching a model's backend tag.
pub struct AdapterFactory;

impl AdapterFactory {
    pub fn create(config: ModelConfig, context: &AdapterContext) -> Adapter {
        let context = context.clone();
        match config.backend {
            Backend::Azure => Adapter::Azure(AzureAdapter::new(config, context)),
            Backend::Anthropic => Adapter::Anthropic(AnthropicAdapter::new(config, context)),
            Backend::Kimi => Adapter::Kimi(KimiAdapter::new(config, context)),
        }
    }

    /// Validate an unchecked registry entry, then build its adapter. An
    /// unknown backend tag is a configuration error naming the supported set.
    pub fn from_entry(name: &str, entry: ModelEntry, context: &AdapterContext) -> Result<Adapter> {
        let config = ModelConfig::new(name, entry)?;
        Ok(Self::create(config, context))
    }
}
