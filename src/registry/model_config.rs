//! # Model Configuration
//!
//! One backend's connection and behaviour parameters for one logical model
//! name. Built once at startup from the registry document and read-only after.

use crate::error::GatewayError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Upstream API family a model is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Azure OpenAI Responses API
    Azure,
    /// Anthropic Messages API (direct or through a compatible base URL)
    Anthropic,
    /// OpenAI-compatible chat completions, forwarded mostly as-is
    Kimi,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Azure, Backend::Anthropic, Backend::Kimi];

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Azure => "azure",
            Backend::Anthropic => "anthropic",
            Backend::Kimi => "kimi",
        }
    }

    pub fn supported() -> String {
        Self::ALL.iter().map(|b| b.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| {
                GatewayError::service_config(format!(
                    "Unsupported backend: {}. Supported backends: {}",
                    s,
                    Self::supported()
                ))
            })
    }
}

/// Wire protocol spoken to an `anthropic` backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    #[default]
    Messages,
    Responses,
}

/// One entry of the registry document, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelEntry {
    pub backend: String,
    pub api_model: String,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
    #[serde(default)]
    pub deployment_name: Option<String>,
    #[serde(default)]
    pub summary_level: Option<String>,
    #[serde(default)]
    pub verbosity_level: Option<String>,
    #[serde(default)]
    pub truncation_strategy: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub thinking_budget: Option<u32>,
    #[serde(default)]
    pub api_format: Option<ApiFormat>,
    #[serde(default)]
    pub extra: Option<Map<String, Value>>,
}

impl ModelEntry {
    pub fn new(backend: impl Into<String>, api_model: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            api_model: api_model.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    pub backend: Backend,
    pub api_model: String,

    // Responses-style
    pub reasoning_effort: Option<String>,
    pub deployment_name: Option<String>,
    pub summary_level: Option<String>,
    pub verbosity_level: Option<String>,
    pub truncation_strategy: Option<String>,

    // Messages-style and pass-through
    pub max_tokens: Option<u32>,
    pub base_url: Option<String>,
    pub thinking_budget: Option<u32>,
    pub api_format: ApiFormat,

    pub extra: Option<Map<String, Value>>,
}

impl ModelConfig {
    /// Validate an entry and bind it to its logical name.
    pub fn new(name: impl Into<String>, entry: ModelEntry) -> Result<Self, GatewayError> {
        let backend = entry.backend.parse::<Backend>()?;

        if entry.api_model.trim().is_empty() {
            return Err(GatewayError::service_config("api_model must not be empty"));
        }

        if let Some(base_url) = &entry.base_url {
            let parsed = Url::parse(base_url)
                .map_err(|e| GatewayError::service_config(format!("Invalid base_url '{}': {}", base_url, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(GatewayError::service_config(format!(
                    "base_url must start with http:// or https://, got '{}'",
                    base_url
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            backend,
            api_model: entry.api_model,
            reasoning_effort: entry.reasoning_effort,
            deployment_name: entry.deployment_name,
            summary_level: entry.summary_level,
            verbosity_level: entry.verbosity_level,
            truncation_strategy: entry.truncation_strategy,
            max_tokens: entry.max_tokens,
            base_url: entry.base_url,
            thinking_budget: entry.thinking_budget,
            api_format: entry.api_format.unwrap_or_default(),
            extra: entry.extra,
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref().map(|url| url.trim_end_matches('/'))
    }
}
