//! # Credentials
//!
//! Upstream secrets are injected into the adapters through a
//! [`CredentialProvider`] instead of being read from the process environment
//! at translation time, so request translation stays a function of its inputs.

use crate::config::Config;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// `api-key` header for Azure, bearer token for pass-through models
    AzureApiKey,
    AnthropicApiKey,
}

impl CredentialKind {
    /// Environment variable an operator sets to provide this secret.
    pub fn env_var(self) -> &'static str {
        match self {
            CredentialKind::AzureApiKey => "AZURE_API_KEY",
            CredentialKind::AnthropicApiKey => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.env_var())
    }
}

pub trait CredentialProvider: Send + Sync + fmt::Debug {
    /// Returns `None` when the secret is not configured.
    fn credential(&self, kind: CredentialKind) -> Option<String>;
}

/// Secrets read from the parsed [`Config`] once at startup.
#[derive(Clone)]
pub struct EnvCredentials {
    azure_api_key: Option<String>,
    anthropic_api_key: Option<String>,
}

impl EnvCredentials {
    pub fn from_config(config: &Config) -> Self {
        Self {
            azure_api_key: non_empty(config.azure_api_key.as_deref()),
            anthropic_api_key: non_empty(config.anthropic_api_key.as_deref()),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvCredentials")
            .field("azure_api_key", &self.azure_api_key.as_ref().map(|_| "***"))
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl CredentialProvider for EnvCredentials {
    fn credential(&self, kind: CredentialKind) -> Option<String> {
        match kind {
            CredentialKind::AzureApiKey => self.azure_api_key.clone(),
            CredentialKind::AnthropicApiKey => self.anthropic_api_key.clone(),
        }
    }
}

/// Fixed secrets, handy in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    secrets: HashMap<CredentialKind, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: CredentialKind, secret: impl Into<String>) -> Self {
        self.secrets.insert(kind, secret.into());
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn credential(&self, kind: CredentialKind) -> Option<String> {
        self.secrets.get(&kind).cloned()
    }
}
