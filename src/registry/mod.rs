//! # Model Registry
//!
//! Maps logical model names to [`ModelConfig`]s. The registry is loaded once
//! before the server accepts requests and is shared read-only afterwards.

pub mod model_config;

pub use model_config::{ApiFormat, Backend, ModelConfig, ModelEntry};

use crate::error::GatewayError;
use serde_yaml::Value as YamlValue;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelConfig>,
    /// Document order, for stable enumeration
    names: Vec<String>,
}

impl ModelRegistry {
    /// Load the registry document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::service_config(format!(
                "Model configuration file not found: {} ({})",
                path.display(),
                e
            ))
        })?;
        let registry = Self::from_yaml_str(&source)?;
        info!(path = %path.display(), models = registry.len(), "Loaded model registry");
        Ok(registry)
    }

    /// Parse a registry document with a top-level `models` mapping.
    pub fn from_yaml_str(source: &str) -> Result<Self, GatewayError> {
        let document: YamlValue = serde_yaml::from_str(source)
            .map_err(|e| GatewayError::service_config(format!("Invalid YAML in model configuration: {}", e)))?;

        let models = document
            .as_mapping()
            .and_then(|root| root.get("models"))
            .ok_or_else(|| GatewayError::service_config("Configuration must have top-level \"models\" key"))?
            .as_mapping()
            .ok_or_else(|| GatewayError::service_config("\"models\" must be a dictionary"))?;

        let mut registry = Self::default();
        for (key, value) in models {
            let name = key
                .as_str()
                .ok_or_else(|| GatewayError::service_config(format!("Model names must be strings, got {:?}", key)))?;

            let config = serde_yaml::from_value::<ModelEntry>(value.clone())
                .map_err(|e| e.to_string())
                .and_then(|entry| ModelConfig::new(name, entry).map_err(|e| e.to_string()))
                .map_err(|e| {
                    GatewayError::service_config(format!("Invalid configuration for model '{}': {}", name, e))
                })?;

            registry.insert(config);
        }

        Ok(registry)
    }

    /// Build a registry from already validated configs.
    pub fn from_configs(configs: impl IntoIterator<Item = ModelConfig>) -> Self {
        let mut registry = Self::default();
        for config in configs {
            registry.insert(config);
        }
        registry
    }

    fn insert(&mut self, config: ModelConfig) {
        if !self.models.contains_key(&config.name) {
            self.names.push(config.name.clone());
        }
        self.models.insert(config.name.clone(), config);
    }

    pub fn lookup(&self, name: &str) -> Result<&ModelConfig, GatewayError> {
        self.models.get(name).ok_or_else(|| {
            GatewayError::ModelNotFound(format!(
                "Model '{}' is not configured. Available models: {}",
                name,
                self.names.join(", ")
            ))
        })
    }

    pub fn list_names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
