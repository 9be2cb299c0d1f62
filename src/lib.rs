//! # Chatgate - Chat Completions Gateway
//!
//! Exposes one OpenAI-compatible chat completions endpoint and serves each
//! logical model from whichever upstream the model registry assigns to it.
//! Requests are translated into the upstream's dialect and the upstream's
//! token stream is translated back into canonical `chat.completion.chunk`
//! Server-Sent Events as it arrives.
//!
//! ## Features
//!
//! - **Responses-style upstreams**: Azure OpenAI Responses API
//! - **Messages-style upstreams**: Anthropic Messages API, direct or through Azure Foundry
//! - **Pass-through upstreams**: OpenAI-compatible deployments such as Kimi
//! - **Redacted diagnostics**: refused upstream calls come back with a report
//!   that never contains the prompt
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatgate::{create_router, AppState, Config, ModelRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::for_test(); // or Config::parse_args() for CLI
//!     let registry = ModelRegistry::load(&config.model_config_path)?;
//!     let app = create_router(AppState::new(&config, registry)?);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`registry`] - logical model name → backend configuration
//! - [`adapters`] - per-backend request translation and forwarding
//! - [`streaming`] - upstream byte stream → canonical chunks → SSE
//! - [`server`] - HTTP routes, auth and shared state
//! - [`config`] - CLI and environment configuration
//! - [`error`] - error type and its client-facing rendering

// Core infrastructure
pub mod core;
pub mod config;
pub mod credentials;
pub mod error;
pub mod recording;
pub mod schemas;

// Domain modules
pub mod adapters;
pub mod registry;
pub mod server;
pub mod streaming;

// Re-export commonly used types for convenience
pub use adapters::{Adapter, AdapterContext, AdapterFactory, AdapterTrait};
pub use config::{Config, UpstreamSettings};
pub use core::http_client::{HttpClientBuilder, HttpClientConfig};
pub use credentials::{CredentialKind, CredentialProvider, EnvCredentials, StaticCredentials};
pub use error::{ConfigScope, GatewayError};
pub use recording::TrafficRecorder;
pub use registry::{Backend, ModelConfig, ModelRegistry};
pub use schemas::{ChatCompletionChunk, ChatCompletionRequest, Message, Role};
pub use server::{create_router, AppState};
pub use streaming::StreamTranslator;

/// The result type used throughout the library
pub type Result<T> = std::result::Result<T, GatewayError>;
