//! # Server Module
//!
//! The thin HTTP host around the adapters: health and model listing routes,
//! with every other path treated as a chat completions call.

pub mod auth;
pub mod handlers;
pub mod state;

// Re-export commonly used server types
pub use handlers::{forward_chat, health_check, list_models};
pub use state::AppState;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

/// Create router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check, unauthenticated
        .route("/health", get(health_check))

        // Model listing under both paths clients commonly probe
        .route("/models", get(list_models))
        .route("/v1/models", get(list_models))

        // Everything else is a chat completion
        .fallback(forward_chat)

        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
            ),
        )
        .with_state(state)
}
