use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Who has to act on a configuration error.
///
/// The scope only changes the preamble shown to the caller, so that an
/// operator knows whether to look at the service environment or at the
/// client-side model settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    /// Secrets, environment defaults or the registry document.
    Service,
    /// Per-model fields chosen by whoever picked the model.
    Client,
}

impl ConfigScope {
    pub fn preamble(self) -> &'static str {
        match self {
            ConfigScope::Service => "Service configuration error, check your .env file.",
            ConfigScope::Client => "Client configuration error, check your model settings.",
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{message}")]
    Configuration { scope: ConfigScope, message: String },

    #[error("{0}")]
    ModelNotFound(String),

    #[error("Missing 'model' field in request")]
    MissingModel,

    #[error("Invalid or missing service API key")]
    Unauthorized,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Upstream Error: {0}")]
    Upstream(String),

    /// The downstream consumer went away while chunks were still being produced.
    #[error("Client closed connection during streaming response")]
    ClientClosed,

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn service_config(message: impl Into<String>) -> Self {
        GatewayError::Configuration {
            scope: ConfigScope::Service,
            message: message.into(),
        }
    }

    pub fn client_config(message: impl Into<String>) -> Self {
        GatewayError::Configuration {
            scope: ConfigScope::Client,
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, GatewayError::Configuration { .. })
    }

    /// Plain-text rendering of a configuration error: preamble, blank line,
    /// then the message with every line tab-indented.
    pub fn configuration_content(scope: ConfigScope, message: &str) -> String {
        format!("{}\n\n\t{}", scope.preamble(), message.replace('\n', "\n\t"))
    }
}

fn invalid_request(message: String, param: Option<&str>, code: Option<&str>) -> Response {
    let body = Json(json!({
        "error": {
            "message": message,
            "type": "invalid_request_error",
            "param": param,
            "code": code,
        }
    }));
    (StatusCode::BAD_REQUEST, body).into_response()
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            GatewayError::Configuration { scope, message } => (
                StatusCode::BAD_REQUEST,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                GatewayError::configuration_content(scope, &message),
            )
                .into_response(),
            GatewayError::ModelNotFound(_) => {
                invalid_request(message, Some("model"), Some("model_not_found"))
            }
            GatewayError::MissingModel => invalid_request(message, Some("model"), None),
            GatewayError::Unauthorized => invalid_request(message, None, Some("invalid_api_key")),
            GatewayError::BadRequest(_) => invalid_request(message, None, None),
            GatewayError::Upstream(_) => gateway_error(StatusCode::BAD_GATEWAY, message),
            GatewayError::ClientClosed | GatewayError::Internal(_) => {
                gateway_error(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

fn gateway_error(status: StatusCode, message: String) -> Response {
    let body = Json(json!({
        "error": {
            "message": message,
            "type": "gateway_error",
            "code": null
        }
    }));
    (status, body).into_response()
}

impl From<reqwest::Error> for GatewayError {
    /// Transport-level failures talking to an upstream. Non-success statuses
    /// never get here, the adapters turn those into diagnostic reports.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Upstream("Request timeout - backend service did not respond in time".to_string())
        } else if err.is_connect() {
            GatewayError::Upstream(format!("Connection failed - unable to reach backend service: {}", err))
        } else if err.is_builder() {
            GatewayError::Internal(format!("Invalid upstream request: {}", err))
        } else {
            GatewayError::Upstream(format!("HTTP client error: {}", err))
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::BadRequest(format!("JSON error: {}", err))
    }
}
