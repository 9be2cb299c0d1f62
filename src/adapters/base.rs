//! # Base Adapter Functionality
//!
//! Common functionality and traits shared across all backend adapters:
//! the upstream call descriptor, the injected per-process context, the
//! forward flow every backend follows, and the diagnostic report returned
//! when an upstream refuses a request.

use crate::{
    config::UpstreamSettings,
    core::http_client::{HttpClientBuilder, HttpClientError},
    credentials::{CredentialKind, CredentialProvider},
    error::GatewayError,
    recording::TrafficRecorder,
    registry::ModelConfig,
    schemas::{ChatCompletionRequest, MessageContent},
    streaming::{self, StreamTranslator},
    Result,
};
use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, warn};

/// Everything needed to perform one upstream call.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Value,
}

impl UpstreamRequest {
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Add a header, rejecting values that cannot be sent on the wire.
    pub fn header(mut self, name: &'static str, value: &str) -> Result<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|_| GatewayError::service_config(format!("Invalid value for header '{}'", name)))?;
        self.headers.insert(HeaderName::from_static(name), value);
        Ok(self)
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Process-wide collaborators shared by every adapter instance.
#[derive(Clone)]
pub struct AdapterContext {
    pub client: reqwest::Client,
    pub settings: Arc<UpstreamSettings>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub recorder: Arc<TrafficRecorder>,
}

impl AdapterContext {
    pub fn new(
        client: reqwest::Client,
        settings: Arc<UpstreamSettings>,
        credentials: Arc<dyn CredentialProvider>,
        recorder: Arc<TrafficRecorder>,
    ) -> Self {
        Self {
            client,
            settings,
            credentials,
            recorder,
        }
    }

    /// Context with a default client and no recording.
    pub fn with_credentials(
        settings: UpstreamSettings,
        credentials: impl CredentialProvider + 'static,
    ) -> std::result::Result<Self, HttpClientError> {
        Ok(Self::new(
            HttpClientBuilder::new().build()?,
            Arc::new(settings),
            Arc::new(credentials),
            Arc::new(TrafficRecorder::disabled()),
        ))
    }

    /// Fetch a secret, failing with a service configuration error when unset.
    pub fn require(&self, kind: CredentialKind) -> Result<String> {
        self.credentials
            .credential(kind)
            .ok_or_else(|| GatewayError::service_config(format!("{} not set in environment", kind)))
    }
}

impl std::fmt::Debug for AdapterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterContext")
            .field("settings", &self.settings)
            .field("credentials", &self.credentials)
            .field("recording", &self.recorder.is_enabled())
            .finish()
    }
}

/// Base adapter trait that all backend adapters implement
#[async_trait::async_trait]
pub trait AdapterTrait: Send + Sync {
    /// Get the adapter name for logging
    fn name(&self) -> &'static str;

    fn model_config(&self) -> &ModelConfig;

    fn context(&self) -> &AdapterContext;

    /// Build the upstream call for a canonical request.
    fn translate_request(&self, request: &ChatCompletionRequest, headers: &HeaderMap) -> Result<UpstreamRequest>;

    /// Fresh stream state for one response.
    fn stream_translator(&self) -> StreamTranslator;

    /// Copy of the upstream body that is safe to show in an error report.
    fn redact_request_body(&self, body: &Value) -> Value;

    /// Translate, call upstream, then either stream the translated response
    /// or return the redacted diagnostic report.
    async fn forward(&self, request: &ChatCompletionRequest, headers: &HeaderMap) -> Result<Response> {
        let config = self.model_config();
        let upstream = self.translate_request(request, headers)?;

        AdapterUtils::log_request(self.name(), &config.name, request.messages.len());
        self.context().recorder.record(&upstream.body, "upstream_request").await;

        let start_time = Instant::now();
        let response = self
            .context()
            .client
            .request(upstream.method.clone(), upstream.url.as_str())
            .headers(upstream.headers.clone())
            .json(&upstream.body)
            .send()
            .await?;

        let status = response.status();
        let response_time = start_time.elapsed().as_millis() as u64;
        AdapterUtils::log_response(self.name(), &config.name, status.is_success(), response_time);

        if !status.is_success() {
            let upstream_response = AdapterUtils::read_error_body(response).await;
            let redacted = self.redact_request_body(&upstream.body);
            return Ok(AdapterUtils::error_report(
                self.name(),
                &upstream.url,
                status,
                upstream_response,
                redacted,
            ));
        }

        Ok(streaming::sse_response(
            response,
            self.stream_translator(),
            self.context().settings.log_completion,
        ))
    }
}

/// Inbound headers that never travel upstream.
const HOP_HEADERS: [&str; 5] = ["host", "authorization", "content-length", "transfer-encoding", "connection"];

fn endpoint_mask() -> &'static Regex {
    static MASK: OnceLock<Regex> = OnceLock::new();
    MASK.get_or_init(|| Regex::new(r"(//.)(.*?)(.\.)").expect("valid endpoint pattern"))
}

fn secret_mask() -> &'static Regex {
    static MASK: OnceLock<Regex> = OnceLock::new();
    MASK.get_or_init(|| Regex::new(r"^(...)(.*)(...)$").expect("valid secret pattern"))
}

/// Utility functions for adapters
pub struct AdapterUtils;

impl AdapterUtils {
    /// Inbound headers minus host, auth and framing headers.
    pub fn forwardable_headers(inbound: &HeaderMap) -> HeaderMap {
        let mut headers = inbound.clone();
        for name in HOP_HEADERS {
            headers.remove(name);
        }
        headers
    }

    /// Concatenated text parts of optional message content.
    pub fn content_text(content: Option<&MessageContent>) -> String {
        content.map(MessageContent::text).unwrap_or_default()
    }

    /// `//x***e.` style masking of the host part of an endpoint.
    pub fn mask_endpoint(url: &str) -> String {
        endpoint_mask().replace(url, "${1}***${3}").into_owned()
    }

    /// Keep the first and last three characters of a secret-ish value.
    pub fn mask_secret(value: &str) -> String {
        secret_mask().replace(value, "${1}***${3}").into_owned()
    }

    /// First 16 characters followed by an ellipsis.
    pub fn preview(text: &str) -> String {
        let head: String = text.chars().take(16).collect();
        format!("{}...", head)
    }

    /// Replace an array (or string) with a count of what it held.
    pub fn redact_count(value: Option<&Value>, noun: &str) -> Value {
        let count = match value {
            Some(Value::Array(items)) => items.len(),
            Some(Value::String(text)) => text.chars().count(),
            Some(Value::Object(map)) => map.len(),
            _ => 0,
        };
        Value::String(format!("...redacted {} {}...", count, noun))
    }

    /// Upstream error body as JSON when it parses, else as text.
    pub async fn read_error_body(response: reqwest::Response) -> Value {
        match response.text().await {
            Ok(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            Err(err) => Value::String(format!("<failed to read upstream body: {}>", err)),
        }
    }

    /// Diagnostic response for a refused upstream call. The status is passed
    /// through except 401, which becomes 400 so clients do not mistake it for
    /// a problem with their gateway key.
    pub fn error_report(
        adapter_name: &str,
        url: &str,
        status: reqwest::StatusCode,
        upstream_response: Value,
        request_body: Value,
    ) -> Response {
        let upstream_status = status.as_u16();
        let client_status = match upstream_status {
            401 => StatusCode::BAD_REQUEST,
            code => StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY),
        };

        warn!(
            adapter = adapter_name,
            status = upstream_status,
            upstream_response = %upstream_response,
            "Upstream request failed"
        );

        let body = json!({
            "error": {
                "message": format!(
                    "{} upstream request failed with status code {}, check \"report.upstream_response\" for details",
                    adapter_name, upstream_status
                ),
                "type": "upstream_error",
                "code": upstream_status,
            },
            "report": {
                "endpoint": Self::mask_endpoint(url),
                "upstream_status_code": upstream_status,
                "upstream_response": upstream_response,
                "request_body": request_body,
            }
        });

        (client_status, Json(body)).into_response()
    }

    /// Log adapter request for debugging
    pub fn log_request(adapter_name: &str, model: &str, message_count: usize) {
        debug!(
            adapter = adapter_name,
            model = model,
            message_count = message_count,
            "Processing chat completion request"
        );
    }

    /// Log adapter response for debugging
    pub fn log_response(adapter_name: &str, model: &str, success: bool, response_time_ms: u64) {
        debug!(
            adapter = adapter_name,
            model = model,
            success = success,
            response_time_ms = response_time_ms,
            "Upstream responded"
        );
    }
}
