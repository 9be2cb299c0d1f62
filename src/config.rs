#[cfg(feature = "cli")]
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// # Chatgate Configuration
///
/// Command-line arguments and environment variables, with `.env` loading so
/// secrets can live next to the binary instead of in the shell history.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "chatgate"))]
#[cfg_attr(feature = "cli", command(about = "An OpenAI-compatible chat completions gateway for Responses-style, Messages-style and pass-through upstreams"))]
#[cfg_attr(feature = "cli", command(version))]
pub struct Config {
    // =============================================================================
    // CORE SERVER CONFIGURATION
    // =============================================================================

    /// Server port to listen on
    #[cfg_attr(feature = "cli", arg(short, long, env = "PORT", default_value = "8080"))]
    pub port: u16,

    /// Server host to bind to
    #[cfg_attr(feature = "cli", arg(long, env = "HOST", default_value = "0.0.0.0"))]
    pub host: String,

    /// Registry document mapping logical model names to backends
    #[cfg_attr(feature = "cli", arg(long, env = "MODEL_CONFIG_PATH", default_value = "models.yaml"))]
    pub model_config_path: PathBuf,

    /// Bearer token clients must present
    #[cfg_attr(feature = "cli", arg(long, env = "SERVICE_API_KEY", default_value = "change-me"))]
    pub service_api_key: String,

    // =============================================================================
    // AZURE RESPONSES API
    // =============================================================================

    /// Azure OpenAI resource URL, e.g. https://my-resource.openai.azure.com
    #[cfg_attr(feature = "cli", arg(long, env = "AZURE_BASE_URL"))]
    pub azure_base_url: Option<String>,

    /// Azure API key, also used as bearer token for pass-through models
    #[cfg_attr(feature = "cli", arg(long, env = "AZURE_API_KEY", hide_env_values = true))]
    pub azure_api_key: Option<String>,

    #[cfg_attr(feature = "cli", arg(long, env = "AZURE_API_VERSION", default_value = "2025-04-01-preview"))]
    pub azure_api_version: String,

    /// Default reasoning summary level (auto, detailed, concise)
    #[cfg_attr(feature = "cli", arg(long, env = "AZURE_SUMMARY_LEVEL", default_value = "detailed"))]
    pub azure_summary_level: String,

    /// Default output verbosity (low, medium, high)
    #[cfg_attr(feature = "cli", arg(long, env = "AZURE_VERBOSITY_LEVEL", default_value = "medium"))]
    pub azure_verbosity_level: String,

    /// Default truncation strategy (auto, disabled)
    #[cfg_attr(feature = "cli", arg(long, env = "AZURE_TRUNCATION", default_value = "disabled"))]
    pub azure_truncation: String,

    // =============================================================================
    // ANTHROPIC
    // =============================================================================

    #[cfg_attr(feature = "cli", arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true))]
    pub anthropic_api_key: Option<String>,

    // =============================================================================
    // HTTP CLIENT
    // =============================================================================

    /// Upstream connect timeout in seconds. Reads are never timed out.
    #[cfg_attr(feature = "cli", arg(long, env = "UPSTREAM_CONNECT_TIMEOUT", default_value = "60"))]
    pub upstream_connect_timeout: u64,

    /// Maximum idle connections kept per upstream host
    #[cfg_attr(feature = "cli", arg(long, env = "HTTP_CLIENT_MAX_CONNECTIONS_PER_HOST", default_value = "10"))]
    pub http_client_max_connections_per_host: usize,

    // =============================================================================
    // LOGGING AND RECORDING
    // =============================================================================

    /// Log level (error, warn, info, debug, trace)
    #[cfg_attr(feature = "cli", arg(long, env = "RUST_LOG", default_value = "info"))]
    pub log_level: String,

    /// Environment (development, staging, production)
    #[cfg_attr(feature = "cli", arg(long, env = "ENVIRONMENT", default_value = "development"))]
    pub environment: String,

    /// Log a redacted summary of every inbound request
    #[cfg_attr(feature = "cli", arg(long, env = "LOG_CONTEXT", default_value = "false", action = clap::ArgAction::Set))]
    pub log_context: bool,

    /// Log the assembled completion text when a stream ends
    #[cfg_attr(feature = "cli", arg(long, env = "LOG_COMPLETION", default_value = "false", action = clap::ArgAction::Set))]
    pub log_completion: bool,

    /// Write request bodies to RECORDINGS_DIR
    #[cfg_attr(feature = "cli", arg(long, env = "RECORD_TRAFFIC", default_value = "false", action = clap::ArgAction::Set))]
    pub record_traffic: bool,

    #[cfg_attr(feature = "cli", arg(long, env = "RECORDINGS_DIR", default_value = "recordings"))]
    pub recordings_dir: PathBuf,
}

/// Environment-level defaults the request translators fall back to when a
/// model entry leaves a field unset.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub azure_base_url: Option<String>,
    pub azure_api_version: String,
    pub summary_level: String,
    pub verbosity_level: String,
    pub truncation: String,
    pub log_completion: bool,
}

impl UpstreamSettings {
    /// Responses endpoint of the Azure resource.
    pub fn azure_responses_url(&self) -> Option<String> {
        self.azure_base_url.as_deref().map(|base| {
            format!(
                "{}/openai/responses?api-version={}",
                base.trim_end_matches('/'),
                self.azure_api_version
            )
        })
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            azure_base_url: None,
            azure_api_version: "2025-04-01-preview".to_string(),
            summary_level: "detailed".to_string(),
            verbosity_level: "medium".to_string(),
            truncation: "disabled".to_string(),
            log_completion: false,
        }
    }
}

impl Config {
    /// Parse configuration from command line arguments and environment variables.
    ///
    /// Loads `.env` first, then parses, sets up logging and validates. Exits
    /// the process on an invalid configuration.
    #[cfg(feature = "cli")]
    pub fn parse_args() -> Self {
        // Load .env file if it exists (ignore errors if file doesn't exist)
        let _ = dotenv::dotenv();

        let config = Self::parse();

        config.setup_logging();

        if let Err(err) = config.validate() {
            eprintln!("Configuration validation failed: {}", err);
            std::process::exit(1);
        }

        config
    }

    /// Create a test configuration with minimal required fields.
    /// This is used for testing purposes only.
    pub fn for_test() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            model_config_path: PathBuf::from("models.yaml"),
            service_api_key: "test-service-key".to_string(),
            azure_base_url: Some("https://test-resource.openai.azure.com".to_string()),
            azure_api_key: Some("test-azure-key".to_string()),
            azure_api_version: "2025-04-01-preview".to_string(),
            azure_summary_level: "detailed".to_string(),
            azure_verbosity_level: "medium".to_string(),
            azure_truncation: "disabled".to_string(),
            anthropic_api_key: Some("test-anthropic-key".to_string()),
            upstream_connect_timeout: 60,
            http_client_max_connections_per_host: 10,
            log_level: "info".to_string(),
            environment: "development".to_string(),
            log_context: false,
            log_completion: false,
            record_traffic: false,
            recordings_dir: PathBuf::from("recordings"),
        }
    }

    /// Environment-level defaults handed to the translators.
    pub fn upstream_settings(&self) -> Arc<UpstreamSettings> {
        Arc::new(UpstreamSettings {
            azure_base_url: self.azure_base_url.clone(),
            azure_api_version: self.azure_api_version.clone(),
            summary_level: self.azure_summary_level.clone(),
            verbosity_level: self.azure_verbosity_level.clone(),
            truncation: self.azure_truncation.clone(),
            log_completion: self.log_completion,
        })
    }

    /// Set up the tracing subscriber from `RUST_LOG`.
    #[cfg(feature = "cli")]
    fn setup_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(&self.log_level)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .try_init();
    }

    /// Validate configuration values and provide helpful error messages.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0. Please specify a valid port number (1-65535).".to_string());
        }

        if self.host.is_empty() {
            return Err("Host cannot be empty. Please specify a valid host (e.g., '0.0.0.0', 'localhost', or an IP address).".to_string());
        }

        if self.host != "0.0.0.0" && self.host != "localhost" && self.host.parse::<std::net::IpAddr>().is_err() {
            eprintln!(
                "⚠️  Warning: Host '{}' is not a recognized format. \
                Use '0.0.0.0' for all interfaces, 'localhost' for local access, or a valid IP address.",
                self.host
            );
        }

        if let Some(base_url) = &self.azure_base_url {
            match Url::parse(base_url) {
                Ok(url) if ["http", "https"].contains(&url.scheme()) => {}
                Ok(url) => {
                    return Err(format!(
                        "Invalid AZURE_BASE_URL scheme '{}'. Only 'http' and 'https' are supported.",
                        url.scheme()
                    ));
                }
                Err(err) => {
                    return Err(format!("Invalid AZURE_BASE_URL '{}': {}", base_url, err));
                }
            }
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.environment.as_str()) {
            return Err(format!(
                "Invalid environment '{}'. Valid options are: {}",
                self.environment,
                valid_environments.join(", ")
            ));
        }

        if self.environment == "production" && self.service_api_key == "change-me" {
            eprintln!(
                "⚠️  Warning: SERVICE_API_KEY is still the default value. \
                Set a real key before exposing the gateway."
            );
        }

        if self.upstream_connect_timeout == 0 {
            return Err("Upstream connect timeout must be greater than 0 seconds.".to_string());
        }

        if self.http_client_max_connections_per_host == 0 {
            return Err("HTTP client max connections per host must be greater than 0.".to_string());
        }

        #[cfg(feature = "cli")]
        {
            if let Err(err) = tracing_subscriber::EnvFilter::try_new(&self.log_level) {
                return Err(format!(
                    "Invalid log level '{}': {}. Use a level such as 'info' or directives like 'chatgate=debug,tower_http=info'.",
                    self.log_level, err
                ));
            }
        }

        Ok(())
    }
}
