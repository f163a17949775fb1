use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

const PAYPAL_SANDBOX_BASE: &str = "https://api.sandbox.paypal.com";
const PAYPAL_LIVE_BASE: &str = "https://api.paypal.com";

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to create the schema on startup if missing
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Bearer token required on admin mutation endpoints
    #[validate(length(min = 32))]
    pub admin_api_key: String,

    /// PayPal REST client id
    #[serde(default)]
    pub paypal_client_id: String,

    /// PayPal REST client secret
    #[serde(default)]
    pub paypal_client_secret: String,

    /// "sandbox" or "live"
    #[serde(default = "default_paypal_environment")]
    pub paypal_environment: String,

    /// Override for the processor API base URL (used by tests)
    #[serde(default)]
    pub paypal_base_url: Option<String>,

    /// Timeout for processor round trips, in seconds
    #[serde(default = "default_paypal_timeout_secs")]
    pub paypal_timeout_secs: u64,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_paypal_environment() -> String {
    "sandbox".to_string()
}
fn default_paypal_timeout_secs() -> u64 {
    10
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_event_channel_capacity() -> usize {
    1024
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    /// Resolved processor API base: explicit override wins, otherwise the
    /// environment selects sandbox or live.
    pub fn paypal_base_url(&self) -> String {
        if let Some(url) = &self.paypal_base_url {
            return url.trim_end_matches('/').to_string();
        }
        if self.paypal_environment == "live" {
            PAYPAL_LIVE_BASE.to_string()
        } else {
            PAYPAL_SANDBOX_BASE.to_string()
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Load configuration from `config/{default,ENV}.toml` plus `APP__`-prefixed
/// environment variables (e.g. `APP__DATABASE_URL`, `APP__ADMIN_API_KEY`).
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://gameboost.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // admin_api_key has no default on purpose: a deploy without it would
    // leave the admin surface open behind a guessable constant.
    if config.get_string("admin_api_key").is_err() {
        error!("Admin API key is not configured. Set APP__ADMIN_API_KEY to a random string of at least 32 characters.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "admin_api_key is required but not configured. Set APP__ADMIN_API_KEY.".into(),
        )));
    }

    let cfg: AppConfig = config.try_deserialize()?;
    cfg.validate()?;

    if cfg.paypal_client_id.is_empty() || cfg.paypal_client_secret.is_empty() {
        // Startup is allowed so order CRUD works, but capture verification
        // will fail until credentials arrive.
        error!("PayPal credentials missing; /payment/verify will reject all requests");
    }

    Ok(cfg)
}

/// Initialize the tracing subscriber once, honoring RUST_LOG when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("gameboost_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}
