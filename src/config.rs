use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_EMAIL_API_KEY: &str = "dev-email-api-key";

/// Transactional email transport configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// Base URL of the email provider's HTTP API
    pub api_base_url: String,

    /// Provider API key
    pub api_key: String,

    /// Sender address used for all outbound mail
    #[validate(email)]
    pub from_address: String,

    /// Request timeout in seconds
    #[serde(default = "default_transport_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8025".to_string(),
            api_key: DEV_DEFAULT_EMAIL_API_KEY.to_string(),
            from_address: "bookings@clubhub.example".to_string(),
            timeout_secs: default_transport_timeout_secs(),
        }
    }
}

/// Identity-provider admin API configuration (buyer email fallback lookups)
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Base URL of the identity provider
    pub api_base_url: String,

    /// Service-role token; the email lookup requires administrative privilege
    pub service_token: String,

    /// Request timeout in seconds
    #[serde(default = "default_transport_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:9999".to_string(),
            service_token: "dev-service-token".to_string(),
            timeout_secs: default_transport_timeout_secs(),
        }
    }
}

/// The platform's own legal identity, printed in the Issuer/Mandatary block
/// of every invoice. ClubHub issues invoices in the name and on behalf of the
/// vendor under a billing mandate.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformIdentity {
    pub legal_name: String,
    pub address: String,
    pub siret: String,
    pub vat_number: String,
    pub support_email: String,
}

impl Default for PlatformIdentity {
    fn default() -> Self {
        Self {
            legal_name: "ClubHub SAS".to_string(),
            address: "12 rue de la Boétie, 75008 Paris, France".to_string(),
            siret: "892 145 330 00021".to_string(),
            vat_number: "FR32892145330".to_string(),
            support_email: "support@clubhub.example".to_string(),
        }
    }
}

/// Application configuration structure with validation
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

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Shared secret for payment webhook signature verification; unsigned
    /// webhooks are accepted when unset (development only)
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,

    /// Allowed clock skew for webhook timestamps (seconds)
    #[serde(default)]
    pub payment_webhook_tolerance_secs: Option<u64>,

    /// Transactional email transport
    #[serde(default)]
    #[validate]
    pub email: EmailConfig,

    /// Identity-provider admin API
    #[serde(default)]
    #[validate]
    pub identity: IdentityConfig,

    /// Legal identity printed on invoices
    #[serde(default)]
    pub platform: PlatformIdentity,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

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
}

impl AppConfig {
    /// Construct a configuration programmatically (tests, tooling).
    pub fn new(
        database_url: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            database_url: database_url.into(),
            host: host.into(),
            port,
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            payment_webhook_secret: None,
            payment_webhook_tolerance_secs: None,
            email: EmailConfig::default(),
            identity: IdentityConfig::default(),
            platform: PlatformIdentity::default(),
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Checks that cannot be expressed as field-level validators.
    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.is_development() && self.email.api_key.trim() == DEV_DEFAULT_EMAIL_API_KEY {
            let mut err = ValidationError::new("email_api_key_default_dev");
            err.message = Some(
                "The bundled development email API key must not be used outside development. Set APP__EMAIL__API_KEY."
                    .into(),
            );
            errors.add("email", err);
        }

        if !self.is_development() && self.payment_webhook_secret.is_none() {
            let mut err = ValidationError::new("webhook_secret_required");
            err.message = Some(
                "Unsigned payment webhooks are only allowed in development. Set APP__PAYMENT_WEBHOOK_SECRET."
                    .into(),
            );
            errors.add("payment_webhook_secret", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_transport_timeout_secs() -> u64 {
    10
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
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

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("clubhub_api={},tower_http=debug", level);
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

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
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
        .set_default("database_url", "sqlite://clubhub.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
