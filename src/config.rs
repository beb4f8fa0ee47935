use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Alert ingestion limits
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Notification configuration
    pub notifications: NotificationConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration layered over the embedded defaults, with `path` as an optional override file
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(path).required(false))
            // Override with environment variables (prefix: ALERT_NOTIFIER_)
            .add_source(
                config::Environment::with_prefix("ALERT_NOTIFIER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Seconds to wait for in-flight notifications on shutdown
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Maximum accepted receiver length
    #[serde(default = "default_max_field_len")]
    pub max_receiver_len: usize,

    /// Maximum accepted location length
    #[serde(default = "default_max_field_len")]
    pub max_location_len: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_receiver_len: default_max_field_len(),
            max_location_len: default_max_field_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Total send attempts per job (0 is treated as 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base delay; attempt n waits base * 2^(n-1)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on in-flight jobs; unbounded when unset
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: Option<usize>,

    /// Base URL of the dashboard, used for alert deep links
    #[serde(default = "default_link_base_url")]
    pub link_base_url: String,

    /// SMS body budget in characters
    #[serde(default = "default_sms_max_chars")]
    pub sms_max_chars: usize,

    /// Country-code literal recognised by the phone classifier
    #[serde(default = "default_phone_country_code")]
    pub phone_country_code: String,

    /// Number of terminal outcomes kept for inspection
    #[serde(default = "default_recent_outcomes")]
    pub recent_outcomes: usize,

    /// Enable email notifications
    #[serde(default)]
    pub email_enabled: bool,

    /// SMTP server
    pub smtp_server: Option<String>,

    /// SMTP port
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Use STARTTLS for SMTP
    #[serde(default = "default_true")]
    pub smtp_use_tls: bool,

    /// SMTP username (from env var)
    pub smtp_username_env: Option<String>,

    /// SMTP password (from env var)
    pub smtp_password_env: Option<String>,

    /// From email address
    pub email_from: Option<String>,

    /// From email name
    pub email_from_name: Option<String>,

    /// Enable SMS notifications
    #[serde(default)]
    pub sms_enabled: bool,

    /// SMS provider API base URL
    #[serde(default = "default_sms_api_base")]
    pub sms_api_base: String,

    /// SMS provider account SID (from env var)
    pub sms_account_sid_env: Option<String>,

    /// SMS provider auth token (from env var)
    pub sms_auth_token_env: Option<String>,

    /// Sender phone number
    pub sms_from_number: Option<String>,

    /// SMS provider request timeout (seconds)
    #[serde(default = "default_sms_timeout")]
    pub sms_timeout_secs: u64,
}

impl NotificationConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.base_delay_ms == 0 {
            return Err("base_delay_ms must be greater than zero".to_string());
        }
        if self.max_queue_depth == Some(0) {
            return Err("max_queue_depth must be greater than zero when set".to_string());
        }
        if self.sms_max_chars < 20 {
            return Err("sms_max_chars must be at least 20".to_string());
        }
        if self.phone_country_code.is_empty() {
            return Err("phone_country_code cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_queue_depth: default_max_queue_depth(),
            link_base_url: default_link_base_url(),
            sms_max_chars: default_sms_max_chars(),
            phone_country_code: default_phone_country_code(),
            recent_outcomes: default_recent_outcomes(),
            email_enabled: false,
            smtp_server: None,
            smtp_port: default_smtp_port(),
            smtp_use_tls: true,
            smtp_username_env: None,
            smtp_password_env: None,
            email_from: None,
            email_from_name: None,
            sms_enabled: false,
            sms_api_base: default_sms_api_base(),
            sms_account_sid_env: None,
            sms_auth_token_env: None,
            sms_from_number: None,
            sms_timeout_secs: default_sms_timeout(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    10000
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_field_len() -> usize {
    200
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_queue_depth() -> Option<usize> {
    Some(100)
}

fn default_link_base_url() -> String {
    "https://weapondetectionsystem.onrender.com".to_string()
}

fn default_sms_max_chars() -> usize {
    160
}

fn default_phone_country_code() -> String {
    "+593".to_string()
}

fn default_recent_outcomes() -> usize {
    100
}

fn default_smtp_port() -> u16 {
    587
}

fn default_sms_api_base() -> String {
    "https://api.twilio.com".to_string()
}

fn default_sms_timeout() -> u64 {
    10
}
