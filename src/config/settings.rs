use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub negotiation: NegotiationConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NegotiationConfig {
    /// Lifetime of a negotiated offer in seconds
    #[serde(default = "default_offer_ttl")]
    pub offer_ttl_secs: u64,
    /// Rate applied to properties with no override (absent = no offer)
    pub default_rate: Option<f64>,
    /// JSON array of properties
    pub properties_path: Option<String>,
    /// JSON object of per-property discount rates
    pub discounts_path: Option<String>,
    /// HS256 secret for offer tokens
    pub token_secret: Option<String>,
    /// Cities whose deals are exhausted for the day
    #[serde(default)]
    pub exhausted_cities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Poll interval of the queue driver in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Retention sweep interval in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    /// How long sent/failed jobs stay inspectable
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
    /// Upper bound on stored jobs before terminal ones are evicted
    #[serde(default = "default_max_retained_jobs")]
    pub max_retained_jobs: usize,
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,
    #[serde(default = "default_max_attempts_limit")]
    pub max_attempts_limit: u32,
    /// Timeout around a single transport call in seconds
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default)]
    pub backoff: RetryBackoffConfig,
    /// Outbound email provider; log-only when `api_url` is unset
    #[serde(default)]
    pub email: EmailProviderConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailProviderConfig {
    /// HTTP endpoint of the transactional mail relay
    pub api_url: Option<String>,
    /// Bearer token for the relay
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryBackoffConfig {
    /// Delay after the first failed attempt in seconds
    #[serde(default = "default_backoff_initial")]
    pub initial_delay_secs: u64,
    /// Cap on any single delay in seconds
    #[serde(default = "default_backoff_max")]
    pub max_delay_secs: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    #[serde(default = "default_backoff_jitter")]
    pub jitter_factor: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_body_limit() -> usize {
    64 * 1024
}

fn default_offer_ttl() -> u64 {
    300 // 5 minutes
}

fn default_poll_interval() -> u64 {
    30
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_retention() -> u64 {
    86_400 // 1 day
}

fn default_max_retained_jobs() -> usize {
    10_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_attempts_limit() -> u32 {
    10
}

fn default_delivery_timeout() -> u64 {
    10
}

fn default_from_address() -> String {
    "noreply@hotelsaver.ng".to_string()
}

fn default_from_name() -> String {
    "HotelSaver.ng".to_string()
}

fn default_backoff_initial() -> u64 {
    30
}

fn default_backoff_max() -> u64 {
    3_600
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_backoff_jitter() -> f64 {
    0.1
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "hotelsaver-offers".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

/// Check if running in production mode (based on RUN_MODE env var)
pub fn is_production() -> bool {
    env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("negotiation.offer_ttl_secs", 300)?
            .set_default("notifications.poll_interval_secs", 30)?
            .set_default("notifications.default_max_attempts", 3)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // NEGOTIATION__TOKEN_SECRET, NOTIFICATIONS__POLL_INTERVAL_SECS, SERVER__PORT, ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("negotiation.exhausted_cities")
                    .with_list_parse_key("server.cors_origins"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            negotiation: NegotiationConfig::default(),
            notifications: NotificationConfig::default(),
            otel: OtelConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            body_limit: default_body_limit(),
        }
    }
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            offer_ttl_secs: default_offer_ttl(),
            default_rate: None,
            properties_path: None,
            discounts_path: None,
            token_secret: None,
            exhausted_cities: vec![],
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            cleanup_interval_secs: default_cleanup_interval(),
            retention_secs: default_retention(),
            max_retained_jobs: default_max_retained_jobs(),
            default_max_attempts: default_max_attempts(),
            max_attempts_limit: default_max_attempts_limit(),
            delivery_timeout_secs: default_delivery_timeout(),
            from_address: default_from_address(),
            from_name: default_from_name(),
            backoff: RetryBackoffConfig::default(),
            email: EmailProviderConfig::default(),
        }
    }
}

impl Default for RetryBackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_backoff_initial(),
            max_delay_secs: default_backoff_max(),
            multiplier: default_backoff_multiplier(),
            jitter_factor: default_backoff_jitter(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
