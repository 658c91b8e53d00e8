use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub inventory: InventoryConfig,
    pub auth: AuthConfig,
    pub queue: QueueConfig,
    pub payment: PaymentConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    pub workers: usize,
    pub capacity: usize,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Probability that the stub authorizes a charge.
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
    pub latency_ms: u64,
}

fn default_success_rate() -> f64 {
    0.95
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Currency units one mile is worth when paying with miles.
    #[serde(default = "default_mile_value")]
    pub mile_value: i64,
    /// Ceiling on PNR regeneration attempts before giving up.
    #[serde(default = "default_pnr_attempts")]
    pub pnr_max_attempts: u32,
}

fn default_mile_value() -> i64 {
    10
}

fn default_pnr_attempts() -> u32 {
    5
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file, optional.
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // SKYFARE__SERVER__PORT=8080 style environment overrides.
            .add_source(config::Environment::with_prefix("SKYFARE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
