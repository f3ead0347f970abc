use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
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
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Shared secret expected in `X-API-Key` on the event endpoints
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Pub/Sub channels carrying document events (patterns allowed)
    #[serde(default)]
    pub channels: Vec<String>,
    /// Initial reconnect delay for the subscriber
    #[serde(default = "default_backoff_initial_delay_ms")]
    pub backoff_initial_delay_ms: u64,
    /// Upper bound for the subscriber reconnect delay
    #[serde(default = "default_backoff_max_delay_ms")]
    pub backoff_max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// "memory" or "redis"
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Key prefix for the Redis document layout
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// "fcm" or "noop"
    #[serde(default = "default_push_backend")]
    pub backend: String,
    /// Registrations per provider call, capped at the provider limit of 500
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// "abort" or "continue" after a batch whose send call fails outright
    #[serde(default = "default_on_batch_error")]
    pub on_batch_error: String,
    /// Concurrent per-token requests inside one multicast
    #[serde(default = "default_max_concurrent_sends")]
    pub max_concurrent_sends: usize,
    /// Concurrent directory/token reads while resolving recipients
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub project_id: Option<String>,
    /// Path to the service-account JSON key
    pub credentials_file: Option<String>,
    #[serde(default = "default_fcm_endpoint")]
    pub fcm_endpoint: String,
    #[serde(default = "default_identity_toolkit_endpoint")]
    pub identity_toolkit_endpoint: String,
    /// Request timeout for outbound Google API calls
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_reminders_enabled")]
    pub enabled: bool,
    /// Seconds between reminder sweeps
    #[serde(default = "default_reminder_interval")]
    pub interval_seconds: u64,
    /// Offset of the campus time zone from UTC (Asia/Amman is +03:00)
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
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

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_backoff_initial_delay_ms() -> u64 {
    500
}

fn default_backoff_max_delay_ms() -> u64 {
    30_000
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_key_prefix() -> String {
    "unigo".to_string()
}

fn default_push_backend() -> String {
    "noop".to_string()
}

fn default_batch_size() -> usize {
    500
}

fn default_on_batch_error() -> String {
    "abort".to_string()
}

fn default_max_concurrent_sends() -> usize {
    100
}

fn default_lookup_concurrency() -> usize {
    16
}

fn default_fcm_endpoint() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_identity_toolkit_endpoint() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_reminders_enabled() -> bool {
    true
}

fn default_reminder_interval() -> u64 {
    86_400 // once a day
}

fn default_utc_offset_minutes() -> i32 {
    180
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "unigo-notification-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("redis.url", "redis://localhost:6379")?
            .set_default("store.backend", "memory")?
            .set_default("push.backend", "noop")?
            .set_default("push.batch_size", 500)?
            .set_default("push.on_batch_error", "abort")?
            .set_default("reminders.interval_seconds", 86_400)?
            .set_default("reminders.utc_offset_minutes", 180)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, PUSH__BATCH_SIZE, GOOGLE__PROJECT_ID, ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("redis.channels")
                    .with_list_parse_key("server.cors_origins"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            channels: vec![],
            backoff_initial_delay_ms: default_backoff_initial_delay_ms(),
            backoff_max_delay_ms: default_backoff_max_delay_ms(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            backend: default_push_backend(),
            batch_size: default_batch_size(),
            on_batch_error: default_on_batch_error(),
            max_concurrent_sends: default_max_concurrent_sends(),
            lookup_concurrency: default_lookup_concurrency(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials_file: None,
            fcm_endpoint: default_fcm_endpoint(),
            identity_toolkit_endpoint: default_identity_toolkit_endpoint(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: default_reminders_enabled(),
            interval_seconds: default_reminder_interval(),
            utc_offset_minutes: default_utc_offset_minutes(),
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

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            redis: RedisConfig::default(),
            store: StoreConfig::default(),
            push: PushConfig::default(),
            google: GoogleConfig::default(),
            reminders: ReminderConfig::default(),
            otel: OtelConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8081);
    }

    #[test]
    fn test_push_defaults_respect_provider_limit() {
        let push = PushConfig::default();
        assert_eq!(push.batch_size, 500);
        assert_eq!(push.on_batch_error, "abort");
        assert_eq!(push.backend, "noop");
    }

    #[test]
    fn test_reminder_defaults() {
        let reminders = ReminderConfig::default();
        assert!(reminders.enabled);
        assert_eq!(reminders.interval_seconds, 86_400);
        assert_eq!(reminders.utc_offset_minutes, 180);
    }

    #[test]
    fn test_settings_deserialize_partial_document() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "store": { "backend": "redis" },
            "push": { "batch_size": 100, "on_batch_error": "continue" }
        }))
        .unwrap();

        assert_eq!(settings.store.backend, "redis");
        assert_eq!(settings.store.key_prefix, "unigo");
        assert_eq!(settings.push.batch_size, 100);
        assert_eq!(settings.push.on_batch_error, "continue");
        assert_eq!(settings.server_addr(), "0.0.0.0:8081");
    }
}
