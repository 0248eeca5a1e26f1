use std::collections::HashMap;
use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Default bound on a single channel attempt
pub const DEFAULT_CHANNEL_TIMEOUT_MS: u64 = 5000;

/// Default number of recipients dispatched together during a broadcast
pub const DEFAULT_BROADCAST_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; the in-memory store and directory are used when absent
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
    /// Table the recipient directory reads from
    #[serde(default = "default_users_table")]
    pub users_table: String,
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    600
}

fn default_users_table() -> String {
    "users".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Channels (or patterns) carrying inbound trigger requests
    #[serde(default)]
    pub channels: Vec<String>,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

/// Per-channel configuration: `{enabled, timeout_ms, options}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_channel_timeout")]
    pub timeout_ms: u64,
    /// Channel-specific settings (e.g., `url`, `relay_url`, `secret`)
    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_channel_timeout() -> u64 {
    DEFAULT_CHANNEL_TIMEOUT_MS
}

impl ChannelConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            timeout_ms: DEFAULT_CHANNEL_TIMEOUT_MS,
            options: HashMap::new(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::enabled()
        }
    }

    /// Set an option, builder style
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Non-blank option value
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::enabled()
    }
}

/// Configuration of every built-in channel
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default = "ChannelConfig::enabled")]
    pub in_app: ChannelConfig,
    #[serde(default = "ChannelConfig::disabled")]
    pub email: ChannelConfig,
    #[serde(default = "ChannelConfig::disabled")]
    pub webhook: ChannelConfig,
    #[serde(default = "ChannelConfig::enabled")]
    pub socket: ChannelConfig,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            in_app: ChannelConfig::enabled(),
            email: ChannelConfig::disabled(),
            webhook: ChannelConfig::disabled(),
            socket: ChannelConfig::enabled(),
        }
    }
}

/// Source of channel configuration, looked up by channel id
pub trait ChannelConfigSource: Send + Sync {
    fn channel_config(&self, channel_id: &str) -> Option<ChannelConfig>;
}

impl ChannelConfigSource for ChannelsConfig {
    fn channel_config(&self, channel_id: &str) -> Option<ChannelConfig> {
        match channel_id {
            "in-app" => Some(self.in_app.clone()),
            "email" => Some(self.email.clone()),
            "webhook" => Some(self.webhook.clone()),
            "socket" => Some(self.socket.clone()),
            _ => None,
        }
    }
}

impl ChannelConfigSource for Settings {
    fn channel_config(&self, channel_id: &str) -> Option<ChannelConfig> {
        self.channels.channel_config(channel_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    /// Recipients dispatched concurrently before the next batch starts
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BROADCAST_BATCH_SIZE
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

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "notification-delivery-core".to_string()
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
            .set_default("redis.url", "redis://localhost:6379")?
            .set_default("broadcast.batch_size", DEFAULT_BROADCAST_BATCH_SIZE as i64)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // DATABASE__URL, CHANNELS__WEBHOOK__ENABLED, CHANNELS__WEBHOOK__OPTIONS__URL, ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("redis.channels"),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.broadcast.batch_size == 0 {
            return Err(ConfigError::Message(
                "broadcast.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            users_table: default_users_table(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            channels: vec![],
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BROADCAST_BATCH_SIZE,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let channels = ChannelsConfig::default();
        assert!(channels.in_app.enabled);
        assert!(!channels.email.enabled);
        assert!(!channels.webhook.enabled);
        assert!(channels.socket.enabled);
        assert_eq!(channels.in_app.timeout_ms, 5000);

        assert_eq!(BroadcastConfig::default().batch_size, 10);
        assert!(DatabaseConfig::default().url.is_none());
    }

    #[test]
    fn test_channel_config_lookup() {
        let channels = ChannelsConfig::default();
        assert_eq!(channels.channel_config("in-app"), Some(ChannelConfig::enabled()));
        assert_eq!(channels.channel_config("email"), Some(ChannelConfig::disabled()));
        assert!(channels.channel_config("sms").is_none());
    }

    #[test]
    fn test_option_ignores_blank_values() {
        let config = ChannelConfig::enabled()
            .with_option("url", "https://hooks.example.com")
            .with_option("secret", "  ");

        assert_eq!(config.option("url"), Some("https://hooks.example.com"));
        assert_eq!(config.option("secret"), None);
        assert_eq!(config.option("missing"), None);
    }

    #[test]
    fn test_deserialize_partial_channel_config() {
        let config: ChannelsConfig = serde_json::from_value(serde_json::json!({
            "webhook": {"enabled": true, "options": {"url": "http://localhost/hook"}}
        }))
        .unwrap();

        assert!(config.webhook.enabled);
        assert_eq!(config.webhook.timeout_ms, DEFAULT_CHANNEL_TIMEOUT_MS);
        assert_eq!(config.webhook.option("url"), Some("http://localhost/hook"));
        assert!(config.in_app.enabled);
        assert!(!config.email.enabled);
    }

    #[test]
    fn test_otel_defaults() {
        let otel = OtelConfig::default();
        assert!(!otel.enabled);
        assert_eq!(otel.endpoint, "http://localhost:4317");
        assert_eq!(otel.sampling_ratio, 1.0);
    }
}
