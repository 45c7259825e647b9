use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use crate::utils::{CircuitBreakerConfig, RetryConfig};

// ============================================================================
// Application Configuration
// ============================================================================
//
// Sources, later ones win:
// 1. Built-in defaults
// 2. config/fulfillment.toml (optional)
// 3. FULFILLMENT__* environment variables, e.g. FULFILLMENT__SERVER__PORT=9000
//
// ============================================================================

const CONFIG_FILE: &str = "config/fulfillment";
const ENV_PREFIX: &str = "FULFILLMENT";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub metrics: MetricsSettings,
    pub dispatch: DispatchSettings,
    pub outbox: OutboxSettings,
    pub circuit_breaker: CircuitBreakerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    /// Longest a submission waits for its order's lock
    pub lock_timeout_ms: u64,
}

impl DispatchSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutboxSettings {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    /// Failed relay passes before a message is dead-lettered
    pub max_delivery_attempts: i32,
    pub retry: RetryConfig,
}

impl OutboxSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AppConfig {
    /// Defaults overlaid with the config file and environment
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.port", 9090)?
            .set_default("dispatch.lock_timeout_ms", 5000)?
            .set_default("outbox.poll_interval_ms", 1000)?
            .set_default("outbox.batch_size", 50)?
            .set_default("outbox.max_delivery_attempts", 5)?
            .set_default("outbox.retry.max_attempts", 3)?
            .set_default("outbox.retry.initial_delay_ms", 100)?
            .set_default("outbox.retry.max_delay_ms", 2000)?
            .set_default("outbox.retry.multiplier", 2.0)?
            .set_default("circuit_breaker.failure_threshold", 5)?
            .set_default("circuit_breaker.timeout_ms", 30000)?
            .set_default("circuit_breaker.success_threshold", 2)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.lock_timeout_ms == 0 {
            return Err(ConfigError::Message("dispatch.lock_timeout_ms must be positive".into()));
        }
        if self.outbox.batch_size == 0 {
            return Err(ConfigError::Message("outbox.batch_size must be positive".into()));
        }
        if self.outbox.retry.max_attempts == 0 {
            return Err(ConfigError::Message("outbox.retry.max_attempts must be positive".into()));
        }
        if self.metrics.enabled && self.metrics.port == self.server.port {
            return Err(ConfigError::Message("metrics.port must differ from server.port".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(builder: ConfigBuilder<DefaultState>) -> AppConfig {
        builder.build().unwrap().try_deserialize().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = build(AppConfig::defaults().unwrap());

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.metrics.port, 9090);
        assert_eq!(config.dispatch.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.outbox.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.outbox.batch_size, 50);
        assert_eq!(config.outbox.retry.initial_delay, Duration::from_millis(100));
        assert_eq!(config.circuit_breaker.timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_win() {
        let builder = AppConfig::defaults()
            .unwrap()
            .set_override("dispatch.lock_timeout_ms", 250)
            .unwrap()
            .set_override("outbox.retry.max_attempts", 7)
            .unwrap();
        let config = build(builder);

        assert_eq!(config.dispatch.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.outbox.retry.max_attempts, 7);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let builder = AppConfig::defaults()
            .unwrap()
            .set_override("metrics.port", 8080)
            .unwrap();
        assert!(build(builder).validate().is_err());

        let builder = AppConfig::defaults()
            .unwrap()
            .set_override("outbox.batch_size", 0)
            .unwrap();
        assert!(build(builder).validate().is_err());
    }
}
