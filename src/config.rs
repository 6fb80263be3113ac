use crate::shared::resilience::RetryOptions;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub service_name: String,
    pub otel_exporter_endpoint: Option<String>,
    pub metrics_port: u16,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_timeout_ms: u64,
    pub realtime: RealtimeConfig,
}

/// Names and limits used by the notification center
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealtimeConfig {
    pub maintenance_table: String,
    pub payments_table: String,
    pub presence_channel: String,
    pub feed_limit: usize,
    pub toast_duration: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            maintenance_table: "maintenance_requests".to_string(),
            payments_table: "payments".to_string(),
            presence_channel: "online-users".to_string(),
            feed_limit: 50,
            toast_duration: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let service_name = env::var("SERVICE_NAME").unwrap_or_else(|_| "estatedesk".to_string());

        let otel_exporter_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

        let metrics_port = parse_var("METRICS_PORT", 9000)?;

        let retry_max_attempts: u32 = parse_var("RETRY_MAX_ATTEMPTS", 3)?;
        if retry_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "RETRY_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        let retry_base_delay_ms = parse_var("RETRY_BASE_DELAY_MS", 1000)?;
        let retry_max_delay_ms = parse_var("RETRY_MAX_DELAY_MS", 30_000)?;
        let breaker_failure_threshold = parse_var("BREAKER_FAILURE_THRESHOLD", 5)?;
        let breaker_reset_timeout_ms = parse_var("BREAKER_RESET_TIMEOUT_MS", 60_000)?;

        let defaults = RealtimeConfig::default();
        let realtime = RealtimeConfig {
            maintenance_table: env::var("MAINTENANCE_TABLE").unwrap_or(defaults.maintenance_table),
            payments_table: env::var("PAYMENTS_TABLE").unwrap_or(defaults.payments_table),
            presence_channel: env::var("PRESENCE_CHANNEL").unwrap_or(defaults.presence_channel),
            feed_limit: parse_var("NOTIFICATION_FEED_LIMIT", defaults.feed_limit)?,
            toast_duration: defaults.toast_duration,
        };

        Ok(Config {
            service_name,
            otel_exporter_endpoint,
            metrics_port,
            retry_max_attempts,
            retry_base_delay_ms,
            retry_max_delay_ms,
            breaker_failure_threshold,
            breaker_reset_timeout_ms,
            realtime,
        })
    }

    /// Default retry options with the configured attempt budget and delays
    pub fn retry_options(&self) -> RetryOptions {
        RetryOptions::default()
            .with_max_attempts(self.retry_max_attempts)
            .with_base_delay(Duration::from_millis(self.retry_base_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
    }

    pub fn breaker_reset_timeout(&self) -> Duration {
        Duration::from_millis(self.breaker_reset_timeout_ms)
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
