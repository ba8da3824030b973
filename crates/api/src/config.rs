//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::RetryConfig;
use event_buffer::EventBufferConfig;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `COMMAND_MAX_ATTEMPTS` — load/handle/save cycles per command (default: `3`)
/// - `COMMAND_RETRY_BASE_DELAY_MS` — first conflict backoff (default: `50`)
/// - `COMMAND_RETRY_MAX_DELAY_MS` — backoff ceiling (default: `2000`)
/// - `EVENT_BUFFER_TICK_SECS` — parked event dispatch interval (default: `30`)
/// - `CONTRACT_STATUS_JOB_SECS` — contract status refresh interval (default: `3600`)
///
/// Values that fail to parse fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub command_max_attempts: u32,
    pub command_retry_base_delay: Duration,
    pub command_retry_max_delay: Duration,
    pub event_buffer_tick: Duration,
    pub contract_status_job_interval: Duration,
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parsed("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: std::env::var("LOG_FORMAT")
                .ok()
                .and_then(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            command_max_attempts: env_parsed::<u32>("COMMAND_MAX_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.command_max_attempts),
            command_retry_base_delay: env_parsed("COMMAND_RETRY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.command_retry_base_delay),
            command_retry_max_delay: env_parsed("COMMAND_RETRY_MAX_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.command_retry_max_delay),
            event_buffer_tick: env_parsed::<u64>("EVENT_BUFFER_TICK_SECS")
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.event_buffer_tick),
            contract_status_job_interval: env_parsed::<u64>("CONTRACT_STATUS_JOB_SECS")
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.contract_status_job_interval),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.command_max_attempts,
            base_delay: self.command_retry_base_delay,
            max_delay: self.command_retry_max_delay,
            ..RetryConfig::default()
        }
    }

    pub fn event_buffer(&self) -> EventBufferConfig {
        EventBufferConfig {
            tick: self.event_buffer_tick,
            retry: self.retry(),
            ..EventBufferConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            command_max_attempts: 3,
            command_retry_base_delay: Duration::from_millis(50),
            command_retry_max_delay: Duration::from_millis(2000),
            event_buffer_tick: Duration::from_secs(30),
            contract_status_job_interval: Duration::from_secs(3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.command_max_attempts, 3);
        assert_eq!(config.event_buffer_tick, Duration::from_secs(30));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_retry_from_config() {
        let config = Config {
            command_max_attempts: 5,
            command_retry_base_delay: Duration::from_millis(10),
            ..Config::default()
        };
        let retry = config.retry();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.base_delay, Duration::from_millis(10));
        assert_eq!(retry.max_delay, Duration::from_millis(2000));
        assert_eq!(config.event_buffer().retry.max_attempts, 5);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
