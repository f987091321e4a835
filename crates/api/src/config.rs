//! Application configuration loaded from environment variables.

use std::time::Duration;

use checkout::{HttpGatewayConfig, Secret};

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` - bind address (default: `"0.0.0.0"`)
/// - `PORT` - listen port (default: `3000`)
/// - `RUST_LOG` - tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` - `text` or `json` (default: `text`)
/// - `DATABASE_URL` - PostgreSQL url; unset keeps events in memory
/// - `GATEWAY_BASE_URL` - payment gateway API (default: `https://api.razorpay.com`)
/// - `GATEWAY_KEY_ID`, `GATEWAY_KEY_SECRET` - gateway credentials
/// - `GATEWAY_WEBHOOK_SECRET` - webhook signing secret
/// - `GATEWAY_COOLDOWN_SECS` - outage cool-down (default: `30`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<Secret<String>>,
    pub gateway_base_url: String,
    pub gateway_key_id: Option<String>,
    pub gateway_key_secret: Option<Secret<String>>,
    pub gateway_webhook_secret: Option<Secret<String>>,
    pub gateway_cooldown: Duration,
}

const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.razorpay.com";
const DEFAULT_COOLDOWN_SECS: u64 = 30;
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads a variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: non_empty("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
            database_url: non_empty("DATABASE_URL").map(Secret::new),
            gateway_base_url: non_empty("GATEWAY_BASE_URL").unwrap_or(defaults.gateway_base_url),
            gateway_key_id: non_empty("GATEWAY_KEY_ID"),
            gateway_key_secret: non_empty("GATEWAY_KEY_SECRET").map(Secret::new),
            gateway_webhook_secret: non_empty("GATEWAY_WEBHOOK_SECRET").map(Secret::new),
            gateway_cooldown: non_empty("GATEWAY_COOLDOWN_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.gateway_cooldown),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Gateway client settings, present only when both credentials are set.
    pub fn gateway(&self) -> Option<HttpGatewayConfig> {
        let key_id = self.gateway_key_id.clone()?;
        let key_secret = self.gateway_key_secret.clone()?;
        Some(HttpGatewayConfig {
            base_url: self.gateway_base_url.clone(),
            key_id,
            key_secret,
            cooldown: self.gateway_cooldown,
            timeout: GATEWAY_TIMEOUT,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            gateway_base_url: DEFAULT_GATEWAY_BASE_URL.to_string(),
            gateway_key_id: None,
            gateway_key_secret: None,
            gateway_webhook_secret: None,
            gateway_cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
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
        assert_eq!(config.gateway_base_url, "https://api.razorpay.com");
        assert_eq!(config.gateway_cooldown, Duration::from_secs(30));
        assert!(config.database_url.is_none());
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
    fn test_gateway_requires_both_credentials() {
        let mut config = Config {
            gateway_key_id: Some("rzp_test_key".to_string()),
            ..Config::default()
        };
        assert!(config.gateway().is_none());

        config.gateway_key_secret = Some(Secret::new("shh".to_string()));
        let gateway = config.gateway().unwrap();
        assert_eq!(gateway.key_id, "rzp_test_key");
        assert_eq!(gateway.key_secret.reveal(), "shh");
        assert_eq!(gateway.cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let config = Config {
            gateway_key_secret: Some(Secret::new("super-secret".to_string())),
            ..Config::default()
        };
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
