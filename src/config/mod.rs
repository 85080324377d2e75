#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::{Result, ServiceError};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{
    validate_non_empty_string, validate_range, validate_route, validate_socket_addr, Validate,
};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ROUTE: &str = "/numbers";
pub const DEFAULT_QUERY_KEY: &str = "u";
pub const DEFAULT_DEADLINE_MS: u64 = 500;
pub const DEFAULT_OVERHEAD_MS: u64 = 25;
pub const MAX_DEADLINE_MS: u64 = 60_000;

/// 伺服器的最終設定 (預設值 → TOML 檔 → 命令列)
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub route: String,
    pub query_key: String,
    pub deadline_ms: u64,
    pub overhead_ms: u64,
    pub connect_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            route: DEFAULT_ROUTE.to_string(),
            query_key: DEFAULT_QUERY_KEY.to_string(),
            deadline_ms: DEFAULT_DEADLINE_MS,
            overhead_ms: DEFAULT_OVERHEAD_MS,
            connect_timeout_ms: None,
            log_level: None,
            log_format: "compact".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        validate_socket_addr("listen_addr", &self.listen_addr)
    }

    pub fn log_format(&self) -> Result<LogFormat> {
        self.log_format
            .parse()
            .map_err(|reason| ServiceError::InvalidConfigValueError {
                field: "log_format".to_string(),
                value: self.log_format.clone(),
                reason,
            })
    }
}

impl ConfigProvider for ServerConfig {
    fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    fn route(&self) -> &str {
        &self.route
    }

    fn query_key(&self) -> &str {
        &self.query_key
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    fn overhead(&self) -> Duration {
        Duration::from_millis(self.overhead_ms)
    }

    fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms
            .map(|ms| Duration::from_millis(ms.min(self.deadline_ms)))
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        validate_route("route", &self.route)?;
        validate_non_empty_string("query_key", &self.query_key)?;
        validate_range("deadline_ms", self.deadline_ms, 1, MAX_DEADLINE_MS)?;

        if self.overhead_ms >= self.deadline_ms {
            return Err(ServiceError::ConfigValidationError {
                field: "overhead_ms".to_string(),
                message: format!(
                    "overhead ({}ms) must be smaller than the deadline ({}ms)",
                    self.overhead_ms, self.deadline_ms
                ),
            });
        }

        if let Some(connect_timeout_ms) = self.connect_timeout_ms {
            validate_range("connect_timeout_ms", connect_timeout_ms, 1, MAX_DEADLINE_MS)?;
        }

        self.log_format()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch_budget(), Duration::from_millis(475));
        assert_eq!(config.connect_timeout(), None);
    }

    #[test]
    fn test_overhead_must_fit_in_deadline() {
        let config = ServerConfig {
            deadline_ms: 100,
            overhead_ms: 100,
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ServiceError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_key = ServerConfig {
            query_key: " ".to_string(),
            ..ServerConfig::default()
        };
        assert!(bad_key.validate().is_err());

        let bad_addr = ServerConfig {
            listen_addr: ":8080".to_string(),
            ..ServerConfig::default()
        };
        assert!(bad_addr.validate().is_err());

        let bad_format = ServerConfig {
            log_format: "xml".to_string(),
            ..ServerConfig::default()
        };
        assert!(bad_format.validate().is_err());
    }

    #[test]
    fn test_connect_timeout_never_exceeds_deadline() {
        let config = ServerConfig {
            connect_timeout_ms: Some(10_000),
            ..ServerConfig::default()
        };
        assert_eq!(config.connect_timeout(), Some(Duration::from_millis(500)));
    }
}
