use crate::config::ServerConfig;
use crate::utils::error::{Result, ServiceError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub aggregation: AggregationSection,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub listen_addr: Option<String>,
    pub route: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationSection {
    pub query_key: Option<String>,
    pub deadline_ms: Option<u64>,
    pub overhead_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ServiceError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ServiceError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DEADLINE_MS})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ServiceError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 將檔案中有設定的值套用到既有設定
    pub fn apply_to(&self, config: &mut ServerConfig) {
        if let Some(listen_addr) = &self.server.listen_addr {
            config.listen_addr = listen_addr.clone();
        }
        if let Some(route) = &self.server.route {
            config.route = route.clone();
        }

        let aggregation = &self.aggregation;
        if let Some(query_key) = &aggregation.query_key {
            config.query_key = query_key.clone();
        }
        if let Some(deadline_ms) = aggregation.deadline_ms {
            config.deadline_ms = deadline_ms;
        }
        if let Some(overhead_ms) = aggregation.overhead_ms {
            config.overhead_ms = overhead_ms;
        }
        if aggregation.connect_timeout_ms.is_some() {
            config.connect_timeout_ms = aggregation.connect_timeout_ms;
        }

        if let Some(logging) = &self.logging {
            if logging.level.is_some() {
                config.log_level = logging.level.clone();
            }
            if let Some(format) = &logging.format {
                config.log_format = format.clone();
            }
        }
    }

    pub fn into_server_config(self) -> ServerConfig {
        let mut config = ServerConfig::default();
        self.apply_to(&mut config);
        config
    }
}
