use crate::config::toml_config::TomlConfig;
use crate::config::ServerConfig;
use crate::utils::error::Result;
use clap::Parser;

/// Flags left unset fall back to the TOML file, then to built-in defaults.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "numbers-aggregator")]
#[command(about = "Fans out to number endpoints and returns the merged, sorted set before a deadline")]
pub struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "NUMBERS_AGGREGATOR_CONFIG")]
    pub config: Option<String>,

    /// Address to listen on, e.g. 0.0.0.0:8080
    #[arg(long, env = "NUMBERS_AGGREGATOR_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Path of the aggregate endpoint
    #[arg(long)]
    pub route: Option<String>,

    /// Repeated query parameter carrying the sub-endpoint URLs
    #[arg(long)]
    pub query_key: Option<String>,

    /// Overall request deadline in milliseconds
    #[arg(long, env = "NUMBERS_AGGREGATOR_DEADLINE_MS")]
    pub deadline_ms: Option<u64>,

    /// Part of the deadline reserved for writing the response
    #[arg(long)]
    pub overhead_ms: Option<u64>,

    /// Connect timeout for sub-endpoint connections in milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Log format: compact or json
    #[arg(long)]
    pub log_format: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliArgs {
    /// 合併預設值、設定檔與命令列參數
    pub fn resolve(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?.into_server_config(),
            None => ServerConfig::default(),
        };

        if let Some(listen_addr) = &self.listen_addr {
            config.listen_addr = listen_addr.clone();
        }
        if let Some(route) = &self.route {
            config.route = route.clone();
        }
        if let Some(query_key) = &self.query_key {
            config.query_key = query_key.clone();
        }
        if let Some(deadline_ms) = self.deadline_ms {
            config.deadline_ms = deadline_ms;
        }
        if let Some(overhead_ms) = self.overhead_ms {
            config.overhead_ms = overhead_ms;
        }
        if self.connect_timeout_ms.is_some() {
            config.connect_timeout_ms = self.connect_timeout_ms;
        }
        if let Some(log_format) = &self.log_format {
            config.log_format = log_format.clone();
        }

        Ok(config)
    }
}
