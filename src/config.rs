use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Measure network latency and packet loss with ICMP echo requests.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Host name or IPv4 address to ping
    pub destination: String,

    /// Number of echo requests to send [default: 10]
    #[arg(short, long)]
    pub count: Option<u32>,

    /// Per-request timeout in milliseconds, also the probe interval [default: 1000]
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// JSON config file (falls back to $PINGER_CONFIG)
    #[arg(long, env = "PINGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long)]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address while pinging
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Print the final statistics as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PingConfig {
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_latency_history: bool,
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
    #[serde(default)]
    pub output: OutputFormat,
}

fn default_count() -> u32 {
    10
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            timeout_ms: default_timeout_ms(),
            log_level: default_log_level(),
            enable_latency_history: false,
            metrics_addr: None,
            output: OutputFormat::default(),
        }
    }
}

impl PingConfig {
    /// Builds the effective config: file values first, then command line flags.
    pub async fn load(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load_file_config(path).await?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(count) = args.count {
            self.count = count;
        }
        if let Some(timeout) = args.timeout {
            self.timeout_ms = timeout;
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
        if args.metrics_addr.is_some() {
            self.metrics_addr = args.metrics_addr;
        }
        if args.json {
            self.output = OutputFormat::Json;
        }
    }

    async fn load_file_config(file_path: &Path) -> Result<PingConfig> {
        if !file_path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path.display()));
        }

        let content = fs::read_to_string(file_path).await?;
        let config: PingConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels are: trace, debug, info, warn, error", self.log_level))
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.get_tracing_level()?;
        if self.count == 0 {
            return Err(anyhow::anyhow!("count must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(anyhow::anyhow!("timeout must be at least 1ms"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(destination: &str) -> Args {
        Args { destination: destination.to_string(), ..Default::default() }
    }

    #[test]
    fn cli_defaults() {
        let parsed = Args::try_parse_from(["pinger", "example.org"]).unwrap();
        assert_eq!(parsed.destination, "example.org");
        assert_eq!(parsed.count, None);

        let mut config = PingConfig::default();
        config.apply_args(&parsed);
        assert_eq!(config.count, 10);
        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.output, OutputFormat::Text);
    }

    #[test]
    fn cli_short_flags() {
        let parsed =
            Args::try_parse_from(["pinger", "-c", "3", "-t", "250", "--json", "10.0.0.1"]).unwrap();
        let mut config = PingConfig::default();
        config.apply_args(&parsed);
        assert_eq!(config.count, 3);
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.output, OutputFormat::Json);
    }

    #[test]
    fn destination_is_required() {
        assert!(Args::try_parse_from(["pinger"]).is_err());
    }

    #[test]
    fn file_values_fill_defaults() {
        let config: PingConfig =
            serde_json::from_str(r#"{"count": 4, "enable_latency_history": true}"#).unwrap();
        assert_eq!(config.count, 4);
        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.log_level, "info");
        assert!(config.enable_latency_history);
        assert_eq!(config.metrics_addr, None);
    }

    #[test]
    fn flags_override_file() {
        let mut config: PingConfig =
            serde_json::from_str(r#"{"count": 4, "timeout_ms": 50, "output": "json"}"#).unwrap();
        let mut overrides = args("h");
        overrides.count = Some(8);
        config.apply_args(&overrides);
        assert_eq!(config.count, 8);
        assert_eq!(config.timeout_ms, 50);
        assert_eq!(config.output, OutputFormat::Json);
    }

    #[test]
    fn rejects_bad_values() {
        let config = PingConfig { log_level: "loud".into(), ..Default::default() };
        assert!(config.validate().is_err());
        let config = PingConfig { count: 0, ..Default::default() };
        assert!(config.validate().is_err());
        let config = PingConfig { timeout_ms: 0, ..Default::default() };
        assert!(config.validate().is_err());
        assert!(PingConfig::default().validate().is_ok());
    }

    #[test]
    fn log_levels() {
        let config = PingConfig { log_level: "WARNING".into(), ..Default::default() };
        assert_eq!(config.get_tracing_level().unwrap(), tracing::Level::WARN);
    }

    #[tokio::test]
    async fn missing_config_file_is_fatal() {
        let mut overrides = args("h");
        overrides.config = Some(PathBuf::from("/nonexistent/pinger.json"));
        assert!(PingConfig::load(&overrides).await.is_err());
    }

    #[tokio::test]
    async fn loads_config_file() {
        let path = std::env::temp_dir().join(format!("pinger-config-{}.json", std::process::id()));
        fs::write(&path, r#"{"count": 2, "log_level": "debug"}"#).await.unwrap();
        let mut overrides = args("h");
        overrides.config = Some(path.clone());

        let config = PingConfig::load(&overrides).await.unwrap();
        let _ = fs::remove_file(&path).await;
        assert_eq!(config.count, 2);
        assert_eq!(config.get_tracing_level().unwrap(), tracing::Level::DEBUG);
    }
}
