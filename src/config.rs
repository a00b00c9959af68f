//! Configuration module for the control-channel server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Command-line arguments for the control-channel server
#[derive(Parser, Debug)]
#[command(name = "dspy-channel")]
#[command(version)]
#[command(about = "Control-channel server for display and render drivers", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to; port 0 lets the OS pick one (e.g., 127.0.0.1:0)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Maximum number of concurrent connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Listen backlog for the server socket
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Seconds to wait for open sessions after shutdown is requested
    #[arg(long)]
    pub drain_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Number of worker threads
    pub workers: Option<usize>,
    /// Maximum number of concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    /// Shutdown drain timeout in seconds
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            workers: None,
            max_connections: default_max_connections(),
            backlog: default_backlog(),
            drain_timeout: default_drain_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:0".to_string()
}

fn default_max_connections() -> usize {
    1024
}

fn default_backlog() -> i32 {
    128
}

fn default_drain_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub workers: Option<usize>,
    pub max_connections: usize,
    pub backlog: i32,
    pub drain_timeout: u64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they name, if any.
    /// CLI arguments take precedence over TOML file values.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let listen = cli.listen.unwrap_or(toml_config.server.listen);
        let listen: SocketAddr = listen
            .parse()
            .map_err(|e| ConfigError::InvalidListen(listen.clone(), e))?;

        let max_connections = cli
            .max_connections
            .unwrap_or(toml_config.server.max_connections);
        if max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections);
        }

        Ok(Config {
            listen,
            workers: cli.workers.or(toml_config.server.workers),
            max_connections,
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            drain_timeout: cli
                .drain_timeout
                .unwrap_or(toml_config.server.drain_timeout),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid listen address '{0}': {1}")]
    InvalidListen(String, #[source] std::net::AddrParseError),

    #[error("max_connections must be at least 1")]
    InvalidMaxConnections,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("dspy-channel").chain(args.iter().copied()))
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "127.0.0.1:0");
        assert_eq!(config.server.max_connections, 1024);
        assert_eq!(config.server.drain_timeout, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "0.0.0.0:9999"
            workers = 4
            max_connections = 8

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:9999");
        assert_eq!(config.server.workers, Some(4));
        assert_eq!(config.server.max_connections, 8);
        assert_eq!(config.server.backlog, 128);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            listen = "0.0.0.0:9999"
            drain_timeout = 30

            [logging]
            level = "warn"
        "#,
        )
        .unwrap();

        let config = Config::merge(
            cli(&["--listen", "127.0.0.1:7000", "--log-level", "trace"]),
            toml_config,
        )
        .unwrap();
        assert_eq!(config.listen, "127.0.0.1:7000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.drain_timeout, 30);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_invalid_listen() {
        let err = Config::merge(cli(&["--listen", "localhost"]), TomlConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidListen(ref addr, _) if addr == "localhost"));
    }

    #[test]
    fn test_zero_max_connections_rejected() {
        let err = Config::merge(cli(&["--max-connections", "0"]), TomlConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMaxConnections));

        let toml_config: TomlConfig = toml::from_str("[server]\nmax_connections = 0").unwrap();
        let err = Config::merge(cli(&[]), toml_config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMaxConnections));
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::from_args(cli(&["--config", "/nonexistent/dspy-channel.toml"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(..)));
    }
}
