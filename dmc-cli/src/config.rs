//! Configuration for the `dmc` command.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use dmc_client::{ChannelConfig, RemainderPolicy, TextEncoding};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "dmc")]
#[command(version)]
#[command(about = "Send one delimited text message and print the reply", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Remote host
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Remote port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Message delimiter agreed with the peer
    #[arg(short, long)]
    pub delimiter: Option<String>,

    /// Read chunk size in bytes
    #[arg(short, long)]
    pub buffer_size: Option<usize>,

    /// Text encoding (ascii, latin1, utf-8, utf-16le, utf-16be)
    #[arg(short, long)]
    pub encoding: Option<TextEncoding>,

    /// Keep bytes read past a delimiter instead of dropping them
    #[arg(long)]
    pub retain_remainder: bool,

    /// Send the message exactly as given, without appending the delimiter
    #[arg(long)]
    pub no_append_delimiter: bool,

    /// Connect timeout in milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Read timeout in milliseconds
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Message to send
    pub message: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub channel: ChannelSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Channel-related configuration
#[derive(Debug, Deserialize)]
pub struct ChannelSection {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: Option<u16>,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default)]
    pub encoding: TextEncoding,
    #[serde(default)]
    pub retain_remainder: bool,
    pub max_message_size: Option<usize>,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            delimiter: default_delimiter(),
            buffer_size: default_buffer_size(),
            encoding: TextEncoding::default(),
            retain_remainder: false,
            max_message_size: None,
            connect_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
            nodelay: default_nodelay(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_delimiter() -> String {
    "<<END>>".to_string()
}

fn default_buffer_size() -> usize {
    1024
}

fn default_nodelay() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub channel: ChannelConfig,
    pub delimiter: String,
    pub buffer_size: usize,
    pub append_delimiter: bool,
    pub message: String,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = match cli.config {
            Some(ref path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|source| ConfigError::FileRead {
                        path: path.clone(),
                        source,
                    })?;
                toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
                    path: path.clone(),
                    source,
                })?
            }
            None => TomlConfig::default(),
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args over file values.
    pub fn merge(cli: CliArgs, file: TomlConfig) -> Result<Self, ConfigError> {
        let section = file.channel;

        let port = cli.port.or(section.port).ok_or(ConfigError::MissingPort)?;
        let buffer_size = cli.buffer_size.unwrap_or(section.buffer_size);
        if buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        let delimiter = cli.delimiter.unwrap_or(section.delimiter);
        if delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }

        let remainder = if cli.retain_remainder || section.retain_remainder {
            RemainderPolicy::Retain
        } else {
            RemainderPolicy::Discard
        };

        let channel = ChannelConfig {
            host: cli.host.unwrap_or(section.host),
            port,
            encoding: cli.encoding.unwrap_or(section.encoding),
            remainder,
            max_message_size: section.max_message_size,
            connect_timeout: cli
                .connect_timeout_ms
                .or(section.connect_timeout_ms)
                .map(Duration::from_millis),
            read_timeout: cli
                .read_timeout_ms
                .or(section.read_timeout_ms)
                .map(Duration::from_millis),
            write_timeout: section.write_timeout_ms.map(Duration::from_millis),
            nodelay: section.nodelay,
        };

        Ok(Config {
            channel,
            delimiter,
            buffer_size,
            append_delimiter: !cli.no_append_delimiter,
            message: cli.message,
            log_level: cli.log_level.unwrap_or(file.logging.level),
        })
    }

    /// Text written to the peer.
    pub fn outgoing(&self) -> String {
        if self.append_delimiter {
            format!("{}{}", self.message, self.delimiter)
        } else {
            self.message.clone()
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    FileRead { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file '{}': {source}", .path.display())]
    TomlParse { path: PathBuf, source: toml::de::Error },

    #[error("no port given on the command line or in the config file")]
    MissingPort,

    #[error("buffer size must be greater than zero")]
    ZeroBufferSize,

    #[error("delimiter must not be empty")]
    EmptyDelimiter,
}
