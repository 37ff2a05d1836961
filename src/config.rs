// src/config.rs

//! Manages server configuration: loading, defaults, and validation.

use crate::core::protocol::DEFAULT_MAX_LINE_LENGTH;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use strum_macros::{Display, EnumString};
use tracing::warn;

/// The config file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "sessiond.toml";

/// How accepted connections are scheduled.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DispatchStrategy {
    /// One control thread multiplexes every connection by waiting for readiness.
    Poll,
    /// One task per connection; tasks share only the account registry.
    #[default]
    Worker,
}

/// Represents the server configuration as loaded from file and defaults.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Connections beyond this count are closed on arrival.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// The longest accepted request line, excluding the CRLF terminator.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Path of the `username status` directory loaded at startup.
    #[serde(default = "default_accounts_file")]
    pub accounts_file: String,
    #[serde(default)]
    pub dispatch: DispatchStrategy,
    /// When set, every processed request is appended to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_log: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5550
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    1024
}
fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}
fn default_accounts_file() -> String {
    "account.txt".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            max_line_length: default_max_line_length(),
            accounts_file: default_accounts_file(),
            dispatch: DispatchStrategy::default(),
            activity_log: None,
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config file '{path}'"))
    }

    /// Parses configuration from TOML text. Values are checked by [`Config::validate`]
    /// once command-line overrides have been applied.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse TOML")
    }

    /// Loads the named file, or falls back to defaults when no file was named and the
    /// default path does not exist.
    pub fn load(explicit_path: Option<&str>) -> Result<Self> {
        match explicit_path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    /// Validates the resolved configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.max_line_length == 0 {
            return Err(anyhow!("max_line_length cannot be 0"));
        }
        if self.accounts_file.trim().is_empty() {
            return Err(anyhow!("accounts_file cannot be empty"));
        }
        if self.dispatch == DispatchStrategy::Poll && self.max_clients > 4096 {
            warn!(
                "max_clients = {} with the poll dispatcher; every readiness wait scans all connections.",
                self.max_clients
            );
        }
        Ok(())
    }
}
