//! Shared parsing helpers and error types used across the config modules.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use domain::common::entity::{Action, Protocol};

// ── Config errors ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("invalid value '{value}' for field '{field}': expected one of {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

impl From<serde_yaml_ng::Error> for ConfigError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        Self::Yaml(e.to_string())
    }
}

// ── Log level / format ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

// ── Parsing helpers ────────────────────────────────────────────────

pub(super) fn parse_action(s: &str, field: &str) -> Result<Action, ConfigError> {
    match s.to_lowercase().as_str() {
        "accept" | "allow" | "pass" => Ok(Action::Accept),
        "drop" | "deny" | "block" => Ok(Action::Drop),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: s.to_string(),
            expected: "accept, drop".to_string(),
        }),
    }
}

pub(super) fn parse_protocol(s: &str, field: &str) -> Result<Protocol, ConfigError> {
    match s.to_lowercase().as_str() {
        "tcp" => Ok(Protocol::Tcp),
        "udp" => Ok(Protocol::Udp),
        "icmp" => Ok(Protocol::Icmp),
        "any" | "*" => Ok(Protocol::Any),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: s.to_string(),
            expected: "tcp, udp, icmp, any".to_string(),
        }),
    }
}

/// Enforce a maximum count on a config collection.
pub(super) fn check_limit(field: &str, count: usize, max: usize) -> Result<(), ConfigError> {
    if count > max {
        return Err(ConfigError::Validation {
            field: field.to_string(),
            message: format!("count {count} exceeds maximum {max}"),
        });
    }
    Ok(())
}
