//! Ledger Configuration
//!
//! Supports loading from environment variables with the `HL_` prefix.

use std::env;
use std::path::PathBuf;

use hl_core::{logging::LogLevel, DEFAULT_EPOCH_MS, MAX_RECORD_BYTES};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::telemetry::{LogConfig, LogFormat};

/// What to do when a record handler refuses a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HandlerErrorPolicy {
    /// Log the failure and commit the record anyway
    #[default]
    Log,
    /// Reject the record with `ProcessingFailed`
    Reject,
}

impl HandlerErrorPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "log" | "continue" => Some(Self::Log),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Whether owner keys must hold a role the scope policy permits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationMode {
    /// Any valid owner signature is accepted
    #[default]
    Off,
    Enforce,
}

impl AuthorizationMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "none" => Some(Self::Off),
            "enforce" | "on" => Some(Self::Enforce),
            _ => None,
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Root directory of the file blob store
    pub data_dir: PathBuf,
    /// Canonical size limit for a submission's `data`
    pub max_record_bytes: usize,
    pub handler_errors: HandlerErrorPolicy,
    pub authorization: AuthorizationMode,
    /// Usher fingerprints accepted on stored records; empty accepts any
    #[serde(default)]
    pub trusted_witnesses: Vec<String>,
    /// Unix milliseconds of micromark zero
    pub epoch_ms: i64,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./hl-data"),
            max_record_bytes: MAX_RECORD_BYTES,
            handler_errors: HandlerErrorPolicy::default(),
            authorization: AuthorizationMode::default(),
            trusted_witnesses: Vec::new(),
            epoch_ms: DEFAULT_EPOCH_MS,
            log: LogConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - HL_DATA_DIR: blob store directory
    /// - HL_MAX_RECORD_BYTES: size limit on a submission's canonical `data`
    /// - HL_HANDLER_ERRORS: `log` or `reject`
    /// - HL_AUTHORIZATION: `off` or `enforce`
    /// - HL_TRUSTED_WITNESSES: comma separated usher fingerprints
    /// - HL_EPOCH_MS: ledger epoch in Unix milliseconds
    /// - HL_LOG_LEVEL, HL_LOG_FORMAT, HL_LOG_FILTER: logging
    pub fn from_env() -> LedgerResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> LedgerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("HL_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup("HL_MAX_RECORD_BYTES") {
            config.max_record_bytes = parse_number("HL_MAX_RECORD_BYTES", &v)?;
        }
        if let Some(v) = lookup("HL_HANDLER_ERRORS") {
            config.handler_errors =
                HandlerErrorPolicy::parse(&v).ok_or_else(|| invalid("HL_HANDLER_ERRORS", &v))?;
        }
        if let Some(v) = lookup("HL_AUTHORIZATION") {
            config.authorization =
                AuthorizationMode::parse(&v).ok_or_else(|| invalid("HL_AUTHORIZATION", &v))?;
        }
        if let Some(v) = lookup("HL_TRUSTED_WITNESSES") {
            config.trusted_witnesses = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("HL_EPOCH_MS") {
            config.epoch_ms = parse_number("HL_EPOCH_MS", &v)?;
        }
        if let Some(v) = lookup("HL_LOG_LEVEL") {
            config.log.level = LogLevel::parse(&v).ok_or_else(|| invalid("HL_LOG_LEVEL", &v))?;
        }
        if let Some(v) = lookup("HL_LOG_FORMAT") {
            config.log.format = LogFormat::parse(&v).ok_or_else(|| invalid("HL_LOG_FORMAT", &v))?;
        }
        config.log.filter = lookup("HL_LOG_FILTER").filter(|f| !f.is_empty());

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.max_record_bytes == 0 {
            return Err(LedgerError::Config(
                "max_record_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> LedgerResult<T> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

fn invalid(name: &str, value: &str) -> LedgerError {
    LedgerError::Config(format!("invalid {}: '{}'", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.max_record_bytes, 1024);
        assert_eq!(config.handler_errors, HandlerErrorPolicy::Log);
        assert_eq!(config.authorization, AuthorizationMode::Off);
        assert_eq!(config.epoch_ms, DEFAULT_EPOCH_MS);
        assert!(config.trusted_witnesses.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("HL_DATA_DIR", "/var/lib/hl"),
            ("HL_MAX_RECORD_BYTES", "2048"),
            ("HL_HANDLER_ERRORS", "reject"),
            ("HL_AUTHORIZATION", "Enforce"),
            ("HL_TRUSTED_WITNESSES", "a, b,,c"),
            ("HL_LOG_FORMAT", "json"),
            ("HL_LOG_LEVEL", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/hl"));
        assert_eq!(config.max_record_bytes, 2048);
        assert_eq!(config.handler_errors, HandlerErrorPolicy::Reject);
        assert_eq!(config.authorization, AuthorizationMode::Enforce);
        assert_eq!(config.trusted_witnesses, vec!["a", "b", "c"]);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_values() {
        for vars in [
            [("HL_MAX_RECORD_BYTES", "lots")],
            [("HL_MAX_RECORD_BYTES", "0")],
            [("HL_AUTHORIZATION", "maybe")],
            [("HL_EPOCH_MS", "yesterday")],
        ] {
            let err = LedgerConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, LedgerError::Config(_)));
        }
    }
}
