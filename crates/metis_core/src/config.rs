//! Server configuration.
//!
//! # Responsibility
//! - Hold RPC, web, storage, document-service and logging settings.
//! - Load JSON configuration with per-field defaults.
//!
//! # Invariants
//! - A validated config has a non-empty webhook token, a usable collection
//!   name and non-zero ports.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub const DEFAULT_RPC_PORT: u16 = 10118;
pub const DEFAULT_WEB_PORT: u16 = 10119;
pub const DEFAULT_DATABASE_PATH: &str = "metis.sqlite3";
pub const DEFAULT_DOCUMENT_RPC_ADDR: &str = "localhost:11101";
pub const DEFAULT_WEBHOOK_TOKEN: &str = "metis-server";
pub const DEFAULT_COLLECTION: &str = "projects";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read config: {err}"),
            Self::Parse(err) => write!(f, "cannot parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RpcConfig {
    pub port: u16,
    pub cert_file: String,
    pub key_file: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_RPC_PORT,
            cert_file: String::new(),
            key_file: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WebConfig {
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_WEB_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DATABASE_PATH.to_string(),
        }
    }
}

/// Settings for the external collaborative document service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    #[serde(rename = "RPCAddr")]
    pub rpc_addr: String,
    /// Token the server uses for its own sessions; also always allowed by
    /// the auth webhook.
    #[serde(rename = "WebhookToken")]
    pub webhook_token: String,
    #[serde(rename = "Collection")]
    pub collection: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            rpc_addr: DEFAULT_DOCUMENT_RPC_ADDR.to_string(),
            webhook_token: DEFAULT_WEBHOOK_TOKEN.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LogConfig {
    pub level: String,
    /// Absolute directory for rolling log files; empty logs to stderr.
    pub dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: String::new(),
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "RPC")]
    pub rpc: RpcConfig,
    #[serde(rename = "Web")]
    pub web: WebConfig,
    #[serde(rename = "Database")]
    pub database: DatabaseConfig,
    #[serde(rename = "Document")]
    pub document: DocumentConfig,
    #[serde(rename = "Log")]
    pub log: LogConfig,
}

impl Config {
    /// Parses and validates a JSON config. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.port == 0 || self.web.port == 0 {
            return Err(ConfigError::Invalid("ports must be non-zero".to_string()));
        }
        if self.rpc.port == self.web.port {
            return Err(ConfigError::Invalid(format!(
                "RPC and Web ports must differ, both are {}",
                self.rpc.port
            )));
        }
        if self.document.webhook_token.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Document.WebhookToken must not be empty".to_string(),
            ));
        }
        let collection = self.document.collection.as_str();
        if collection.is_empty() || collection.contains('$') {
            return Err(ConfigError::Invalid(format!(
                "Document.Collection `{collection}` must be non-empty and must not contain `$`"
            )));
        }
        Ok(())
    }

    /// Local address clients use to reach the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("localhost:{}", self.rpc.port)
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, DEFAULT_COLLECTION, DEFAULT_RPC_PORT};

    #[test]
    fn empty_json_yields_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.rpc.port, DEFAULT_RPC_PORT);
        assert_eq!(config.document.collection, DEFAULT_COLLECTION);
        assert_eq!(config.rpc_addr(), "localhost:10118");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_json_str(
            r#"{"RPC": {"Port": 20118}, "Document": {"Collection": "designs"}}"#,
        )
        .unwrap();
        assert_eq!(config.rpc.port, 20118);
        assert_eq!(config.document.collection, "designs");
        assert_eq!(config.document.webhook_token, "metis-server");
    }

    #[test]
    fn invalid_collection_and_token_are_rejected() {
        let err = Config::from_json_str(r#"{"Document": {"Collection": "a$b"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Config::from_json_str(r#"{"Document": {"WebhookToken": " "}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metis.json");
        std::fs::write(&path, r#"{"Web": {"Port": 30119}}"#).unwrap();
        assert_eq!(Config::load(&path).unwrap().web.port, 30119);
    }
}
