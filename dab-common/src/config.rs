use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DabError, Result};

/// Broker endpoint a transport layer would connect the bridge to. The
/// core never dials it; the section exists so every bridge binary shares
/// one configuration shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname or address.
    #[serde(default = "default_broker_host")]
    pub host: String,

    /// Broker port.
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON record per line, for log shippers.
    Json,
}

/// Logging section shared by every bridge binary.
///
/// `level` takes any tracing filter directive: a bare level like
/// `"debug"`, or a per-target filter such as
/// `"info,dab_bridge_framework=trace"`. The directive is validated when
/// the subscriber is installed, not at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

/// Base configuration shared by all bridge binaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseConfig {
    /// Broker endpoint.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parse a configuration document in JSON5 format.
pub fn parse_config<T: DeserializeOwned>(text: &str) -> Result<T> {
    json5::from_str(text).map_err(|e| DabError::config(e.to_string()))
}

/// Read and parse a JSON5 configuration file. Errors carry the path they
/// came from.
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| DabError::config(format!("cannot read {}: {e}", path.display())))?;
    parse_config(&text).map_err(|e| match e {
        DabError::Config(message) => {
            DabError::config(format!("{}: {message}", path.display()))
        }
        other => other,
    })
}
