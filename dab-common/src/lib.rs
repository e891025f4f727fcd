//! DAB Common Library
//!
//! Shared types and utilities for the DAB bridge runtime:
//!
//! - [`json`] - The JSON value model used for every envelope, reply, and
//!   telemetry sample, with the relaxed parser and compact serializer the
//!   wire format requires
//! - [`topic`] - Topic grammar builders and parser
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`error`] - Error types and the DAB status taxonomy

pub mod config;
pub mod error;
pub mod json;
pub mod topic;

// Re-export commonly used types at the crate root
pub use config::{BaseConfig, BrokerConfig, LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{DabError, JsonError, Result};
pub use json::{Value, parse};
pub use topic::{DAB_PREFIX, DISCOVERY_TOPIC, ParsedTopic, parse_topic};

/// Install the global tracing subscriber for a bridge binary.
///
/// The filter comes from `RUST_LOG` when set, otherwise from the
/// configured `level` directive, which is validated here. The format
/// switches between human-readable lines and one JSON record per line.
///
/// # Example
///
/// ```ignore
/// use dab_common::{LoggingConfig, init_tracing};
///
/// init_tracing(&LoggingConfig::default())?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| DabError::config(format!("bad log filter '{}': {e}", config.level)))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    }
    .map_err(|e| DabError::config(format!("cannot install tracing subscriber: {e}")))
}
