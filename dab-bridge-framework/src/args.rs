//! Command-line surface shared by bridge binaries.

use std::path::{Path, PathBuf};

use clap::Parser;

use dab_common::LoggingConfig;

/// Arguments every DAB bridge binary accepts.
#[derive(Parser, Debug, Clone)]
#[command(about = "DAB device bridge", version)]
pub struct BridgeArgs {
    /// Configuration file (JSON5). Each binary falls back to its own
    /// default path when omitted.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Filter directive overriding the configured log level.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Parse the process arguments.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// The configuration path to load, falling back to `default` when
    /// `--config` was not given.
    pub fn config_path<'a>(&'a self, default: &'a str) -> &'a Path {
        self.config.as_deref().unwrap_or_else(|| Path::new(default))
    }

    /// Fold the CLI overrides into a loaded logging section.
    pub fn apply_to(&self, logging: &mut LoggingConfig) {
        if let Some(level) = &self.log_level {
            logging.level.clone_from(level);
        }
    }
}
