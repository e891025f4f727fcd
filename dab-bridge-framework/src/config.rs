//! Configuration trait for bridge binaries.

use std::path::Path;

use serde::de::DeserializeOwned;

use dab_common::{load_config, LoggingConfig, Result};

/// Configuration contract every bridge binary's config type fulfills.
///
/// Provides loading from JSON5 and access to the common sections; the
/// binary's own config struct layers its device-specific settings on
/// top.
pub trait BridgeConfig: DeserializeOwned + Send + 'static {
    /// Load and validate the configuration from a JSON5 file.
    fn load(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Sized,
    {
        let config: Self = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Logging section.
    fn logging(&self) -> &LoggingConfig;

    /// Hook for cross-field validation; the default accepts everything.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dab_common::{parse_config, BaseConfig, DabError};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct TestConfig {
        #[serde(flatten)]
        base: BaseConfig,
        #[serde(default)]
        device_id: String,
    }

    impl BridgeConfig for TestConfig {
        fn logging(&self) -> &LoggingConfig {
            &self.base.logging
        }

        fn validate(&self) -> Result<()> {
            if self.device_id.contains('/') {
                return Err(DabError::config("device_id must not contain '/'"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_layered_config_parses() {
        let config: TestConfig =
            parse_config(r#"{ device_id: "tv1", logging: { level: "debug" } }"#).unwrap();
        assert_eq!(config.device_id, "tv1");
        assert_eq!(config.logging().level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_hook() {
        let config: TestConfig = parse_config(r#"{ device_id: "bad/id" }"#).unwrap();
        assert!(config.validate().is_err());
    }
}
