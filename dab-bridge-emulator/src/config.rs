use serde::{Deserialize, Serialize};

use dab_bridge_framework::BridgeConfig;
use dab_common::{BaseConfig, DabError, LoggingConfig, Result};

/// Emulator-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// deviceId the emulated TV registers under.
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Address reported in discovery replies.
    #[serde(default = "default_ip_address")]
    pub ip_address: String,

    /// Telemetry interval the demo requests, in milliseconds.
    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: i64,
}

fn default_device_id() -> String {
    "emulator".to_string()
}

fn default_ip_address() -> String {
    "127.0.0.1".to_string()
}

fn default_telemetry_interval_ms() -> i64 {
    250
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            ip_address: default_ip_address(),
            telemetry_interval_ms: default_telemetry_interval_ms(),
        }
    }
}

/// Full configuration of the emulator bridge binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmulatorBridgeConfig {
    #[serde(flatten)]
    pub base: BaseConfig,

    #[serde(default)]
    pub emulator: EmulatorConfig,
}

impl BridgeConfig for EmulatorBridgeConfig {
    fn logging(&self) -> &LoggingConfig {
        &self.base.logging
    }

    fn validate(&self) -> Result<()> {
        if self.emulator.device_id.is_empty() || self.emulator.device_id.contains('/') {
            return Err(DabError::config(
                "emulator.device_id must be non-empty and free of '/'",
            ));
        }
        if self.emulator.telemetry_interval_ms <= 0 {
            return Err(DabError::config(
                "emulator.telemetry_interval_ms must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dab_common::parse_config;

    #[test]
    fn test_defaults() {
        let config: EmulatorBridgeConfig = parse_config("{}").unwrap();
        assert_eq!(config.emulator.device_id, "emulator");
        assert_eq!(config.emulator.ip_address, "127.0.0.1");
        assert_eq!(config.emulator.telemetry_interval_ms, 250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layered_sections() {
        let config: EmulatorBridgeConfig = parse_config(
            r#"
            {
                broker: { host: "broker.local" },
                logging: { level: "debug" },
                emulator: { device_id: "tv1", telemetry_interval_ms: 100 },
            }
            "#,
        )
        .unwrap();
        assert_eq!(config.base.broker.host, "broker.local");
        assert_eq!(config.logging().level, "debug");
        assert_eq!(config.emulator.device_id, "tv1");
        assert_eq!(config.emulator.telemetry_interval_ms, 100);
    }

    #[test]
    fn test_validation_rejects_bad_device_id() {
        let config: EmulatorBridgeConfig =
            parse_config(r#"{ emulator: { device_id: "a/b" } }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_positive_interval() {
        let config: EmulatorBridgeConfig =
            parse_config(r#"{ emulator: { telemetry_interval_ms: 0 } }"#).unwrap();
        assert!(config.validate().is_err());
    }
}
