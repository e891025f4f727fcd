//! Emulated TV device.
//!
//! Implements the application, settings, input, health, and telemetry
//! operations over in-memory state, so a bridge can be exercised without
//! real hardware. Telemetry samples report live process-host figures
//! collected with sysinfo.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Instant;

use sysinfo::System;

use dab_bridge_framework::{Capability, Device};
use dab_common::{DabError, Result, Value};

/// Application lifecycle states the emulator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppState {
    Stopped,
    Foreground,
    Background,
}

impl AppState {
    fn as_str(&self) -> &'static str {
        match self {
            AppState::Stopped => "STOPPED",
            AppState::Foreground => "FOREGROUND",
            AppState::Background => "BACKGROUND",
        }
    }
}

struct AppRecord {
    state: AppState,
    content_id: Option<String>,
}

/// Key codes the emulator accepts.
const KEY_CODES: &[&str] = &[
    "KEY_POWER",
    "KEY_HOME",
    "KEY_BACK",
    "KEY_UP",
    "KEY_DOWN",
    "KEY_LEFT",
    "KEY_RIGHT",
    "KEY_ENTER",
    "KEY_VOLUME_UP",
    "KEY_VOLUME_DOWN",
    "KEY_MUTE",
    "KEY_PLAY_PAUSE",
];

/// An emulated TV with a fixed application set and a small settings tree.
pub struct TvEmulator {
    device_id: String,
    apps: BTreeMap<String, AppRecord>,
    settings: Value,
    system: System,
    started: Instant,
}

impl TvEmulator {
    pub fn new(device_id: impl Into<String>) -> Self {
        let mut apps = BTreeMap::new();
        for app_id in ["netflix", "prime-video", "youtube"] {
            apps.insert(
                app_id.to_owned(),
                AppRecord {
                    state: AppState::Stopped,
                    content_id: None,
                },
            );
        }

        let mut settings = Value::default();
        settings
            .set("language", "en-US")
            .set("outputResolution", "2160p")
            .set("screenSaver", true)
            .set("volume", 25);

        Self {
            device_id: device_id.into(),
            apps,
            settings,
            system: System::new_all(),
            started: Instant::now(),
        }
    }

    /// The emulator stands in for devices reachable on the local host.
    pub fn is_compatible(ip_address: &str) -> bool {
        if ip_address.is_empty() || ip_address == "localhost" {
            return true;
        }
        ip_address
            .parse::<IpAddr>()
            .is_ok_and(|addr| addr.is_loopback())
    }

    fn app_mut(&mut self, app_id: &str) -> Result<&mut AppRecord> {
        self.apps
            .get_mut(app_id)
            .ok_or_else(|| DabError::bad_request(format!("unknown application \"{app_id}\"")))
    }

    fn bring_to_foreground(&mut self, app_id: &str) -> Result<()> {
        self.app_mut(app_id)?;
        for (id, record) in &mut self.apps {
            if record.state == AppState::Foreground && id != app_id {
                record.state = AppState::Background;
            }
        }
        self.app_mut(app_id)?.state = AppState::Foreground;
        Ok(())
    }
}

impl Device for TvEmulator {
    fn capabilities(&self) -> &[Capability] {
        &[
            Capability::AppList,
            Capability::AppLaunch,
            Capability::AppLaunchWithContent,
            Capability::AppGetState,
            Capability::AppExit,
            Capability::DeviceInfo,
            Capability::SystemSettingsList,
            Capability::SystemSettingsGet,
            Capability::SystemSettingsSet,
            Capability::InputKeyList,
            Capability::InputKeyPress,
            Capability::InputLongKeyPress,
            Capability::HealthCheckGet,
            Capability::DeviceTelemetry,
            Capability::AppTelemetry,
        ]
    }

    fn app_list(&mut self) -> Result<Value> {
        let mut reply = Value::default();
        let list = reply.entry("applications").make_array()?;
        for (app_id, record) in &self.apps {
            list.push(Value::from_literal(vec![
                Value::pair("appId", app_id.as_str()),
                Value::pair("state", record.state.as_str()),
            ]))?;
        }
        Ok(reply)
    }

    fn app_launch(&mut self, app_id: String, _parameters: Value) -> Result<Value> {
        self.bring_to_foreground(&app_id)?;
        tracing::debug!(device = %self.device_id, app = %app_id, "application launched");
        Ok(Value::Null)
    }

    fn app_launch_with_content(
        &mut self,
        app_id: String,
        content_id: String,
        _parameters: Value,
    ) -> Result<Value> {
        self.bring_to_foreground(&app_id)?;
        self.app_mut(&app_id)?.content_id = Some(content_id);
        Ok(Value::Null)
    }

    fn app_get_state(&mut self, app_id: String) -> Result<Value> {
        let record = self.app_mut(&app_id)?;
        let mut reply = Value::pair("state", record.state.as_str());
        if let Some(content_id) = &record.content_id {
            reply.set("contentId", content_id.as_str());
        }
        Ok(reply)
    }

    fn app_exit(&mut self, app_id: String, background: bool) -> Result<Value> {
        let record = self.app_mut(&app_id)?;
        record.state = if background {
            AppState::Background
        } else {
            record.content_id = None;
            AppState::Stopped
        };
        Ok(Value::pair("state", record.state.as_str()))
    }

    fn device_info(&mut self) -> Result<Value> {
        Ok(Value::from_literal(vec![
            Value::pair("deviceId", self.device_id.as_str()),
            Value::pair("manufacturer", "Emulated Devices Inc"),
            Value::pair("model", "TV-EMU-4K"),
            Value::pair("serialNumber", "EMU00000001"),
            Value::pair("firmwareVersion", env!("CARGO_PKG_VERSION")),
        ]))
    }

    fn system_settings_list(&mut self) -> Result<Value> {
        Ok(Value::pair("settings", self.settings.clone()))
    }

    fn system_settings_get(&mut self) -> Result<Value> {
        Ok(self.settings.clone())
    }

    fn system_settings_set(&mut self, envelope: Value) -> Result<Value> {
        let mut reply = Value::default();
        reply.make_object()?;
        let Ok(payload) = envelope.get("payload") else {
            return Ok(reply);
        };
        for (key, value) in payload.members()? {
            if !self.settings.has(key) {
                return Err(DabError::bad_request(format!("unknown setting \"{key}\"")));
            }
            self.settings.set(key, value.clone());
            reply.set(key, value.clone());
        }
        Ok(reply)
    }

    fn input_key_list(&mut self) -> Result<Value> {
        let mut reply = Value::default();
        let list = reply.entry("keyCodes").make_array()?;
        for key in KEY_CODES {
            list.push(*key)?;
        }
        Ok(reply)
    }

    fn input_key_press(&mut self, key_code: String) -> Result<Value> {
        if !KEY_CODES.contains(&key_code.as_str()) {
            return Err(DabError::bad_request(format!(
                "unknown keyCode \"{key_code}\""
            )));
        }
        tracing::debug!(device = %self.device_id, key = %key_code, "key pressed");
        Ok(Value::Null)
    }

    fn input_long_key_press(&mut self, key_code: String, duration_ms: i64) -> Result<Value> {
        if duration_ms <= 0 {
            return Err(DabError::bad_request("invalid durationMs"));
        }
        self.input_key_press(key_code)
    }

    fn health_check_get(&mut self) -> Result<Value> {
        Ok(Value::from_literal(vec![
            Value::pair("healthy", true),
            Value::pair("uptimeMs", self.started.elapsed().as_millis() as i64),
        ]))
    }

    fn device_telemetry(&mut self) -> Result<Value> {
        self.system.refresh_memory();
        self.system.refresh_cpu_usage();
        Ok(Value::from_literal(vec![
            Value::pair("cpuPercent", f64::from(self.system.global_cpu_usage())),
            Value::pair("memoryTotalBytes", self.system.total_memory()),
            Value::pair("memoryUsedBytes", self.system.used_memory()),
            Value::pair("uptimeSecs", System::uptime()),
        ]))
    }

    fn app_telemetry(&mut self, app_id: String) -> Result<Value> {
        let record = self.app_mut(&app_id)?;
        Ok(Value::from_literal(vec![
            Value::pair("appId", app_id.as_str()),
            Value::pair("state", record.state.as_str()),
        ]))
    }
}
