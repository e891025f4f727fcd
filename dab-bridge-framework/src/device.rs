//! Device client base.
//!
//! A [`DeviceClient`] owns the operation table for one deviceId, the
//! handle to the user's [`Device`] implementation, and the telemetry
//! scheduler. Handlers run synchronously on whatever thread calls
//! [`DeviceClient::dispatch`]; only telemetry samples originate on the
//! scheduler's worker thread.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dab_common::{topic, DabError, Result, Value};

use crate::dispatch::{arg_bool, arg_i64, arg_string, extract_args};
use crate::publish::{PublishFn, PublishSlot};
use crate::scheduler::TelemetryScheduler;

/// DAB protocol version the client base implements.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Operations a concrete device can take over from the default stubs.
///
/// A device lists the capabilities it implements; everything else keeps
/// the base stub, answers `501 unsupported`, and stays out of
/// `operations/list`. `DeviceTelemetry` and `AppTelemetry` cover the
/// samplers, and through them the advertisement of the telemetry
/// start/stop operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    AppList,
    AppLaunch,
    AppLaunchWithContent,
    AppGetState,
    AppExit,
    DeviceInfo,
    SystemRestart,
    SystemSettingsList,
    SystemSettingsGet,
    SystemSettingsSet,
    InputKeyList,
    InputKeyPress,
    InputLongKeyPress,
    OutputImage,
    DeviceTelemetry,
    AppTelemetry,
    HealthCheckGet,
    VoiceList,
    VoiceSet,
    VoiceSendAudio,
    VoiceSendText,
}

/// A device implementation plugged into the client base.
///
/// Every handler has a default stub failing with `501 unsupported`;
/// implementations override the ones they support and report them
/// through [`Device::capabilities`]. String, integer, and boolean
/// parameters arrive already extracted from the envelope; `Value`
/// parameters carry the raw subtree.
#[allow(unused_variables)]
pub trait Device: Send {
    /// The operations this device actually implements.
    fn capabilities(&self) -> &[Capability];

    fn app_list(&mut self) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn app_launch(&mut self, app_id: String, parameters: Value) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn app_launch_with_content(
        &mut self,
        app_id: String,
        content_id: String,
        parameters: Value,
    ) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn app_get_state(&mut self, app_id: String) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn app_exit(&mut self, app_id: String, background: bool) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn device_info(&mut self) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn system_restart(&mut self) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn system_settings_list(&mut self) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn system_settings_get(&mut self) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    /// Receives the whole request envelope (declared as `"*"`).
    fn system_settings_set(&mut self, envelope: Value) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn input_key_list(&mut self) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn input_key_press(&mut self, key_code: String) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn input_long_key_press(&mut self, key_code: String, duration_ms: i64) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn output_image(&mut self) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    /// Device-scoped telemetry sampler, invoked on the scheduler worker.
    fn device_telemetry(&mut self) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    /// Per-application telemetry sampler, invoked on the scheduler worker.
    fn app_telemetry(&mut self, app_id: String) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn health_check_get(&mut self) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn voice_list(&mut self) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn voice_set(&mut self, voice_system: Value) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn voice_send_audio(&mut self, file_location: String, voice_system: String) -> Result<Value> {
        Err(DabError::Unsupported)
    }

    fn voice_send_text(&mut self, request_text: String, voice_system: String) -> Result<Value> {
        Err(DabError::Unsupported)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerId {
    OpList,
    AppList,
    AppLaunch,
    AppLaunchWithContent,
    AppGetState,
    AppExit,
    DeviceInfo,
    SystemRestart,
    SystemSettingsList,
    SystemSettingsGet,
    SystemSettingsSet,
    InputKeyList,
    InputKeyPress,
    InputLongKeyPress,
    OutputImage,
    DeviceTelemetryStart,
    DeviceTelemetryStop,
    AppTelemetryStart,
    AppTelemetryStop,
    HealthCheckGet,
    VoiceList,
    VoiceSet,
    VoiceSendAudio,
    VoiceSendText,
    Version,
    Discovery,
}

struct OperationSpec {
    suffix: &'static str,
    handler: HandlerId,
    fixed: &'static [&'static str],
    optional: &'static [&'static str],
    /// Which capability marks the operation implemented. `None` means
    /// always implemented (the base provides it).
    detect: Option<Capability>,
}

const fn op(
    suffix: &'static str,
    handler: HandlerId,
    fixed: &'static [&'static str],
    optional: &'static [&'static str],
    detect: Option<Capability>,
) -> OperationSpec {
    OperationSpec {
        suffix,
        handler,
        fixed,
        optional,
        detect,
    }
}

/// The fixed operation catalog every device serves.
const OPERATIONS: &[OperationSpec] = &[
    op("/operations/list", HandlerId::OpList, &[], &[], None),
    op("/applications/list", HandlerId::AppList, &[], &[], Some(Capability::AppList)),
    op(
        "/applications/launch",
        HandlerId::AppLaunch,
        &["appId"],
        &["parameters"],
        Some(Capability::AppLaunch),
    ),
    op(
        "/applications/launch-with-content",
        HandlerId::AppLaunchWithContent,
        &["appId", "contentId"],
        &["parameters"],
        Some(Capability::AppLaunchWithContent),
    ),
    op(
        "/applications/get-state",
        HandlerId::AppGetState,
        &["appId"],
        &[],
        Some(Capability::AppGetState),
    ),
    op(
        "/applications/exit",
        HandlerId::AppExit,
        &["appId"],
        &["background"],
        Some(Capability::AppExit),
    ),
    op("/device/info", HandlerId::DeviceInfo, &[], &[], Some(Capability::DeviceInfo)),
    op("/system/restart", HandlerId::SystemRestart, &[], &[], Some(Capability::SystemRestart)),
    op(
        "/system/settings/list",
        HandlerId::SystemSettingsList,
        &[],
        &[],
        Some(Capability::SystemSettingsList),
    ),
    op(
        "/system/settings/get",
        HandlerId::SystemSettingsGet,
        &[],
        &[],
        Some(Capability::SystemSettingsGet),
    ),
    op(
        "/system/settings/set",
        HandlerId::SystemSettingsSet,
        &["*"],
        &[],
        Some(Capability::SystemSettingsSet),
    ),
    op("/input/key/list", HandlerId::InputKeyList, &[], &[], Some(Capability::InputKeyList)),
    op(
        "/input/key-press",
        HandlerId::InputKeyPress,
        &["keyCode"],
        &[],
        Some(Capability::InputKeyPress),
    ),
    op(
        "/input/long-key-press",
        HandlerId::InputLongKeyPress,
        &["keyCode", "durationMs"],
        &[],
        Some(Capability::InputLongKeyPress),
    ),
    op("/output/image", HandlerId::OutputImage, &[], &[], Some(Capability::OutputImage)),
    op(
        "/device-telemetry/start",
        HandlerId::DeviceTelemetryStart,
        &["duration"],
        &[],
        Some(Capability::DeviceTelemetry),
    ),
    op(
        "/device-telemetry/stop",
        HandlerId::DeviceTelemetryStop,
        &[],
        &[],
        Some(Capability::DeviceTelemetry),
    ),
    op(
        "/app-telemetry/start",
        HandlerId::AppTelemetryStart,
        &["appId", "duration"],
        &[],
        Some(Capability::AppTelemetry),
    ),
    op(
        "/app-telemetry/stop",
        HandlerId::AppTelemetryStop,
        &["appId"],
        &[],
        Some(Capability::AppTelemetry),
    ),
    op(
        "/health-check/get",
        HandlerId::HealthCheckGet,
        &[],
        &[],
        Some(Capability::HealthCheckGet),
    ),
    op("/voice/list", HandlerId::VoiceList, &[], &[], Some(Capability::VoiceList)),
    op(
        "/voice/set",
        HandlerId::VoiceSet,
        &["voiceSystem"],
        &[],
        Some(Capability::VoiceSet),
    ),
    op(
        "/voice/send-audio",
        HandlerId::VoiceSendAudio,
        &["fileLocation"],
        &["voiceSystem"],
        Some(Capability::VoiceSendAudio),
    ),
    op(
        "/voice/send-text",
        HandlerId::VoiceSendText,
        &["requestText"],
        &["voiceSystem"],
        Some(Capability::VoiceSendText),
    ),
    op("/version", HandlerId::Version, &[], &[], None),
];

struct TableEntry {
    handler: HandlerId,
    fixed: &'static [&'static str],
    optional: &'static [&'static str],
    implemented: bool,
}

/// One device instance: the operation table for its deviceId, the
/// user's handler implementation, and the telemetry scheduler.
pub struct DeviceClient {
    device_id: String,
    ip_address: String,
    table: BTreeMap<String, TableEntry>,
    device: Arc<Mutex<Box<dyn Device>>>,
    capabilities: Vec<Capability>,
    publish: PublishSlot,
    scheduler: TelemetryScheduler,
}

impl std::fmt::Debug for DeviceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClient")
            .field("device_id", &self.device_id)
            .field("ip_address", &self.ip_address)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl DeviceClient {
    /// Build the operation table for `device_id` and spawn the telemetry
    /// worker.
    pub fn new(
        device_id: impl Into<String>,
        ip_address: impl Into<String>,
        device: Box<dyn Device>,
    ) -> Result<Self> {
        let device_id = device_id.into();
        let capabilities = device.capabilities().to_vec();

        let mut table = BTreeMap::new();
        for spec in OPERATIONS {
            let implemented = spec
                .detect
                .map_or(true, |capability| capabilities.contains(&capability));
            table.insert(
                topic::operation_topic(&device_id, spec.suffix),
                TableEntry {
                    handler: spec.handler,
                    fixed: spec.fixed,
                    optional: spec.optional,
                    implemented,
                },
            );
        }
        // discovery is answered but never advertised per device
        table.insert(
            topic::DISCOVERY_TOPIC.to_owned(),
            TableEntry {
                handler: HandlerId::Discovery,
                fixed: &[],
                optional: &[],
                implemented: false,
            },
        );

        let publish = PublishSlot::default();
        let scheduler = TelemetryScheduler::new(&device_id, publish.clone())?;

        tracing::debug!(device = %device_id, operations = table.len(), "device instance created");

        Ok(Self {
            device_id,
            ip_address: ip_address.into(),
            table,
            device: Arc::new(Mutex::new(device)),
            capabilities,
            publish,
            scheduler,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    /// Install the sink for telemetry samples published by this device.
    pub fn set_publish_callback(&self, callback: PublishFn) {
        self.publish.set(callback);
    }

    /// Topics this device should be subscribed to: every operation it
    /// advertises as implemented.
    pub fn topics(&self) -> Vec<String> {
        self.table
            .iter()
            .filter(|(_, entry)| entry.implemented)
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    /// Route an envelope to the operation its topic names and shape the
    /// reply. Errors never escape: they come back as
    /// `{"status":…,"error":…}` objects, and any reply without a
    /// `status` gets `200` injected.
    pub fn dispatch(&self, envelope: &Value) -> Value {
        let mut reply = match self.try_dispatch(envelope) {
            Ok(reply) => reply,
            Err(e) => e.to_reply(),
        };
        if !reply.has("status") {
            reply.set("status", 200);
        }
        reply
    }

    fn try_dispatch(&self, envelope: &Value) -> Result<Value> {
        if !envelope.has("topic") {
            return Err(DabError::bad_request("no topic found"));
        }
        let topic = envelope
            .get("topic")?
            .as_str()
            .map_err(|_| DabError::bad_request("topic is malformed"))?;

        // an unknown topic inside a device is a no-op; the reply still
        // carries the default status
        let Some(entry) = self.table.get(topic) else {
            tracing::debug!(device = %self.device_id, topic = %topic, "ignoring unknown topic");
            return Ok(Value::Null);
        };

        let args = extract_args(envelope, entry.fixed, entry.optional)?;
        self.invoke(entry.handler, args)
    }

    fn invoke(&self, handler: HandlerId, args: Vec<Value>) -> Result<Value> {
        let mut args = args.into_iter();
        let mut next = move || args.next().unwrap_or_default();
        match handler {
            HandlerId::OpList => self.op_list(),
            HandlerId::Version => self.version(),
            HandlerId::Discovery => self.discovery(),
            HandlerId::DeviceTelemetryStart => self.device_telemetry_start(arg_i64(next())?),
            HandlerId::DeviceTelemetryStop => self.device_telemetry_stop(),
            HandlerId::AppTelemetryStart => {
                let app_id = arg_string(next())?;
                let duration = arg_i64(next())?;
                self.app_telemetry_start(app_id, duration)
            }
            HandlerId::AppTelemetryStop => self.app_telemetry_stop(arg_string(next())?),
            HandlerId::AppList => self.device_mut().app_list(),
            HandlerId::AppLaunch => {
                let app_id = arg_string(next())?;
                self.device_mut().app_launch(app_id, next())
            }
            HandlerId::AppLaunchWithContent => {
                let app_id = arg_string(next())?;
                let content_id = arg_string(next())?;
                self.device_mut()
                    .app_launch_with_content(app_id, content_id, next())
            }
            HandlerId::AppGetState => self.device_mut().app_get_state(arg_string(next())?),
            HandlerId::AppExit => {
                let app_id = arg_string(next())?;
                let background = arg_bool(next())?;
                self.device_mut().app_exit(app_id, background)
            }
            HandlerId::DeviceInfo => self.device_mut().device_info(),
            HandlerId::SystemRestart => self.device_mut().system_restart(),
            HandlerId::SystemSettingsList => self.device_mut().system_settings_list(),
            HandlerId::SystemSettingsGet => self.device_mut().system_settings_get(),
            HandlerId::SystemSettingsSet => self.device_mut().system_settings_set(next()),
            HandlerId::InputKeyList => self.device_mut().input_key_list(),
            HandlerId::InputKeyPress => self.device_mut().input_key_press(arg_string(next())?),
            HandlerId::InputLongKeyPress => {
                let key_code = arg_string(next())?;
                let duration_ms = arg_i64(next())?;
                self.device_mut().input_long_key_press(key_code, duration_ms)
            }
            HandlerId::OutputImage => self.device_mut().output_image(),
            HandlerId::HealthCheckGet => self.device_mut().health_check_get(),
            HandlerId::VoiceList => self.device_mut().voice_list(),
            HandlerId::VoiceSet => self.device_mut().voice_set(next()),
            HandlerId::VoiceSendAudio => {
                let file_location = arg_string(next())?;
                let voice_system = arg_string(next())?;
                self.device_mut().voice_send_audio(file_location, voice_system)
            }
            HandlerId::VoiceSendText => {
                let request_text = arg_string(next())?;
                let voice_system = arg_string(next())?;
                self.device_mut().voice_send_text(request_text, voice_system)
            }
        }
    }

    fn device_mut(&self) -> MutexGuard<'_, Box<dyn Device>> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `operations/list`: every advertised operation with the
    /// `dab/<deviceId>/` prefix trimmed, in topic order.
    fn op_list(&self) -> Result<Value> {
        let prefix = format!("{}/{}/", topic::DAB_PREFIX, self.device_id);
        let mut reply = Value::default();
        for (full_topic, entry) in &self.table {
            if !entry.implemented {
                continue;
            }
            if let Some(suffix) = full_topic.strip_prefix(&prefix) {
                reply.entry("operations").push(suffix)?;
            }
        }
        Ok(reply)
    }

    fn version(&self) -> Result<Value> {
        let mut reply = Value::default();
        reply.entry("versions").push(PROTOCOL_VERSION)?;
        Ok(reply)
    }

    fn discovery(&self) -> Result<Value> {
        Ok(Value::from_literal(vec![
            Value::pair("ip", self.ip_address.as_str()),
            Value::pair("deviceId", self.device_id.as_str()),
        ]))
    }

    fn device_telemetry_start(&self, duration: i64) -> Result<Value> {
        if !self.capabilities.contains(&Capability::DeviceTelemetry) {
            return Err(DabError::bad_request("device telemetry not supported"));
        }
        let interval = telemetry_interval(duration)?;
        let device = Arc::clone(&self.device);
        self.scheduler.add(
            interval,
            "",
            topic::device_telemetry_topic(&self.device_id),
            Box::new(move || {
                device
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .device_telemetry()
            }),
        );
        Ok(Value::pair("duration", duration))
    }

    fn device_telemetry_stop(&self) -> Result<Value> {
        self.scheduler.remove("");
        Ok(Value::Null)
    }

    fn app_telemetry_start(&self, app_id: String, duration: i64) -> Result<Value> {
        if !self.capabilities.contains(&Capability::AppTelemetry) {
            return Err(DabError::bad_request("app telemetry not supported"));
        }
        let interval = telemetry_interval(duration)?;
        let device = Arc::clone(&self.device);
        let sampler_app_id = app_id.clone();
        self.scheduler.add(
            interval,
            &app_id,
            topic::app_telemetry_topic(&self.device_id, &app_id),
            Box::new(move || {
                device
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .app_telemetry(sampler_app_id.clone())
            }),
        );
        Ok(Value::pair("duration", duration))
    }

    fn app_telemetry_stop(&self, app_id: String) -> Result<Value> {
        self.scheduler.remove(&app_id);
        Ok(Value::Null)
    }
}

fn telemetry_interval(duration_ms: i64) -> Result<Duration> {
    u64::try_from(duration_ms)
        .map(Duration::from_millis)
        .map_err(|_| DabError::bad_request("invalid duration"))
}
