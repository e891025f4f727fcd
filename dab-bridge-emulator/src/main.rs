//! DAB bridge demo for the emulated TV device.
//!
//! Registers the emulator under the configured deviceId, installs a
//! logging publish callback in place of a transport, then drives a
//! scripted request sequence through the bridge and lets telemetry run
//! for a short window.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use dab_bridge_framework::{BridgeArgs, BridgeConfig, DabBridge, Value};
use dab_common::{init_tracing, parse};

use dab_bridge_emulator::{emulator_factory, EmulatorBridgeConfig};

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = BridgeArgs::parse();

    // Load configuration; a missing default file falls back to defaults
    let config_path = args.config_path("emulator.json5");
    let mut config = if config_path.exists() {
        EmulatorBridgeConfig::load(config_path)?
    } else {
        EmulatorBridgeConfig::default()
    };
    args.apply_to(&mut config.base.logging);

    init_tracing(config.logging())?;

    let device_id = config.emulator.device_id.clone();
    tracing::info!(
        device = %device_id,
        ip = %config.emulator.ip_address,
        broker = %format!("{}:{}", config.base.broker.host, config.base.broker.port),
        "starting emulator bridge"
    );

    // Build the bridge with the emulator as the only device class
    let mut bridge = DabBridge::new();
    bridge.register_factory(emulator_factory());
    bridge.make_device_instance(&device_id, Some(&config.emulator.ip_address))?;

    // A transport would forward published messages to the broker; the
    // demo logs them instead
    bridge.set_publish_callback(Arc::new(|message: &Value| {
        tracing::info!(message = %message.serialize(true), "publish");
    }));

    tracing::info!(topics = bridge.get_topics().len(), "bridge ready");

    // Scripted operator traffic
    for request in demo_requests(&device_id, config.emulator.telemetry_interval_ms) {
        let envelope = parse(&request)?;
        let reply = bridge.dispatch(&envelope);
        tracing::info!(
            request = %request,
            reply = %reply.serialize(true),
            "dispatch"
        );
    }

    // Let a few telemetry samples through before stopping
    let window = Duration::from_millis(config.emulator.telemetry_interval_ms as u64 * 4);
    thread::sleep(window);

    let stop = parse(&format!(
        r#"{{"topic":"dab/{device_id}/device-telemetry/stop"}}"#
    ))?;
    let reply = bridge.dispatch(&stop);
    tracing::info!(reply = %reply.serialize(true), "telemetry stopped");

    tracing::info!("demo complete");
    Ok(())
}

fn demo_requests(device_id: &str, telemetry_interval_ms: i64) -> Vec<String> {
    vec![
        format!(r#"{{"topic":"dab/{device_id}/operations/list"}}"#),
        format!(r#"{{"topic":"dab/{device_id}/version"}}"#),
        format!(r#"{{"topic":"dab/discovery"}}"#),
        format!(r#"{{"topic":"dab/{device_id}/device/info"}}"#),
        format!(r#"{{"topic":"dab/{device_id}/applications/list"}}"#),
        format!(
            r#"{{"topic":"dab/{device_id}/applications/launch","payload":{{"appId":"netflix"}}}}"#
        ),
        format!(
            r#"{{"topic":"dab/{device_id}/applications/launch-with-content","payload":{{"appId":"youtube","contentId":"dQw4w9WgXcQ"}}}}"#
        ),
        format!(
            r#"{{"topic":"dab/{device_id}/applications/get-state","payload":{{"appId":"netflix"}}}}"#
        ),
        format!(
            r#"{{"topic":"dab/{device_id}/applications/exit","payload":{{"appId":"youtube","background":true}}}}"#
        ),
        format!(r#"{{"topic":"dab/{device_id}/system/settings/list"}}"#),
        format!(
            r#"{{"topic":"dab/{device_id}/system/settings/set","payload":{{"volume":50}}}}"#
        ),
        format!(r#"{{"topic":"dab/{device_id}/input/key/list"}}"#),
        format!(
            r#"{{"topic":"dab/{device_id}/input/key-press","payload":{{"keyCode":"KEY_HOME"}}}}"#
        ),
        format!(r#"{{"topic":"dab/{device_id}/health-check/get"}}"#),
        // unimplemented on the emulator: answers 501
        format!(r#"{{"topic":"dab/{device_id}/system/restart"}}"#),
        format!(
            r#"{{"topic":"dab/{device_id}/device-telemetry/start","payload":{{"duration":{telemetry_interval_ms}}}}}"#
        ),
    ]
}
