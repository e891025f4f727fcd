//! DAB Bridge Framework
//!
//! Core runtime for exposing devices over the Device Automation Bus: a
//! host process hands incoming JSON envelopes to a [`DabBridge`], which
//! routes them by deviceId to a [`DeviceClient`], extracts the declared
//! operation parameters, and invokes the matching handler of the
//! [`Device`] implementation. Replies travel back the same path;
//! telemetry samples leave asynchronously through the installed publish
//! callback.
//!
//! # Overview
//!
//! This framework provides:
//! - [`Device`] trait with default stubs for the full DAB operation set
//! - [`DeviceClient`] owning one device's operation table and telemetry
//! - [`DabBridge`] for deviceId routing and discovery broadcast
//! - [`TelemetryScheduler`] driving periodic samplers per device
//! - [`BridgeConfig`] and [`BridgeArgs`] for binary bootstrap
//!
//! # Example
//!
//! ```
//! use dab_bridge_framework::{Capability, DabBridge, Device, DeviceFactory};
//! use dab_common::{parse, Result, Value};
//!
//! struct Tv;
//!
//! impl Device for Tv {
//!     fn capabilities(&self) -> &[Capability] {
//!         &[Capability::AppLaunch]
//!     }
//!
//!     fn app_launch(&mut self, app_id: String, _parameters: Value) -> Result<Value> {
//!         Ok(Value::pair("appId", app_id))
//!     }
//! }
//!
//! let mut bridge = DabBridge::new();
//! bridge.register_factory(DeviceFactory::new(|_ip| true, |_id, _ip| Box::new(Tv)));
//! bridge.make_device_instance("tv1", Some("10.0.0.5")).unwrap();
//!
//! let request = parse(r#"{"topic":"dab/tv1/applications/launch","payload":{"appId":"netflix"}}"#).unwrap();
//! let reply = bridge.dispatch(&request);
//! assert_eq!(reply.serialize(true), r#"{"appId":"netflix","status":200}"#);
//! ```

mod args;
mod bridge;
mod config;
mod device;
mod dispatch;
mod publish;
mod scheduler;

pub use args::BridgeArgs;
pub use bridge::{DabBridge, DeviceFactory};
pub use config::BridgeConfig;
pub use device::{Capability, Device, DeviceClient, PROTOCOL_VERSION};
pub use dispatch::{arg_bool, arg_i64, arg_string, extract_args};
pub use publish::{PublishFn, PublishSlot};
pub use scheduler::{Sampler, TelemetryScheduler};

// Re-export commonly used types from dab-common
pub use dab_common::{DabError, Result, Value};
