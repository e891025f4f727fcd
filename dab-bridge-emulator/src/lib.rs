//! DAB bridge for an emulated TV device.
//!
//! [`TvEmulator`] implements the application, settings, input, health,
//! and telemetry operations over in-memory state; [`emulator_factory`]
//! plugs it into a bridge for any loopback target address.

pub mod config;
pub mod device;

pub use config::{EmulatorBridgeConfig, EmulatorConfig};
pub use device::TvEmulator;

use dab_bridge_framework::DeviceFactory;

/// Factory registering the emulator for loopback targets.
pub fn emulator_factory() -> DeviceFactory {
    DeviceFactory::new(TvEmulator::is_compatible, |device_id, _ip| {
        Box::new(TvEmulator::new(device_id))
    })
}
