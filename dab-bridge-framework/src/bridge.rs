//! Multi-device routing.
//!
//! A [`DabBridge`] owns a set of [`DeviceClient`] instances keyed by
//! deviceId and forwards each envelope to the instance its topic names.
//! The cross-device `dab/discovery` operation is broadcast: the first
//! device's reply is returned to the caller, every other reply leaves
//! through the publish callback.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use dab_common::{topic, DabError, Result, Value};

use crate::device::{Device, DeviceClient};
use crate::publish::{PublishFn, PublishSlot};

/// Constructs device implementations for deviceIds as they register.
///
/// Factories are tried in registration order; the first one whose
/// `is_compatible` accepts the target address wins. Registration without
/// an address ("on-device" mode) always picks the first factory.
pub struct DeviceFactory {
    is_compatible: fn(&str) -> bool,
    construct: Box<dyn Fn(&str, &str) -> Box<dyn Device> + Send + Sync>,
}

impl DeviceFactory {
    /// `construct` receives the deviceId and the target ip address.
    pub fn new(
        is_compatible: fn(&str) -> bool,
        construct: impl Fn(&str, &str) -> Box<dyn Device> + Send + Sync + 'static,
    ) -> Self {
        Self {
            is_compatible,
            construct: Box::new(construct),
        }
    }
}

/// The deviceId-switching dispatch entry point.
#[derive(Default)]
pub struct DabBridge {
    factories: Vec<DeviceFactory>,
    instances: BTreeMap<String, DeviceClient>,
    publish: PublishSlot,
}

impl DabBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device factory. Order matters: earlier factories win
    /// compatibility ties.
    pub fn register_factory(&mut self, factory: DeviceFactory) -> &mut Self {
        self.factories.push(factory);
        self
    }

    /// Instantiate a device for `device_id`. With an address, the first
    /// compatible factory is used; without one, the first registered
    /// factory. Registering an existing deviceId replaces the previous
    /// instance.
    pub fn make_device_instance(
        &mut self,
        device_id: &str,
        ip_address: Option<&str>,
    ) -> Result<&DeviceClient> {
        let factory = match ip_address {
            Some(ip) => self
                .factories
                .iter()
                .find(|factory| (factory.is_compatible)(ip)),
            None => self.factories.first(),
        }
        .ok_or_else(|| DabError::bad_request("no compatible devices found"))?;

        let ip = ip_address.unwrap_or_default();
        let device = (factory.construct)(device_id, ip);
        let client = DeviceClient::new(device_id, ip, device)?;
        if let Some(callback) = self.publish.get() {
            client.set_publish_callback(callback);
        }

        tracing::info!(device = %device_id, ip = %ip, "registered device instance");

        match self.instances.entry(device_id.to_owned()) {
            Entry::Occupied(mut occupied) => {
                tracing::warn!(device = %device_id, "replacing existing device instance");
                occupied.insert(client);
                Ok(occupied.into_mut())
            }
            Entry::Vacant(vacant) => Ok(vacant.insert(client)),
        }
    }

    /// Look up a registered device instance.
    pub fn device(&self, device_id: &str) -> Option<&DeviceClient> {
        self.instances.get(device_id)
    }

    /// Route an envelope by its topic and shape the reply; errors come
    /// back as `{"status":…,"error":…}` objects instead of propagating.
    pub fn dispatch(&self, envelope: &Value) -> Value {
        match self.try_dispatch(envelope) {
            Ok(reply) => reply,
            Err(e) => e.to_reply(),
        }
    }

    fn try_dispatch(&self, envelope: &Value) -> Result<Value> {
        if !envelope.has("topic") {
            return Err(DabError::bad_request("no topic found"));
        }
        let request_topic = envelope
            .get("topic")?
            .as_str()
            .map_err(|_| DabError::bad_request("topic is malformed"))?;

        if request_topic == topic::DISCOVERY_TOPIC {
            return self.broadcast_discovery(envelope);
        }

        let parsed = topic::parse_topic(request_topic)
            .ok_or_else(|| DabError::bad_request("topic is malformed"))?;
        let device = self
            .instances
            .get(parsed.device_id)
            .ok_or_else(|| DabError::bad_request("deviceId does not exist"))?;
        Ok(device.dispatch(envelope))
    }

    /// Every device answers discovery, but the caller gets exactly one
    /// reply. The first device (in deviceId order) answers synchronously;
    /// the rest surface asynchronously through the publish callback.
    fn broadcast_discovery(&self, envelope: &Value) -> Result<Value> {
        let mut devices = self.instances.values();
        let first = devices
            .next()
            .ok_or_else(|| DabError::bad_request("no devices registered"))?;
        for device in devices {
            let reply = device.dispatch(envelope);
            if !self.publish.publish(&reply) {
                tracing::warn!(
                    device = %device.device_id(),
                    "discovery broadcast dropped, no publish callback installed"
                );
            }
        }
        Ok(first.dispatch(envelope))
    }

    /// Every topic any device should be subscribed to, plus the shared
    /// discovery topic.
    pub fn get_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .instances
            .values()
            .flat_map(DeviceClient::topics)
            .collect();
        topics.push(topic::DISCOVERY_TOPIC.to_owned());
        topics
    }

    /// Install the sink for asynchronous messages on the bridge and every
    /// registered device.
    pub fn set_publish_callback(&self, callback: PublishFn) {
        for device in self.instances.values() {
            device.set_publish_callback(callback.clone());
        }
        self.publish.set(callback);
    }
}
