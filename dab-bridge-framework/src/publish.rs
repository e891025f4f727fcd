//! Publish-callback plumbing.
//!
//! The bridge does not own a transport. Asynchronous messages (telemetry
//! samples, discovery broadcast replies) leave through a callback the
//! embedding process installs, typically wrapping an MQTT client publish.
//! The callback must be thread-safe: the telemetry worker invokes it off
//! the dispatch thread.

use std::sync::{Arc, PoisonError, RwLock};

use dab_common::Value;

/// Sink for asynchronous messages.
pub type PublishFn = Arc<dyn Fn(&Value) + Send + Sync>;

/// A shared, late-bound publish slot. Devices and their telemetry
/// workers hold clones; installing a callback through any clone makes it
/// visible to all of them.
#[derive(Clone, Default)]
pub struct PublishSlot {
    callback: Arc<RwLock<Option<PublishFn>>>,
}

impl PublishSlot {
    /// Install (or replace) the callback.
    pub fn set(&self, callback: PublishFn) {
        let mut slot = self
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(callback);
    }

    /// Current callback, if one is installed.
    pub fn get(&self) -> Option<PublishFn> {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deliver a message. Returns `false` when no callback is installed.
    pub fn publish(&self, message: &Value) -> bool {
        match self.get() {
            Some(callback) => {
                callback(message);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for PublishSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishSlot")
            .field("installed", &self.get().is_some())
            .finish()
    }
}
