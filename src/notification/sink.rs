//! Delivery sink - single replaceable slot for the current consumer
//!
//! There is no queue behind the slot. With nothing attached, a push is a
//! silent no-op; a failing channel is logged and the payload is dropped.

use std::sync::{Arc, RwLock};
use tracing::{debug, info, trace, warn};

use super::channel::EventChannel;

/// Single-slot consumer handle
#[derive(Default)]
pub struct DeliverySink {
    slot: RwLock<Option<Arc<dyn EventChannel>>>,
}

impl DeliverySink {
    /// Sink with nothing attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a consumer, replacing any previous one
    pub fn attach(&self, channel: Arc<dyn EventChannel>) {
        let name = channel.name().to_string();
        let previous = self
            .slot
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .replace(channel);
        match previous {
            Some(old) => info!(channel = %name, replaced = old.name(), "Consumer attached"),
            None => info!(channel = %name, "Consumer attached"),
        }
    }

    /// Detach the current consumer, if any
    pub fn detach(&self) {
        let previous = self.slot.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(old) = previous {
            info!(channel = old.name(), "Consumer detached");
        }
    }

    /// Whether a consumer currently occupies the slot
    pub fn is_attached(&self) -> bool {
        self.slot
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Best-effort push to the attached consumer
    pub fn push(&self, payload: &str) {
        // Lock is not held across send
        let channel = self
            .slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let Some(channel) = channel else {
            trace!("No consumer attached, dropping event");
            return;
        };

        match channel.send(payload) {
            Ok(()) => debug!(channel = channel.name(), "Event delivered"),
            Err(e) => warn!(channel = channel.name(), error = %e, "Event delivery failed"),
        }
    }
}
