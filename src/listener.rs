//! Capture listener - receives OS callbacks and feeds the pipeline
//!
//! State machine:
//! `Unsubscribed -> Subscribed -> Disconnected -> Subscribed (rebind) -> ...`
//! `Unsubscribed` is reached again only through a deliberate stop.

use anyhow::{Context, Result};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::notification::{
    ClearSummary, DedupCache, DeliveryQueue, EventIdentity, Normalizer, OutboundEvent,
    RawNotification, WorkerPool,
};
use crate::platform::{ComponentName, NotificationPlatform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListenerState {
    Unsubscribed = 0,
    Subscribed = 1,
    Disconnected = 2,
}

impl From<u8> for ListenerState {
    fn from(value: u8) -> Self {
        match value {
            1 => ListenerState::Subscribed,
            2 => ListenerState::Disconnected,
            _ => ListenerState::Unsubscribed,
        }
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListenerState::Unsubscribed => "unsubscribed",
            ListenerState::Subscribed => "subscribed",
            ListenerState::Disconnected => "disconnected",
        };
        write!(f, "{}", name)
    }
}

/// Listener bound to one component identity
pub struct CaptureListener {
    component: ComponentName,
    state: AtomicU8,
    cache: Arc<DedupCache>,
    normalizer: Normalizer,
    workers: WorkerPool,
    delivery: DeliveryQueue,
    platform: Arc<dyn NotificationPlatform>,
    indicator_id: i32,
}

impl CaptureListener {
    pub fn new(
        component: ComponentName,
        cache: Arc<DedupCache>,
        normalizer: Normalizer,
        workers: WorkerPool,
        delivery: DeliveryQueue,
        platform: Arc<dyn NotificationPlatform>,
        indicator_id: i32,
    ) -> Self {
        Self {
            component,
            state: AtomicU8::new(ListenerState::Unsubscribed as u8),
            cache,
            normalizer,
            workers,
            delivery,
            platform,
            indicator_id,
        }
    }

    /// Identity registered with the OS and used for rebinds
    pub fn component(&self) -> &ComponentName {
        &self.component
    }

    /// Current subscription state
    pub fn state(&self) -> ListenerState {
        ListenerState::from(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, next: ListenerState) {
        let prev = ListenerState::from(self.state.swap(next as u8, Ordering::SeqCst));
        if prev != next {
            debug!(from = %prev, to = %next, "Listener state change");
        }
    }

    /// A notification was posted
    ///
    /// Ignored unless subscribed. Duplicates are dropped here; fresh events
    /// are normalized on the worker pool and posted for delivery.
    pub fn on_posted(&self, raw: RawNotification) {
        if self.state() != ListenerState::Subscribed {
            trace!(id = raw.id, "Listener not subscribed, ignoring post");
            return;
        }

        let identity = EventIdentity::of(&raw);
        if !self.cache.should_deliver(identity) {
            debug!(identity = %identity, "Duplicate notification skipped");
            return;
        }

        let normalizer = self.normalizer.clone();
        let delivery = self.delivery.clone();
        self.workers.execute(move || {
            let record = normalizer.normalize(&raw);
            delivery.post(OutboundEvent::Notification(record));
        });
    }

    /// Removal callback; logged only, nothing is pushed
    pub fn on_removed(&self, raw: &RawNotification) {
        info!(package = %raw.package_name, id = raw.id, "Notification removed");
    }

    /// Subscription (re)established
    pub fn on_listener_connected(&self) {
        self.set_state(ListenerState::Subscribed);
        info!(component = %self.component, "Listener connected");
    }

    /// OS dropped the subscription
    ///
    /// Returns true when this call moved the listener to `Disconnected`, i.e.
    /// the caller should request a rebind.
    pub fn on_listener_disconnected(&self) -> bool {
        let moved = self
            .state
            .compare_exchange(
                ListenerState::Subscribed as u8,
                ListenerState::Disconnected as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if moved {
            warn!(component = %self.component, "Listener disconnected");
        }
        moved
    }

    /// Deliberate shutdown
    pub fn unsubscribe(&self) {
        self.set_state(ListenerState::Unsubscribed);
    }

    /// Cancel every visible notification except our own indicator
    ///
    /// Returns `None` when nothing was visible; no summary is emitted then.
    /// Individual cancel failures are logged and do not count as cleared.
    pub fn clear_all_notifications(&self) -> Result<Option<ClearSummary>> {
        let active = self
            .platform
            .active_notifications()
            .context("Failed to list active notifications")?;

        if active.is_empty() {
            info!("No active notifications to clear");
            return Ok(None);
        }

        let mut cleared_count = 0;
        for raw in &active {
            if raw.id == self.indicator_id {
                continue;
            }
            let key = raw.effective_key();
            match self.platform.cancel_notification(&key) {
                Ok(()) => cleared_count += 1,
                Err(e) => warn!(key = %key, error = %e, "Failed to cancel notification"),
            }
        }

        let summary = ClearSummary {
            cleared_count,
            total_count: active.len(),
        };
        info!(
            cleared = summary.cleared_count,
            total = summary.total_count,
            "Cleared system notifications"
        );
        self.delivery.post(OutboundEvent::Cleared(summary));
        Ok(Some(summary))
    }
}
