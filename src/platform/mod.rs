//! Platform seam - everything the relay needs from the host OS
//!
//! The OS side is two things: a set of calls the relay makes
//! (`NotificationPlatform`) and a stream of callbacks it receives
//! (`PlatformEvent`). `MemoryPlatform` implements both in-process.

pub mod memory;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::IndicatorConfig;
use crate::notification::RawNotification;

pub use memory::MemoryPlatform;

/// Identity a listener registers and rebinds under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    /// Component from package and class name
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

/// Channel importance for the indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Default,
    High,
}

/// Persistent status indicator that keeps the host in the foreground
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForegroundIndicator {
    pub id: i32,
    pub channel_id: String,
    pub channel_name: String,
    pub title: String,
    pub text: String,
    pub importance: Importance,
    pub ongoing: bool,
    pub auto_cancel: bool,
    pub show_badge: bool,
    pub category: String,
}

impl ForegroundIndicator {
    /// Low-importance, ongoing, badge-less indicator built from config
    pub fn from_config(config: &IndicatorConfig) -> Self {
        Self {
            id: config.id,
            channel_id: config.channel_id.clone(),
            channel_name: config.channel_name.clone(),
            title: config.title.clone(),
            text: config.text.clone(),
            importance: Importance::Low,
            ongoing: true,
            auto_cancel: false,
            show_badge: false,
            category: "service".to_string(),
        }
    }
}

/// OS callbacks, in the order the OS delivers them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    Posted(RawNotification),
    Removed(RawNotification),
    ListenerConnected,
    ListenerDisconnected,
    /// The OS tore the host process down
    HostDestroyed,
}

/// Calls the relay makes into the OS
pub trait NotificationPlatform: Send + Sync {
    /// Subscribe the listener to the notification source
    fn register_listener(&self, component: &ComponentName) -> Result<()>;

    fn unregister_listener(&self, component: &ComponentName) -> Result<()>;

    /// Ask the OS to re-establish a dropped subscription
    ///
    /// Success means the request was accepted; the OS confirms with a
    /// `PlatformEvent::ListenerConnected` later.
    fn request_rebind(&self, component: &ComponentName) -> Result<()>;

    /// Currently visible notifications, including our own indicator
    fn active_notifications(&self) -> Result<Vec<RawNotification>>;

    fn cancel_notification(&self, key: &str) -> Result<()>;

    fn start_foreground(&self, indicator: &ForegroundIndicator) -> Result<()>;

    fn stop_foreground(&self, indicator_id: i32) -> Result<()>;

    /// Whether the user granted notification-listener access
    fn has_listener_access(&self) -> Result<bool>;
}
