//! In-process platform - drives the relay from replayed or injected events

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{ComponentName, ForegroundIndicator, NotificationPlatform, PlatformEvent};
use crate::notification::RawNotification;

#[derive(Default)]
struct State {
    active: Vec<RawNotification>,
    registered: Option<ComponentName>,
    foreground: Option<ForegroundIndicator>,
    cancelled: Vec<String>,
    rebind_requests: Vec<ComponentName>,
    failing_cancels: HashSet<String>,
}

/// Platform backed by an in-memory notification list
///
/// Events injected here are mirrored into the active list (so clear-all sees
/// them) and forwarded to the event receiver handed out by `new`.
pub struct MemoryPlatform {
    package: String,
    state: Mutex<State>,
    events: mpsc::UnboundedSender<PlatformEvent>,
    access: AtomicBool,
    fail_register: AtomicBool,
    fail_foreground: AtomicBool,
    fail_rebind: AtomicBool,
    fail_active: AtomicBool,
    fail_access: AtomicBool,
}

impl MemoryPlatform {
    /// Create the platform and the receiving end of its event stream
    pub fn new(package: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<PlatformEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let platform = Arc::new(Self {
            package: package.into(),
            state: Mutex::new(State::default()),
            events: tx,
            access: AtomicBool::new(true),
            fail_register: AtomicBool::new(false),
            fail_foreground: AtomicBool::new(false),
            fail_rebind: AtomicBool::new(false),
            fail_active: AtomicBool::new(false),
            fail_access: AtomicBool::new(false),
        });
        (platform, rx)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: PlatformEvent) {
        if self.events.send(event).is_err() {
            trace!("Platform event receiver dropped");
        }
    }

    /// Feed one OS callback
    pub fn inject(&self, event: PlatformEvent) {
        match &event {
            PlatformEvent::Posted(raw) => {
                let key = raw.effective_key();
                let mut state = self.state();
                state.active.retain(|n| n.effective_key() != key);
                state.active.push(raw.clone());
            }
            PlatformEvent::Removed(raw) => {
                let key = raw.effective_key();
                self.state().active.retain(|n| n.effective_key() != key);
            }
            _ => {}
        }
        self.emit(event);
    }

    /// Make `raw` visible and emit a posted callback
    pub fn post(&self, raw: RawNotification) {
        self.inject(PlatformEvent::Posted(raw));
    }

    /// Drop `raw` from the visible list and emit a removed callback
    pub fn remove(&self, raw: RawNotification) {
        self.inject(PlatformEvent::Removed(raw));
    }

    /// Simulate the OS dropping the listener subscription
    pub fn disconnect(&self) {
        self.inject(PlatformEvent::ListenerDisconnected);
    }

    /// Simulate the OS tearing the host process down
    pub fn destroy_host(&self) {
        self.inject(PlatformEvent::HostDestroyed);
    }

    pub fn set_access(&self, granted: bool) {
        self.access.store(granted, Ordering::SeqCst);
    }

    /// Make `register_listener` fail while set
    pub fn fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn fail_foreground(&self, fail: bool) {
        self.fail_foreground.store(fail, Ordering::SeqCst);
    }

    /// Make `request_rebind` fail
    ///
    /// When clear, each accepted rebind is confirmed with a connected callback.
    pub fn fail_rebind(&self, fail: bool) {
        self.fail_rebind.store(fail, Ordering::SeqCst);
    }

    /// Make listing active notifications fail
    pub fn fail_active(&self, fail: bool) {
        self.fail_active.store(fail, Ordering::SeqCst);
    }

    /// Make the access check itself fail
    pub fn fail_access(&self, fail: bool) {
        self.fail_access.store(fail, Ordering::SeqCst);
    }

    /// Make cancelling `key` fail
    pub fn fail_cancel(&self, key: impl Into<String>) {
        self.state().failing_cancels.insert(key.into());
    }

    /// Keys passed to `cancel_notification`, in call order
    pub fn cancelled(&self) -> Vec<String> {
        self.state().cancelled.clone()
    }

    pub fn rebind_requests(&self) -> Vec<ComponentName> {
        self.state().rebind_requests.clone()
    }

    /// Currently registered listener, if any
    pub fn registered(&self) -> Option<ComponentName> {
        self.state().registered.clone()
    }

    /// Indicator currently shown
    pub fn foreground(&self) -> Option<ForegroundIndicator> {
        self.state().foreground.clone()
    }

    pub fn active_count(&self) -> usize {
        self.state().active.len()
    }
}

impl NotificationPlatform for MemoryPlatform {
    fn register_listener(&self, component: &ComponentName) -> Result<()> {
        if self.fail_register.load(Ordering::SeqCst) {
            bail!("listener registration refused for {}", component);
        }
        self.state().registered = Some(component.clone());
        debug!(component = %component, "Listener registered");
        Ok(())
    }

    fn unregister_listener(&self, component: &ComponentName) -> Result<()> {
        let mut state = self.state();
        if state.registered.as_ref() == Some(component) {
            state.registered = None;
        }
        Ok(())
    }

    fn request_rebind(&self, component: &ComponentName) -> Result<()> {
        if self.fail_rebind.load(Ordering::SeqCst) {
            bail!("rebind refused for {}", component);
        }
        self.state().rebind_requests.push(component.clone());
        self.emit(PlatformEvent::ListenerConnected);
        Ok(())
    }

    fn active_notifications(&self) -> Result<Vec<RawNotification>> {
        if self.fail_active.load(Ordering::SeqCst) {
            bail!("notification service unavailable");
        }
        Ok(self.state().active.clone())
    }

    fn cancel_notification(&self, key: &str) -> Result<()> {
        let mut state = self.state();
        if state.failing_cancels.contains(key) {
            bail!("cannot cancel {}", key);
        }
        state.active.retain(|n| n.effective_key() != key);
        state.cancelled.push(key.to_string());
        Ok(())
    }

    fn start_foreground(&self, indicator: &ForegroundIndicator) -> Result<()> {
        if self.fail_foreground.load(Ordering::SeqCst) {
            bail!("foreground start not allowed");
        }
        let own = RawNotification::new(indicator.id, self.package.clone(), 0);
        let key = own.effective_key();
        let mut state = self.state();
        state.active.retain(|n| n.effective_key() != key);
        state.active.push(own);
        state.foreground = Some(indicator.clone());
        Ok(())
    }

    fn stop_foreground(&self, indicator_id: i32) -> Result<()> {
        let package = self.package.clone();
        let mut state = self.state();
        state
            .active
            .retain(|n| !(n.id == indicator_id && n.package_name == package));
        state.foreground = None;
        Ok(())
    }

    fn has_listener_access(&self) -> Result<bool> {
        if self.fail_access.load(Ordering::SeqCst) {
            bail!("enabled listener settings unreadable");
        }
        Ok(self.access.load(Ordering::SeqCst))
    }
}
