//! Lifecycle supervisor - keeps the capture listener alive
//!
//! Owns the active-listener slot, the foreground indicator and the restart
//! loop. The OS may tear the host down at any time; unless the stop was
//! deliberate the supervisor schedules a fresh start according to the
//! configured `RestartPolicy`. Once a start has stayed up for the stable
//! interval, the next teardown counts as a first attempt again.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{RelayConfig, RestartPolicy};
use crate::listener::{CaptureListener, ListenerState};
use crate::platform::{ForegroundIndicator, NotificationPlatform};

/// Point-in-time view of the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorStatus {
    pub running: bool,
    pub listener: ListenerState,
    pub restart_attempts: u32,
}

/// Owns start/stop and recovery of the capture listener
pub struct LifecycleSupervisor {
    platform: Arc<dyn NotificationPlatform>,
    listener: Arc<CaptureListener>,
    /// Set while started; how out-of-band commands reach the listener
    active: RwLock<Option<Arc<CaptureListener>>>,
    indicator: ForegroundIndicator,
    running: AtomicBool,
    /// Set by a deliberate stop; suppresses restarts
    shutdown: AtomicBool,
    restart: RestartPolicy,
    restart_attempts: AtomicU32,
    restart_stable: Duration,
    /// When the current run started
    started_at: Mutex<Option<Instant>>,
    pub(crate) boot_settle: Duration,
    pub(crate) own_package: String,
}

impl LifecycleSupervisor {
    pub fn new(
        config: &RelayConfig,
        platform: Arc<dyn NotificationPlatform>,
        listener: Arc<CaptureListener>,
    ) -> Arc<Self> {
        Arc::new(Self {
            platform,
            listener,
            active: RwLock::new(None),
            indicator: ForegroundIndicator::from_config(&config.indicator),
            running: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            restart: config.restart,
            restart_attempts: AtomicU32::new(0),
            restart_stable: config.restart_stable(),
            started_at: Mutex::new(None),
            boot_settle: config.boot_settle(),
            own_package: config.package_name.clone(),
        })
    }

    /// Start capturing; a no-op when already running
    pub fn start(&self) -> Result<()> {
        self.shutdown.store(false, Ordering::SeqCst);
        self.restart_attempts.store(0, Ordering::SeqCst);
        self.start_inner()
    }

    fn start_inner(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Relay already running");
            return Ok(());
        }

        let component = self.listener.component().clone();
        if let Err(e) = self.platform.register_listener(&component) {
            self.running.store(false, Ordering::SeqCst);
            return Err(e).with_context(|| format!("Failed to register listener {}", component));
        }

        self.set_active(Some(Arc::clone(&self.listener)));

        // Indicator failure is not fatal
        if let Err(e) = self.platform.start_foreground(&self.indicator) {
            warn!(error = %e, "Failed to show foreground indicator");
        }

        *self.started_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        self.listener.on_listener_connected();
        info!(component = %component, "Relay started");
        Ok(())
    }

    /// Deliberate stop; a no-op when not running
    pub fn stop(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.restart_attempts.store(0, Ordering::SeqCst);

        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("Relay not running");
            return Ok(());
        }

        self.listener.unsubscribe();
        self.set_active(None);

        if let Err(e) = self.platform.stop_foreground(self.indicator.id) {
            warn!(error = %e, "Failed to remove foreground indicator");
        }

        let component = self.listener.component();
        self.platform
            .unregister_listener(component)
            .with_context(|| format!("Failed to unregister listener {}", component))?;

        info!("Relay stopped");
        Ok(())
    }

    /// The OS destroyed the host
    ///
    /// Returns the handle of the scheduled restart, if one was scheduled.
    pub fn on_host_destroyed(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        self.listener.unsubscribe();
        self.set_active(None);

        if !was_running || self.shutdown.load(Ordering::SeqCst) {
            debug!("Host destroyed after deliberate stop, not restarting");
            return None;
        }

        if self.ran_stable() {
            debug!("Previous run was stable, resetting restart attempts");
            self.restart_attempts.store(0, Ordering::SeqCst);
        }
        let attempt = self.restart_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.restart.delay_for(attempt);
        warn!(attempt, delay_ms = delay.as_millis() as u64, "Host destroyed, scheduling restart");

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if this.shutdown.load(Ordering::SeqCst) {
                debug!("Stopped while waiting to restart");
                return;
            }
            if let Err(e) = this.start_inner() {
                error!(attempt, error = %e, "Restart failed");
            }
        }))
    }

    /// The OS dropped the listener subscription; ask for a rebind
    pub fn on_listener_disconnected(&self) {
        if !self.listener.on_listener_disconnected() {
            return;
        }
        let component = self.listener.component();
        match self.platform.request_rebind(component) {
            Ok(()) => info!(component = %component, "Rebind requested"),
            Err(e) => error!(component = %component, error = %e, "Rebind request failed"),
        }
    }

    /// Subscription confirmed by the OS, e.g. after a rebind
    ///
    /// Ignored while stopped so a late confirmation cannot resurrect the
    /// listener.
    pub fn on_listener_connected(&self) {
        if !self.is_running() {
            debug!("Listener connected while stopped, ignoring");
            return;
        }
        self.listener.on_listener_connected();
    }

    /// Clear system notifications through the active listener
    ///
    /// `Ok(false)` when the relay is not running.
    pub fn clear_all(&self) -> Result<bool> {
        let Some(listener) = self.active_listener() else {
            warn!("No active listener, cannot clear notifications");
            return Ok(false);
        };
        listener.clear_all_notifications()?;
        Ok(true)
    }

    /// Whether the relay is started and not torn down
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Restarts since the last deliberate start or stable run
    pub fn restart_attempts(&self) -> u32 {
        self.restart_attempts.load(Ordering::SeqCst)
    }

    /// The listener reachable by out-of-band commands, `None` while stopped
    pub fn active_listener(&self) -> Option<Arc<CaptureListener>> {
        self.active.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Snapshot of the running flag and listener state
    pub fn status(&self) -> SupervisorStatus {
        SupervisorStatus {
            running: self.is_running(),
            listener: self.listener.state(),
            restart_attempts: self.restart_attempts(),
        }
    }

    fn ran_stable(&self) -> bool {
        let started_at = *self.started_at.lock().unwrap_or_else(|e| e.into_inner());
        started_at.is_some_and(|at| at.elapsed() >= self.restart_stable)
    }

    fn set_active(&self, listener: Option<Arc<CaptureListener>>) {
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = listener;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{
        spawn_delivery_loop, DedupCache, DeliverySink, Normalizer, WorkerPool,
    };
    use crate::platform::{ComponentName, MemoryPlatform};

    fn supervisor(config: &RelayConfig) -> (Arc<LifecycleSupervisor>, Arc<MemoryPlatform>) {
        let (platform, _rx) = MemoryPlatform::new(config.package_name.clone());
        let (delivery, _handle) = spawn_delivery_loop(Arc::new(DeliverySink::new()));
        let listener = Arc::new(CaptureListener::new(
            ComponentName::new(config.package_name.clone(), config.listener_class.clone()),
            Arc::new(DedupCache::from_config(config)),
            Normalizer::from_config(config),
            WorkerPool::new(config.workers),
            delivery,
            platform.clone(),
            config.indicator.id,
        ));
        (LifecycleSupervisor::new(config, platform.clone(), listener), platform)
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (sup, platform) = supervisor(&RelayConfig::default());
        sup.start().unwrap();
        sup.start().unwrap();

        assert!(sup.is_running());
        assert!(sup.active_listener().is_some());
        assert!(platform.foreground().is_some());
        assert_eq!(platform.active_count(), 1);
        assert_eq!(sup.status().listener, ListenerState::Subscribed);
    }

    #[tokio::test]
    async fn test_indicator_failure_is_not_fatal() {
        let (sup, platform) = supervisor(&RelayConfig::default());
        platform.fail_foreground(true);
        sup.start().unwrap();
        assert!(sup.is_running());
        assert!(platform.foreground().is_none());
    }

    #[tokio::test]
    async fn test_register_failure_leaves_stopped() {
        let (sup, platform) = supervisor(&RelayConfig::default());
        platform.fail_register(true);
        assert!(sup.start().is_err());
        assert!(!sup.is_running());
        assert!(sup.active_listener().is_none());
    }

    #[tokio::test]
    async fn test_stop_clears_slot_and_indicator() {
        let (sup, platform) = supervisor(&RelayConfig::default());
        sup.start().unwrap();
        sup.stop().unwrap();
        sup.stop().unwrap();

        assert!(!sup.is_running());
        assert!(sup.active_listener().is_none());
        assert!(platform.registered().is_none());
        assert!(platform.foreground().is_none());
        assert_eq!(sup.status().listener, ListenerState::Unsubscribed);
    }

    #[tokio::test]
    async fn test_clear_all_without_listener() {
        let (sup, _platform) = supervisor(&RelayConfig::default());
        assert!(!sup.clear_all().unwrap());
    }

    #[tokio::test]
    async fn test_destroy_restarts_immediately() {
        let (sup, _platform) = supervisor(&RelayConfig::default());
        sup.start().unwrap();

        let handle = sup.on_host_destroyed().unwrap();
        handle.await.unwrap();

        assert!(sup.is_running());
        assert_eq!(sup.restart_attempts(), 1);
    }

    #[tokio::test]
    async fn test_destroy_after_stop_does_not_restart() {
        let (sup, _platform) = supervisor(&RelayConfig::default());
        sup.start().unwrap();
        sup.stop().unwrap();
        assert!(sup.on_host_destroyed().is_none());
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn test_backoff_delays_restart() {
        let config = RelayConfig {
            restart: RestartPolicy::Backoff { initial_ms: 200, max_ms: 1000 },
            ..RelayConfig::default()
        };
        let (sup, _platform) = supervisor(&config);
        sup.start().unwrap();

        let handle = sup.on_host_destroyed().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!sup.is_running());

        handle.await.unwrap();
        assert!(sup.is_running());
    }

    #[tokio::test]
    async fn test_stable_run_resets_restart_attempts() {
        let config = RelayConfig {
            restart: RestartPolicy::Backoff { initial_ms: 20, max_ms: 1000 },
            restart_stable_ms: 150,
            ..RelayConfig::default()
        };
        let (sup, _platform) = supervisor(&config);
        sup.start().unwrap();

        // Quick crash loop keeps counting up
        sup.on_host_destroyed().unwrap().await.unwrap();
        sup.on_host_destroyed().unwrap().await.unwrap();
        assert_eq!(sup.restart_attempts(), 2);

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Backoff starts from the initial delay again
        let handle = sup.on_host_destroyed().unwrap();
        assert_eq!(sup.restart_attempts(), 1);
        handle.await.unwrap();
        assert!(sup.is_running());
    }

    #[tokio::test]
    async fn test_disconnect_requests_rebind_once() {
        let (sup, platform) = supervisor(&RelayConfig::default());
        sup.start().unwrap();

        sup.on_listener_disconnected();
        sup.on_listener_disconnected();
        assert_eq!(platform.rebind_requests().len(), 1);
        assert_eq!(sup.status().listener, ListenerState::Disconnected);

        sup.on_listener_connected();
        assert_eq!(sup.status().listener, ListenerState::Subscribed);
    }
}
