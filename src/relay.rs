//! Relay service - owns and wires every pipeline component
//!
//! One `RelayService` replaces the process-wide singletons a platform host
//! would otherwise keep: the dedup cache, the delivery sink and the
//! active-listener slot (inside the supervisor) all hang off it.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::listener::CaptureListener;
use crate::notification::{
    spawn_delivery_loop, DedupCache, DeliveryQueue, DeliverySink, Janitor, Normalizer, WorkerPool,
};
use crate::platform::{ComponentName, NotificationPlatform, PlatformEvent};
use crate::service::LifecycleSupervisor;

struct RelayInner {
    config: RelayConfig,
    cache: Arc<DedupCache>,
    sink: Arc<DeliverySink>,
    delivery: DeliveryQueue,
    workers: WorkerPool,
    listener: Arc<CaptureListener>,
    supervisor: Arc<LifecycleSupervisor>,
    janitor: Mutex<Option<Janitor>>,
}

/// Handle to a running relay; cheap to clone
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    /// Build the pipeline and schedule the janitor
    ///
    /// Must be called inside a tokio runtime. The relay is built stopped;
    /// call `supervisor().start()` to begin capturing.
    pub fn spawn(config: RelayConfig, platform: Arc<dyn NotificationPlatform>) -> Self {
        let cache = Arc::new(DedupCache::from_config(&config));
        let sink = Arc::new(DeliverySink::new());
        let (delivery, _loop_handle) = spawn_delivery_loop(Arc::clone(&sink));
        let workers = WorkerPool::new(config.workers);

        let listener = Arc::new(CaptureListener::new(
            ComponentName::new(config.package_name.clone(), config.listener_class.clone()),
            Arc::clone(&cache),
            Normalizer::from_config(&config),
            workers.clone(),
            delivery.clone(),
            Arc::clone(&platform),
            config.indicator.id,
        ));
        let supervisor = LifecycleSupervisor::new(&config, platform, Arc::clone(&listener));
        let janitor = Janitor::spawn(Arc::clone(&cache), config.sweep_interval());

        info!(
            workers = workers.size(),
            max_cache_entries = cache.max_entries(),
            "Relay service initialized"
        );

        Self {
            inner: Arc::new(RelayInner {
                config,
                cache,
                sink,
                delivery,
                workers,
                listener,
                supervisor,
                janitor: Mutex::new(Some(janitor)),
            }),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// Dedup cache shared with the listener and the janitor
    pub fn cache(&self) -> &Arc<DedupCache> {
        &self.inner.cache
    }

    /// Consumer slot; attach a channel here to receive events
    pub fn sink(&self) -> &Arc<DeliverySink> {
        &self.inner.sink
    }

    pub fn listener(&self) -> &Arc<CaptureListener> {
        &self.inner.listener
    }

    /// Start, stop and recovery of the listener
    pub fn supervisor(&self) -> &Arc<LifecycleSupervisor> {
        &self.inner.supervisor
    }

    /// Route one OS callback to the listener or the supervisor
    pub fn handle_event(&self, event: PlatformEvent) {
        match event {
            PlatformEvent::Posted(raw) => self.inner.listener.on_posted(raw),
            PlatformEvent::Removed(raw) => self.inner.listener.on_removed(&raw),
            PlatformEvent::ListenerConnected => self.inner.supervisor.on_listener_connected(),
            PlatformEvent::ListenerDisconnected => self.inner.supervisor.on_listener_disconnected(),
            PlatformEvent::HostDestroyed => {
                self.inner.supervisor.on_host_destroyed();
            }
        }
    }

    /// Drain platform callbacks until the sender side closes
    pub fn spawn_event_pump(&self, mut events: mpsc::UnboundedReceiver<PlatformEvent>) -> JoinHandle<()> {
        let relay = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                relay.handle_event(event);
            }
            debug!("Platform event stream closed");
        })
    }

    /// Wait until every accepted notification has been pushed to the sink
    pub async fn settle(&self) {
        self.inner.workers.wait_idle().await;
        self.inner.delivery.flush().await;
    }

    /// Stop capturing and cancel the janitor
    pub fn shutdown(&self) -> anyhow::Result<()> {
        if let Some(janitor) = self
            .inner
            .janitor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            janitor.stop();
        }
        self.inner.supervisor.stop()
    }
}
