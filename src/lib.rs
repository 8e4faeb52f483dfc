//! Notification Relay - capture OS notifications, dedup, normalize and relay them

pub mod config;
pub mod listener;
pub mod notification;
pub mod platform;
pub mod relay;
pub mod server;
pub mod service;
pub mod sms;

pub use config::{IndicatorConfig, RelayConfig, RestartPolicy};
pub use listener::{CaptureListener, ListenerState};
pub use notification::{
    ClearSummary, DedupCache, DeliverySink, EventChannel, EventIdentity, ExtraValue, Janitor,
    LineWriter, MemoryChannel, NotificationRecord, Normalizer, OutboundEvent, RawNotification,
    StreamChannel, WorkerPool,
};
pub use platform::{ComponentName, ForegroundIndicator, MemoryPlatform, NotificationPlatform, PlatformEvent};
pub use relay::RelayService;
pub use server::{CommandError, CommandHandler, CommandRequest, CommandResponse, RelayServer};
pub use service::{BootTrigger, LifecycleSupervisor, SupervisorStatus};
pub use sms::{MemorySmsInbox, SmsInbox, SmsMessage};
