//! Notification pipeline - dedup, normalization and delivery
//!
//! # Flow
//! 1. the listener computes an `EventIdentity` and asks `DedupCache`
//! 2. a `WorkerPool` job runs the `Normalizer`
//! 3. the record is posted onto the `DeliveryQueue`
//! 4. the delivery loop pushes it through the `DeliverySink` to whichever
//!    `EventChannel` is attached, if any
//!
//! The `Janitor` sweeps the cache in the background.

pub mod channel;
pub mod channels;
pub mod dedup_key;
pub mod deduplicator;
pub mod dispatcher;
pub mod janitor;
pub mod normalizer;
pub mod raw;
pub mod record;
pub mod sink;
pub mod worker;

pub use channel::EventChannel;
pub use channels::{LineWriter, MemoryChannel, StreamChannel};
pub use dedup_key::EventIdentity;
pub use deduplicator::{now_millis, DedupCache, SweepStats};
pub use dispatcher::{spawn_delivery_loop, DeliveryQueue};
pub use janitor::Janitor;
pub use normalizer::Normalizer;
pub use raw::{ExtraValue, RawNotification};
pub use record::{ClearSummary, NotificationRecord, OutboundEvent};
pub use sink::DeliverySink;
pub use worker::WorkerPool;
