//! Delivery loop - the single context that pushes to the sink
//!
//! Producers (normalization workers, clear-all) post onto an unbounded mpsc
//! queue and return immediately. One task drains the queue and performs every
//! sink push, so the consumer sees a single linear stream. Order across
//! producers is whatever order their posts land in.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::record::OutboundEvent;
use super::sink::DeliverySink;

enum Delivery {
    Event(OutboundEvent),
    Flush(oneshot::Sender<()>),
}

/// Producer handle onto the delivery loop
#[derive(Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl DeliveryQueue {
    /// Fire-and-forget post; never blocks
    pub fn post(&self, event: OutboundEvent) {
        if self.tx.send(Delivery::Event(event)).is_err() {
            debug!("Delivery loop closed, dropping event");
        }
    }

    /// Wait until everything posted before this call has been pushed
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Delivery::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

/// Spawn the delivery loop for `sink`
///
/// The loop ends once every `DeliveryQueue` clone has been dropped.
pub fn spawn_delivery_loop(sink: Arc<DeliverySink>) -> (DeliveryQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            match item {
                Delivery::Event(event) => match event.to_payload() {
                    Ok(payload) => sink.push(&payload),
                    Err(e) => warn!(error = %e, "Failed to serialize outbound event"),
                },
                Delivery::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Delivery loop finished");
    });

    (DeliveryQueue { tx }, handle)
}
