//! In-memory channel - collects payloads, can be told to fail

use anyhow::{anyhow, bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::notification::channel::EventChannel;

/// Channel that records every payload it receives
#[derive(Default)]
pub struct MemoryChannel {
    name: String,
    received: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MemoryChannel {
    /// Empty recorder that accepts every send
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make subsequent sends fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Raw payloads received so far
    pub fn payloads(&self) -> Vec<String> {
        self.received
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Received payloads parsed as JSON (unparseable ones skipped)
    pub fn events(&self) -> Vec<serde_json::Value> {
        self.payloads()
            .iter()
            .filter_map(|p| serde_json::from_str(p).ok())
            .collect()
    }

    /// Number of successful sends
    pub fn count(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl EventChannel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, payload: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("channel {} is failing", self.name);
        }
        self.received
            .lock()
            .map_err(|_| anyhow!("memory channel lock poisoned"))?
            .push(payload.to_string());
        Ok(())
    }
}
