//! Line-oriented stream channel - one JSON object per line
//!
//! The consumer process reads our stdout. Command responses and events share
//! the same stream, so both go through one `LineWriter`.

use anyhow::{anyhow, Result};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::notification::channel::EventChannel;

/// Serialized line writer shared by responses and events
pub struct LineWriter {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl LineWriter {
    /// Wrap any writer; each line is flushed as it is written
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    /// Line writer over process stdout
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Write one line and flush
    pub fn write_line(&self, line: &str) -> Result<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| anyhow!("line writer lock poisoned"))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// Event channel wrapping each payload as `{"event": <payload>}`
pub struct StreamChannel {
    writer: Arc<LineWriter>,
}

impl StreamChannel {
    /// Channel sharing `writer` with command responses
    pub fn new(writer: Arc<LineWriter>) -> Self {
        Self { writer }
    }
}

impl EventChannel for StreamChannel {
    fn name(&self) -> &str {
        "stream"
    }

    fn send(&self, payload: &str) -> Result<()> {
        self.writer.write_line(&format!("{{\"event\":{}}}", payload))?;
        debug!(channel = "stream", bytes = payload.len(), "Event written");
        Ok(())
    }
}
