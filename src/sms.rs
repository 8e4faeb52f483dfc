//! SMS inbox access behind `getSmsMessages`

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// One inbox message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub id: String,
    pub address: String,
    pub body: String,
    /// Receive time, epoch ms
    pub date: i64,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "inbox".to_string()
}

impl SmsMessage {
    /// Received message (`type` = "inbox")
    pub fn inbox(id: impl Into<String>, address: impl Into<String>, body: impl Into<String>, date: i64) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            body: body.into(),
            date,
            kind: default_kind(),
        }
    }
}

/// Read access to the device message store
pub trait SmsInbox: Send + Sync {
    /// Up to `limit` messages, newest first
    fn recent_messages(&self, limit: usize) -> Result<Vec<SmsMessage>>;
}

/// Inbox held in memory
#[derive(Default)]
pub struct MemorySmsInbox {
    messages: Mutex<Vec<SmsMessage>>,
    failing: AtomicBool,
}

impl MemorySmsInbox {
    pub fn new(messages: Vec<SmsMessage>) -> Self {
        Self {
            messages: Mutex::new(messages),
            failing: AtomicBool::new(false),
        }
    }

    /// Store a message; order of insertion does not matter
    pub fn push(&self, message: SmsMessage) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
    }

    /// Simulate a denied read permission
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl SmsInbox for MemorySmsInbox {
    fn recent_messages(&self, limit: usize) -> Result<Vec<SmsMessage>> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("SMS inbox is not readable");
        }
        let mut messages = self
            .messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        messages.sort_by(|a, b| b.date.cmp(&a.date));
        messages.truncate(limit);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_with_limit() {
        let inbox = MemorySmsInbox::new(vec![
            SmsMessage::inbox("1", "+100", "old", 100),
            SmsMessage::inbox("2", "+100", "newest", 300),
            SmsMessage::inbox("3", "+200", "middle", 200),
        ]);

        let messages = inbox.recent_messages(2).unwrap();
        let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["newest", "middle"]);
    }

    #[test]
    fn test_type_field_on_the_wire() {
        let json = serde_json::to_value(SmsMessage::inbox("1", "+1", "hi", 5)).unwrap();
        assert_eq!(json["type"], "inbox");
        assert_eq!(json["date"], 5);
    }

    #[test]
    fn test_failing_inbox() {
        let inbox = MemorySmsInbox::default();
        inbox.set_failing(true);
        assert!(inbox.recent_messages(50).is_err());
    }
}
