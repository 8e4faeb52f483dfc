//! Normalized records and the outbound event envelope

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::dedup_key::EventIdentity;

/// Flat, serializable notification record delivered to the consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: i32,
    pub package_name: String,
    /// Epoch ms
    pub post_time: i64,
    pub title: String,
    pub text: String,
    pub big_text: String,
    pub info_text: String,
    pub sub_text: String,
    pub summary_text: String,
    /// Extension values rendered as strings, oversized values dropped
    pub additional_info: BTreeMap<String, String>,
    /// Set when extraction failed as a whole
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationRecord {
    /// Record with only the identity fields populated
    pub fn minimal(id: i32, package_name: impl Into<String>, post_time: i64) -> Self {
        Self {
            id,
            package_name: package_name.into(),
            post_time,
            title: String::new(),
            text: String::new(),
            big_text: String::new(),
            info_text: String::new(),
            sub_text: String::new(),
            summary_text: String::new(),
            additional_info: BTreeMap::new(),
            error: None,
        }
    }

    /// Dedup identity of the source notification
    pub fn identity(&self) -> EventIdentity {
        EventIdentity::new(self.id, self.post_time)
    }
}

/// Result of a clear-all sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearSummary {
    pub cleared_count: usize,
    pub total_count: usize,
}

/// Anything pushed to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    Notification(NotificationRecord),
    Cleared(ClearSummary),
}

impl OutboundEvent {
    /// JSON value pushed to the consumer
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            OutboundEvent::Notification(record) => serde_json::to_value(record)?,
            OutboundEvent::Cleared(summary) => serde_json::json!({
                "action": "notifications_cleared",
                "clearedCount": summary.cleared_count,
                "totalCount": summary.total_count,
            }),
        })
    }

    /// Serialized payload handed to the sink
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json()?)?)
    }
}
