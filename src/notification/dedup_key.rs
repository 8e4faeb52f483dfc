//! Event identity used as the dedup key
//!
//! A notification is identified by the platform id together with its post
//! time. Content plays no part: two notifications with identical text but
//! different post times are distinct events, while a re-post of the same
//! (id, post time) pair is a duplicate.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::raw::RawNotification;

/// Composite dedup key: (platform id, post timestamp in epoch ms)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIdentity {
    pub id: i32,
    pub post_time: i64,
}

impl EventIdentity {
    /// Identity from a notification id and its post time (epoch ms)
    pub fn new(id: i32, post_time: i64) -> Self {
        Self { id, post_time }
    }

    /// Identity of a raw platform notification
    pub fn of(raw: &RawNotification) -> Self {
        Self::new(raw.id, raw.post_time)
    }
}

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.id, self.post_time)
    }
}
