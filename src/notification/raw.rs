//! Raw platform notification, as handed to the listener by the OS
//!
//! The extension bag is open-ended and loosely typed. Individual values can
//! be unreadable (the platform fails to unpack them), and the whole bag can be
//! unreadable too; both cases are represented explicitly so the normalizer
//! can degrade instead of failing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Well-known extras keys read into the record's text fields
pub const EXTRA_TITLE: &str = "android.title";
pub const EXTRA_TEXT: &str = "android.text";
pub const EXTRA_BIG_TEXT: &str = "android.bigText";
pub const EXTRA_INFO_TEXT: &str = "android.infoText";
pub const EXTRA_SUB_TEXT: &str = "android.subText";
pub const EXTRA_SUMMARY_TEXT: &str = "android.summaryText";

/// One value from the extension bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    /// The platform could not read this value
    Unreadable { unreadable: String },
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ExtraValue>),
    /// Nested bundle
    Map(BTreeMap<String, ExtraValue>),
}

impl ExtraValue {
    /// String form of the value
    ///
    /// `Ok(None)` for null, `Err` with the reason when the value (or a list
    /// element, or a nested value) is unreadable. Lists render as
    /// `[a, 1, null]`, nested bundles as `{key=value, other=1}`.
    pub fn render(&self) -> Result<Option<String>, String> {
        match self {
            ExtraValue::Unreadable { unreadable } => Err(unreadable.clone()),
            ExtraValue::Null => Ok(None),
            ExtraValue::Bool(b) => Ok(Some(b.to_string())),
            ExtraValue::Int(n) => Ok(Some(n.to_string())),
            ExtraValue::Float(x) => Ok(Some(x.to_string())),
            ExtraValue::Text(s) => Ok(Some(s.clone())),
            ExtraValue::List(items) => {
                let mut out = String::from("[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    match item.render()? {
                        Some(s) => out.push_str(&s),
                        None => out.push_str("null"),
                    }
                }
                out.push(']');
                Ok(Some(out))
            }
            ExtraValue::Map(entries) => {
                let mut out = String::from("{");
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push('=');
                    match item.render()? {
                        Some(s) => out.push_str(&s),
                        None => out.push_str("null"),
                    }
                }
                out.push('}');
                Ok(Some(out))
            }
        }
    }
}

/// Raw notification as posted by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNotification {
    /// Platform-assigned id (not unique across packages)
    pub id: i32,
    /// Platform key used for cancellation; derived when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    pub package_name: String,
    /// Post time, epoch ms
    pub post_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<BTreeMap<String, ExtraValue>>,
    /// Set when the extension bag as a whole could not be unpacked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras_error: Option<String>,
}

impl RawNotification {
    /// Notification with an empty extras bag
    pub fn new(id: i32, package_name: impl Into<String>, post_time: i64) -> Self {
        Self {
            id,
            key: String::new(),
            package_name: package_name.into(),
            post_time,
            extras: None,
            extras_error: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Add one extra, creating the bag if needed
    pub fn with_extra(mut self, key: impl Into<String>, value: ExtraValue) -> Self {
        self.extras
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    /// Shorthand for a text extra
    pub fn with_text(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_extra(key, ExtraValue::Text(value.into()))
    }

    /// Mark the whole extension bag as unreadable
    pub fn with_corrupt_extras(mut self, reason: impl Into<String>) -> Self {
        self.extras_error = Some(reason.into());
        self
    }

    /// Cancellation key; falls back to the platform's `user|package|id|tag|uid` shape
    pub fn effective_key(&self) -> String {
        if !self.key.is_empty() {
            return self.key.clone();
        }
        format!("0|{}|{}|null|0", self.package_name, self.id)
    }
}
