//! Normalizer - turns a raw platform notification into a `NotificationRecord`
//!
//! Total over its input: a bad field is skipped, a bad extension bag yields a
//! minimal record with `error` set. Nothing here returns an error to the caller.

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use tracing::{trace, warn};

use super::raw::{
    ExtraValue, RawNotification, EXTRA_BIG_TEXT, EXTRA_INFO_TEXT, EXTRA_SUB_TEXT,
    EXTRA_SUMMARY_TEXT, EXTRA_TEXT, EXTRA_TITLE,
};
use super::record::NotificationRecord;
use crate::config::RelayConfig;

/// Raw notification → record
#[derive(Debug, Clone)]
pub struct Normalizer {
    max_extra_value_len: usize,
}

impl Normalizer {
    /// Normalizer keeping extension values up to `max_extra_value_len` characters
    pub fn new(max_extra_value_len: usize) -> Self {
        Self { max_extra_value_len }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.max_extra_value_len)
    }

    /// Map a raw notification to a record
    ///
    /// Never fails. If the extras bag cannot be read at all the record keeps
    /// id, package and post time, and `error` says why.
    pub fn normalize(&self, raw: &RawNotification) -> NotificationRecord {
        let mut record = NotificationRecord::minimal(raw.id, &raw.package_name, raw.post_time);

        if let Err(e) = self.extract_into(raw, &mut record) {
            warn!(
                id = raw.id,
                package = %raw.package_name,
                error = %e,
                "Notification extraction failed, delivering degraded record"
            );
            record.error = Some(e.to_string());
        }

        record
    }

    fn extract_into(&self, raw: &RawNotification, record: &mut NotificationRecord) -> Result<()> {
        if let Some(reason) = &raw.extras_error {
            bail!("extras unreadable: {}", reason);
        }
        let Some(extras) = &raw.extras else {
            return Ok(());
        };

        record.title = text_field(extras, EXTRA_TITLE);
        record.text = text_field(extras, EXTRA_TEXT);
        record.big_text = text_field(extras, EXTRA_BIG_TEXT);
        record.info_text = text_field(extras, EXTRA_INFO_TEXT);
        record.sub_text = text_field(extras, EXTRA_SUB_TEXT);
        record.summary_text = text_field(extras, EXTRA_SUMMARY_TEXT);
        record.additional_info = self.additional_info(extras);

        Ok(())
    }

    fn additional_info(&self, extras: &BTreeMap<String, ExtraValue>) -> BTreeMap<String, String> {
        let mut info = BTreeMap::new();
        for (key, value) in extras {
            match value.render() {
                Ok(Some(rendered)) => {
                    if rendered.chars().count() <= self.max_extra_value_len {
                        info.insert(key.clone(), rendered);
                    } else {
                        trace!(key = %key, "Dropping oversized extra");
                    }
                }
                Ok(None) => {}
                Err(reason) => {
                    trace!(key = %key, reason = %reason, "Skipping unreadable extra");
                }
            }
        }
        info
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

/// Well-known text field; anything but a readable string is treated as absent
fn text_field(extras: &BTreeMap<String, ExtraValue>, key: &str) -> String {
    match extras.get(key) {
        Some(ExtraValue::Text(s)) => s.clone(),
        Some(ExtraValue::Unreadable { unreadable }) => {
            trace!(key = %key, reason = %unreadable, "Unreadable text field");
            String::new()
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawNotification {
        RawNotification::new(7, "com.chat", 1000)
            .with_text(EXTRA_TITLE, "Alice")
            .with_text(EXTRA_TEXT, "See you at 5")
            .with_text(EXTRA_BIG_TEXT, "See you at 5, bring the slides")
            .with_extra("android.progress", ExtraValue::Int(40))
    }

    #[test]
    fn test_well_known_fields_extracted() {
        let record = Normalizer::default().normalize(&sample());
        assert_eq!(record.id, 7);
        assert_eq!(record.package_name, "com.chat");
        assert_eq!(record.post_time, 1000);
        assert_eq!(record.title, "Alice");
        assert_eq!(record.text, "See you at 5");
        assert_eq!(record.big_text, "See you at 5, bring the slides");
        assert_eq!(record.info_text, "");
        assert!(record.error.is_none());
    }

    #[test]
    fn test_additional_info_includes_all_readable_extras() {
        let record = Normalizer::default().normalize(&sample());
        assert_eq!(record.additional_info["android.title"], "Alice");
        assert_eq!(record.additional_info["android.progress"], "40");
        assert_eq!(record.additional_info.len(), 4);
    }

    #[test]
    fn test_missing_optional_fields_are_empty_strings() {
        let record = Normalizer::default().normalize(&RawNotification::new(1, "com.x", 5));
        let json = serde_json::to_value(&record).unwrap();
        for key in ["title", "text", "bigText", "infoText", "subText", "summaryText"] {
            assert_eq!(json[key], "", "{} should be an empty string", key);
        }
        assert!(record.additional_info.is_empty());
        assert!(record.error.is_none());
    }

    #[test]
    fn test_extra_length_limit() {
        let at_limit = "a".repeat(500);
        let over_limit = "b".repeat(501);
        let raw = RawNotification::new(1, "com.x", 5)
            .with_text("at", at_limit.clone())
            .with_text("over", over_limit);

        let record = Normalizer::default().normalize(&raw);
        assert_eq!(record.additional_info.get("at"), Some(&at_limit));
        assert!(!record.additional_info.contains_key("over"));
    }

    #[test]
    fn test_limit_counts_characters_not_bytes() {
        let wide = "é".repeat(500);
        let raw = RawNotification::new(1, "com.x", 5).with_text("wide", wide.clone());
        let record = Normalizer::default().normalize(&raw);
        assert_eq!(record.additional_info.get("wide"), Some(&wide));
    }

    #[test]
    fn test_unreadable_field_skipped_rest_kept() {
        let raw = sample().with_extra(
            EXTRA_SUB_TEXT,
            ExtraValue::Unreadable { unreadable: "class not found".into() },
        );
        let record = Normalizer::default().normalize(&raw);

        assert_eq!(record.sub_text, "");
        assert!(!record.additional_info.contains_key(EXTRA_SUB_TEXT));
        assert_eq!(record.title, "Alice");
        assert!(record.error.is_none());
    }

    #[test]
    fn test_null_extra_omitted() {
        let raw = RawNotification::new(1, "com.x", 5).with_extra("android.template", ExtraValue::Null);
        let record = Normalizer::default().normalize(&raw);
        assert!(record.additional_info.is_empty());
    }

    #[test]
    fn test_non_text_title_treated_as_absent() {
        let raw = RawNotification::new(1, "com.x", 5).with_extra(EXTRA_TITLE, ExtraValue::Int(3));
        let record = Normalizer::default().normalize(&raw);
        assert_eq!(record.title, "");
        assert_eq!(record.additional_info[EXTRA_TITLE], "3");
    }

    #[test]
    fn test_corrupt_extras_yield_error_record() {
        let raw = sample().with_corrupt_extras("BadParcelableException");
        let record = Normalizer::default().normalize(&raw);

        assert_eq!(record.id, 7);
        assert_eq!(record.package_name, "com.chat");
        assert_eq!(record.title, "");
        assert!(record.additional_info.is_empty());
        let error = record.error.expect("error should be set");
        assert!(error.contains("BadParcelableException"));
    }

    #[test]
    fn test_nested_bundle_rendered_into_additional_info() {
        let mut bundle = BTreeMap::new();
        bundle.insert("sender".to_string(), ExtraValue::Text("a".into()));
        let raw = sample().with_extra("android.messages", ExtraValue::Map(bundle));

        let record = Normalizer::default().normalize(&raw);
        assert_eq!(record.title, "Alice");
        assert_eq!(record.additional_info["android.messages"], "{sender=a}");
        assert!(record.error.is_none());
    }

    #[test]
    fn test_nested_unreadable_value_skips_only_that_extra() {
        let mut bundle = BTreeMap::new();
        bundle.insert(
            "icon".to_string(),
            ExtraValue::Unreadable { unreadable: "bitmap too large".into() },
        );
        let raw = sample().with_extra("android.largeIcon.big", ExtraValue::Map(bundle));

        let record = Normalizer::default().normalize(&raw);
        assert!(!record.additional_info.contains_key("android.largeIcon.big"));
        assert_eq!(record.additional_info["android.progress"], "40");
        assert!(record.error.is_none());
    }

    #[test]
    fn test_custom_limit() {
        let raw = RawNotification::new(1, "com.x", 5).with_text("k", "12345");
        assert!(Normalizer::new(4).normalize(&raw).additional_info.is_empty());
        assert_eq!(Normalizer::new(5).normalize(&raw).additional_info["k"], "12345");
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize(&sample()), normalizer.normalize(&sample()));
    }
}
