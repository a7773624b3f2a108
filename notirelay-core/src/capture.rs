//! Turning raw platform notifications into [`EventRecord`]s
//!
//! Every raw event yields exactly one record. When the metadata cannot be
//! read, a minimal record (no title, no body, no attributes) is produced
//! instead so the event is still relayed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::relay::IngestionQueue;
use crate::types::EventRecord;

/// Metadata key holding the notification title
pub const TITLE_KEY: &str = "android.title";
/// Metadata key holding the notification text
pub const TEXT_KEY: &str = "android.text";

/// Source id used when the platform reports none
pub const UNKNOWN_SOURCE: &str = "unknown";

/// A notification as reported by the platform
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    /// Posting application
    #[serde(rename = "packageName")]
    pub source_id: String,

    /// Post time, epoch milliseconds on the wire
    #[serde(rename = "postTime", with = "chrono::serde::ts_milliseconds")]
    pub posted_at: DateTime<Utc>,

    /// Free-form metadata bag
    #[serde(default)]
    pub extras: Value,
}

#[derive(Debug, Default)]
struct Extracted {
    title: Option<String>,
    body: Option<String>,
    attributes: HashMap<String, String>,
}

/// Builds records stamped with this device's id
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    device_id: String,
}

impl RecordBuilder {
    pub fn new(device_id: impl Into<String>) -> Result<Self> {
        let device_id = device_id.into();
        if device_id.trim().is_empty() {
            return Err(Error::Config("device id must not be empty".to_string()));
        }
        Ok(Self { device_id })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Build the record for `raw`, falling back to a minimal one on bad metadata.
    pub fn build(&self, raw: &RawEvent) -> EventRecord {
        let source_id = if raw.source_id.trim().is_empty() {
            UNKNOWN_SOURCE
        } else {
            raw.source_id.as_str()
        };

        let extracted = match extract(&raw.extras) {
            Ok(extracted) => extracted,
            Err(e) => {
                tracing::warn!(
                    source_id = %source_id,
                    error = %e,
                    "Malformed notification metadata, relaying minimal record"
                );
                Extracted::default()
            }
        };

        EventRecord::from_parts(
            source_id.to_string(),
            extracted.title,
            extracted.body,
            raw.posted_at,
            extracted.attributes,
            Some(self.device_id.clone()),
        )
    }
}

fn extract(extras: &Value) -> Result<Extracted> {
    let map = match extras {
        Value::Null => return Ok(Extracted::default()),
        Value::Object(map) => map,
        other => {
            return Err(Error::InvalidRecord(format!(
                "extras must be an object, got {}",
                json_kind(other)
            )))
        }
    };

    let mut extracted = Extracted {
        attributes: HashMap::with_capacity(map.len()),
        ..Default::default()
    };
    for (key, value) in map {
        match key.as_str() {
            TITLE_KEY => extracted.title = text_field(key, value)?,
            TEXT_KEY => extracted.body = text_field(key, value)?,
            _ => {
                extracted.attributes.insert(key.clone(), flatten(value));
            }
        }
    }
    Ok(extracted)
}

fn text_field(key: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(Error::InvalidRecord(format!(
            "{} must be a string, got {}",
            key,
            json_kind(other)
        ))),
    }
}

fn flatten(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Entry point for the platform notification callback
///
/// While listening, each posted notification becomes one record on the queue.
/// The listening flag lives in memory only.
pub struct CaptureListener {
    builder: RecordBuilder,
    queue: IngestionQueue,
    listening: AtomicBool,
}

impl CaptureListener {
    pub fn new(builder: RecordBuilder, queue: IngestionQueue, listening: bool) -> Self {
        Self {
            builder,
            queue,
            listening: AtomicBool::new(listening),
        }
    }

    /// Handle a posted notification. Returns whether it was enqueued.
    pub fn on_event_posted(&self, raw: &RawEvent) -> bool {
        if !self.is_listening() {
            tracing::trace!(source_id = %raw.source_id, "Not listening, ignoring notification");
            return false;
        }

        let record = self.builder.build(raw);
        tracing::debug!(source_id = %record.source_id(), "Received notification");
        self.queue.enqueue(record);
        true
    }

    pub fn set_listening(&self, listening: bool) {
        self.listening.store(listening, Ordering::SeqCst);
        tracing::info!(listening, "Capture toggled");
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn queue(&self) -> &IngestionQueue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn raw(extras: Value) -> RawEvent {
        RawEvent {
            source_id: "com.example.test".to_string(),
            posted_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            extras,
        }
    }

    fn builder() -> RecordBuilder {
        RecordBuilder::new("device-1").unwrap()
    }

    #[test]
    fn test_title_and_text_are_extracted() {
        let record = builder().build(&raw(json!({
            "android.title": "Real Title",
            "android.text": "Real Text",
        })));

        assert_eq!(record.source_id(), "com.example.test");
        assert_eq!(record.title(), Some("Real Title"));
        assert_eq!(record.body(), Some("Real Text"));
        assert!(record.attributes().is_empty());
        assert_eq!(record.device_id(), Some("device-1"));
    }

    #[test]
    fn test_title_key_is_consumed() {
        let record = builder().build(&raw(json!({"android.title": "X"})));

        assert_eq!(record.title(), Some("X"));
        assert_eq!(record.body(), None);
        assert!(record.attributes().is_empty());
    }

    #[test]
    fn test_other_values_are_flattened() {
        let record = builder().build(&raw(json!({
            "android.showWhen": true,
            "android.progress": 42,
            "android.people": ["a", "b"],
            "android.subText": null,
            "android.summaryText": "sum",
        })));

        let attrs = record.attributes();
        assert_eq!(attrs["android.showWhen"], "true");
        assert_eq!(attrs["android.progress"], "42");
        assert_eq!(attrs["android.people"], r#"["a","b"]"#);
        assert_eq!(attrs["android.subText"], "");
        assert_eq!(attrs["android.summaryText"], "sum");
        assert_eq!(attrs.len(), 5);
    }

    #[test]
    fn test_malformed_metadata_falls_back() {
        let expected_ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        for extras in [
            json!("not a bundle"),
            json!([1, 2, 3]),
            json!({"android.title": {"spans": []}, "other": "x"}),
            json!({"android.text": 7}),
        ] {
            let record = builder().build(&raw(extras));
            assert_eq!(record.source_id(), "com.example.test");
            assert_eq!(record.occurred_at(), expected_ts);
            assert_eq!(record.device_id(), Some("device-1"));
            assert_eq!(record.title(), None);
            assert_eq!(record.body(), None);
            assert!(record.attributes().is_empty());
        }
    }

    #[test]
    fn test_missing_extras_and_source() {
        let mut event = raw(Value::Null);
        event.source_id = "  ".to_string();

        let record = builder().build(&event);
        assert_eq!(record.source_id(), UNKNOWN_SOURCE);
        assert!(record.attributes().is_empty());
    }

    #[test]
    fn test_raw_event_from_json_line() {
        let line = r#"{"packageName":"com.example.chat","postTime":1705312800123,
            "extras":{"android.title":"Hi"}}"#;
        let event: RawEvent = serde_json::from_str(line).unwrap();

        assert_eq!(event.source_id, "com.example.chat");
        assert_eq!(event.posted_at.timestamp_millis(), 1_705_312_800_123);
        assert_eq!(builder().build(&event).title(), Some("Hi"));
    }

    #[test]
    fn test_blank_device_id_rejected() {
        assert!(RecordBuilder::new("").is_err());
    }
}
