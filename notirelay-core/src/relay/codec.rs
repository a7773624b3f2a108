//! Wire format for the collection endpoint
//!
//! Converts an [`EventRecord`] to the JSON object the server expects:
//!
//! ```json
//! {
//!   "packageName": "com.example.chat",
//!   "title": "Hi",
//!   "text": "there",
//!   "timestamp": "2024-01-15T10:00:00.000Z",
//!   "extras": {},
//!   "deviceId": "5f0c..."
//! }
//! ```
//!
//! ## Timestamp Semantics
//!
//! `timestamp` is the instant the event was observed on the device, not the
//! moment it was sent. It is written as ISO-8601 in UTC with a `Z` suffix and
//! millisecond precision, widened to micro- or nanoseconds only when the
//! instant carries them, so decoding gives back the exact same instant.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::types::EventRecord;

/// Transport representation of one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRecord {
    /// Origin application (`EventRecord::source_id`)
    pub package_name: String,

    #[serde(default)]
    pub title: Option<String>,

    /// Notification body (`EventRecord::body`)
    #[serde(default)]
    pub text: Option<String>,

    /// ISO-8601 instant, see module docs
    pub timestamp: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub extras: HashMap<String, String>,

    #[serde(default)]
    pub device_id: Option<String>,
}

/// Encode a record for the wire.
///
/// Fails with [`Error::Encoding`] when the record has no device id or its
/// timestamp falls outside the four-digit-year range.
pub fn encode(record: &EventRecord) -> Result<WireRecord> {
    if record.source_id().trim().is_empty() {
        return Err(Error::Encoding("record has an empty source_id".to_string()));
    }
    let device_id = record.device_id().ok_or_else(|| {
        Error::Encoding(format!(
            "record from {} has no device_id",
            record.source_id()
        ))
    })?;

    Ok(WireRecord {
        package_name: record.source_id().to_string(),
        title: record.title().map(str::to_string),
        text: record.body().map(str::to_string),
        timestamp: format_timestamp(&record.occurred_at())?,
        extras: record.attributes().clone(),
        device_id: Some(device_id.to_string()),
    })
}

/// Decode a wire record back into an [`EventRecord`].
pub fn decode(wire: &WireRecord) -> Result<EventRecord> {
    if wire.package_name.trim().is_empty() {
        return Err(Error::InvalidRecord("packageName must not be empty".to_string()));
    }
    let occurred_at = parse_timestamp(&wire.timestamp)?;

    Ok(EventRecord::from_parts(
        wire.package_name.clone(),
        wire.title.clone(),
        wire.text.clone(),
        occurred_at,
        wire.extras.clone(),
        wire.device_id.clone(),
    ))
}

/// Serialize a wire record to the request body.
pub fn to_json(wire: &WireRecord) -> Result<String> {
    Ok(serde_json::to_string(wire)?)
}

/// Parse a request body and decode it.
pub fn from_json(json: &str) -> Result<EventRecord> {
    let wire: WireRecord = serde_json::from_str(json)?;
    decode(&wire)
}

/// Format an instant the way the collection endpoint stores it.
pub fn format_timestamp(ts: &DateTime<Utc>) -> Result<String> {
    if !(0..=9999).contains(&ts.year()) {
        return Err(Error::Encoding(format!(
            "timestamp year {} cannot be written as ISO-8601",
            ts.year()
        )));
    }

    let nanos = ts.timestamp_subsec_nanos();
    let precision = if nanos % 1_000_000 == 0 {
        SecondsFormat::Millis
    } else if nanos % 1_000 == 0 {
        SecondsFormat::Micros
    } else {
        SecondsFormat::Nanos
    };
    Ok(ts.to_rfc3339_opts(precision, true))
}

/// Parse `YYYY-MM-DDTHH:MM:SS.fff[...]` followed by `Z` or `±HH:MM`.
///
/// Between 3 and 9 fractional digits are required; anything else is a
/// [`Error::MalformedTimestamp`].
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if !has_wire_shape(s) {
        return Err(Error::MalformedTimestamp(s.to_string()));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::MalformedTimestamp(format!("{}: {}", s, e)))
}

fn has_wire_shape(s: &str) -> bool {
    let b = s.as_bytes();
    // shortest accepted form: 2024-01-15T10:00:00.000Z
    if b.len() < 24 {
        return false;
    }

    let digits = |from: usize, to: usize| b[from..to].iter().all(u8::is_ascii_digit);
    let date_time = digits(0, 4)
        && b[4] == b'-'
        && digits(5, 7)
        && b[7] == b'-'
        && digits(8, 10)
        && b[10] == b'T'
        && digits(11, 13)
        && b[13] == b':'
        && digits(14, 16)
        && b[16] == b':'
        && digits(17, 19)
        && b[19] == b'.';
    if !date_time {
        return false;
    }

    let fraction = b[20..].iter().take_while(|c| c.is_ascii_digit()).count();
    if !(3..=9).contains(&fraction) {
        return false;
    }

    match &b[20 + fraction..] {
        b"Z" => true,
        [b'+' | b'-', h1, h2, b':', m1, m2] => [h1, h2, m1, m2].iter().all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}
