//! Domain types for captured events.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// One captured device notification.
///
/// Fields are private so a record cannot change after construction; the
/// `with_*` methods consume the record and return a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    source_id: String,
    title: Option<String>,
    body: Option<String>,
    occurred_at: DateTime<Utc>,
    attributes: HashMap<String, String>,
    device_id: Option<String>,
}

impl EventRecord {
    /// Create a delivery-ready record.
    ///
    /// `source_id` and `device_id` must be non-blank.
    pub fn new(
        source_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
        device_id: impl Into<String>,
    ) -> Result<Self> {
        let source_id = source_id.into();
        let device_id = device_id.into();
        if source_id.trim().is_empty() {
            return Err(Error::InvalidRecord("source_id must not be empty".to_string()));
        }
        if device_id.trim().is_empty() {
            return Err(Error::InvalidRecord("device_id must not be empty".to_string()));
        }

        Ok(Self {
            source_id,
            title: None,
            body: None,
            occurred_at,
            attributes: HashMap::new(),
            device_id: Some(device_id),
        })
    }

    /// Rebuild a record from its decoded parts. Only the wire codec needs the
    /// absent-`device_id` form.
    pub(crate) fn from_parts(
        source_id: String,
        title: Option<String>,
        body: Option<String>,
        occurred_at: DateTime<Utc>,
        attributes: HashMap<String, String>,
        device_id: Option<String>,
    ) -> Self {
        Self {
            source_id,
            title,
            body,
            occurred_at,
            attributes,
            device_id,
        }
    }

    pub fn with_title(self, title: Option<String>) -> Self {
        Self { title, ..self }
    }

    pub fn with_body(self, body: Option<String>) -> Self {
        Self { body, ..self }
    }

    pub fn with_attributes(self, attributes: HashMap<String, String>) -> Self {
        Self { attributes, ..self }
    }

    /// Origin application or component
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// When the event was observed at its origin
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// Flattened metadata
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Originating device; `None` only for records decoded without one
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }
}
