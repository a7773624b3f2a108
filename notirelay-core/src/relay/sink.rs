//! Per-event delivery reports
//!
//! The drain loop emits exactly one [`DeliveryReport`] for every record it
//! takes off the queue.

use chrono::{DateTime, Utc};

use crate::types::EventRecord;

use super::client::Outcome;

/// What happened to one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Delivered,
    Rejected(u16),
    TransportFailure(String),
    /// The record never reached the client because it could not be encoded
    EncodingFailure(String),
}

impl Disposition {
    /// Short label used as the `outcome` log field
    pub fn kind(&self) -> &'static str {
        match self {
            Disposition::Delivered => "delivered",
            Disposition::Rejected(_) => "rejected",
            Disposition::TransportFailure(_) => "transport_failure",
            Disposition::EncodingFailure(_) => "encoding_failure",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Disposition::Delivered)
    }
}

impl From<Outcome> for Disposition {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Delivered => Disposition::Delivered,
            Outcome::Rejected(status) => Disposition::Rejected(status),
            Outcome::TransportFailure(cause) => Disposition::TransportFailure(cause),
        }
    }
}

/// Identity of a record plus its disposition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub source_id: String,
    pub occurred_at: DateTime<Utc>,
    pub disposition: Disposition,
}

impl DeliveryReport {
    pub fn new(record: &EventRecord, disposition: Disposition) -> Self {
        Self {
            source_id: record.source_id().to_string(),
            occurred_at: record.occurred_at(),
            disposition,
        }
    }
}

/// Write-only destination for delivery reports
pub trait DeliverySink: Send + Sync {
    fn record(&self, report: &DeliveryReport);
}

/// Logs each report through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DeliverySink for TracingSink {
    fn record(&self, report: &DeliveryReport) {
        let outcome = report.disposition.kind();
        match &report.disposition {
            Disposition::Delivered => tracing::info!(
                source_id = %report.source_id,
                occurred_at = %report.occurred_at,
                outcome,
                "Event delivered"
            ),
            Disposition::Rejected(status) => tracing::warn!(
                source_id = %report.source_id,
                occurred_at = %report.occurred_at,
                outcome,
                status = *status,
                "Event rejected by server"
            ),
            Disposition::TransportFailure(cause) => tracing::warn!(
                source_id = %report.source_id,
                occurred_at = %report.occurred_at,
                outcome,
                cause = %cause,
                "Failed to send event"
            ),
            Disposition::EncodingFailure(cause) => tracing::error!(
                source_id = %report.source_id,
                occurred_at = %report.occurred_at,
                outcome,
                cause = %cause,
                "Dropped event that could not be encoded"
            ),
        }
    }
}
