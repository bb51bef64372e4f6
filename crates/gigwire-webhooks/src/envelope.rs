//! Canonical event envelope sent to every subscriber of a dispatch call.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::WebhookError;
use crate::models::EventKind;

/// `{event, timestamp, data}` body delivered to subscribers.
///
/// Built once per dispatch call and serialized once, so every subscriber
/// receives byte-identical bodies and only the signature differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: EventKind,
    #[serde(serialize_with = "serialize_iso8601_millis")]
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Assemble an envelope. Deterministic for identical inputs.
    #[must_use]
    pub fn build(event: EventKind, data: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            event,
            timestamp: now,
            data,
        }
    }

    /// Canonical body bytes (field order `event`, `timestamp`, `data`).
    pub fn to_bytes(&self) -> Result<Bytes, WebhookError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// JSON value stored as the delivery record's payload snapshot.
    pub fn to_snapshot(&self) -> Result<serde_json::Value, WebhookError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// `2024-05-01T12:00:00.123Z`: millisecond precision, `Z` suffix.
fn serialize_iso8601_millis<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}
