//! Domain types: event kinds, subscriptions and delivery records.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use gigwire_core::{DeliveryId, OwnerId, SubscriptionId};
use serde::{Deserialize, Serialize};

/// Closed set of events a subscriber can register for.
///
/// Adding a kind is a code change; the wire form is the dotted string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A freelancer applied to a gig.
    #[serde(rename = "application.new")]
    ApplicationNew,
    /// A new direct message was sent.
    #[serde(rename = "message.new")]
    MessageNew,
    /// A gig was edited or changed status.
    #[serde(rename = "gig.update")]
    GigUpdate,
    /// A review was posted.
    #[serde(rename = "review.new")]
    ReviewNew,
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationNew => "application.new",
            Self::MessageNew => "message.new",
            Self::GigUpdate => "gig.update",
            Self::ReviewNew => "review.new",
        }
    }

    /// Parse the dotted wire form. Unknown strings yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "application.new" => Some(Self::ApplicationNew),
            "message.new" => Some(Self::MessageNew),
            "gig.update" => Some(Self::GigUpdate),
            "review.new" => Some(Self::ReviewNew),
            _ => None,
        }
    }

    #[must_use]
    pub fn all() -> &'static [EventKind] {
        &[
            Self::ApplicationNew,
            Self::MessageNew,
            Self::GigUpdate,
            Self::ReviewNew,
        ]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered webhook endpoint, as returned by the subscription registry.
///
/// The shared secret is never printed: `Debug` redacts it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub owner_id: OwnerId,
    pub target_url: String,
    #[serde(skip_serializing)]
    pub shared_secret: String,
    pub subscribed_events: BTreeSet<EventKind>,
    pub active: bool,
}

impl Subscription {
    /// Whether this subscription wants to receive `kind`.
    #[must_use]
    pub fn is_subscribed_to(&self, kind: EventKind) -> bool {
        self.subscribed_events.contains(&kind)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("target_url", &self.target_url)
            .field("shared_secret", &"[REDACTED]")
            .field("subscribed_events", &self.subscribed_events)
            .field("active", &self.active)
            .finish()
    }
}

/// Audit entry for one delivery attempt, ready to be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDeliveryRecord {
    pub subscription_id: SubscriptionId,
    pub event_kind: EventKind,
    /// The envelope that was (or would have been) sent.
    pub payload_snapshot: serde_json::Value,
    /// Real HTTP status, or `0` when no response was received.
    pub status_code: u16,
    pub response_body: String,
}

impl NewDeliveryRecord {
    /// Whether the subscriber answered with a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// A persisted delivery record. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: DeliveryId,
    pub subscription_id: SubscriptionId,
    pub event_kind: EventKind,
    pub payload_snapshot: serde_json::Value,
    pub status_code: u16,
    pub response_body: String,
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Materialize a stored record from its insert shape.
    #[must_use]
    pub fn from_new(record: NewDeliveryRecord, id: DeliveryId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            subscription_id: record.subscription_id,
            event_kind: record.event_kind,
            payload_snapshot: record.payload_snapshot,
            status_code: record.status_code,
            response_body: record.response_body,
            created_at,
        }
    }
}
