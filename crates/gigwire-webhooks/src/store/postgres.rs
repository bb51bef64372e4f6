//! Postgres-backed registry and audit store.
//!
//! Tables are defined in `migrations/`; call [`run_migrations`] once at
//! startup.

use std::borrow::Cow;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gigwire_core::{DeliveryId, OwnerId, SubscriptionId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{DeliveryAuditStore, SubscriptionRegistry};
use crate::error::WebhookError;
use crate::models::{DeliveryRecord, EventKind, NewDeliveryRecord, Subscription};

/// Apply the embedded webhook migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), WebhookError> {
    tracing::info!(target: "webhook_delivery", "Running webhook migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, FromRow)]
struct SubscriptionRow {
    id: Uuid,
    owner_id: Uuid,
    target_url: String,
    shared_secret: String,
    subscribed_events: Vec<String>,
    active: bool,
}

impl SubscriptionRow {
    fn into_subscription(self) -> Subscription {
        let subscribed_events = self
            .subscribed_events
            .iter()
            .filter_map(|raw| {
                let kind = EventKind::parse(raw);
                if kind.is_none() {
                    tracing::warn!(
                        target: "webhook_delivery",
                        subscription_id = %self.id,
                        event_kind = %raw,
                        "Ignoring unknown event kind on stored subscription"
                    );
                }
                kind
            })
            .collect();

        Subscription {
            id: SubscriptionId::from_uuid(self.id),
            owner_id: OwnerId::from_uuid(self.owner_id),
            target_url: self.target_url,
            shared_secret: self.shared_secret,
            subscribed_events,
            active: self.active,
        }
    }
}

#[derive(Debug, FromRow)]
struct DeliveryRow {
    id: Uuid,
    subscription_id: Uuid,
    event_kind: String,
    payload_snapshot: serde_json::Value,
    status_code: i32,
    response_body: String,
    created_at: DateTime<Utc>,
}

impl DeliveryRow {
    fn into_record(self) -> Result<DeliveryRecord, WebhookError> {
        let event_kind = EventKind::parse(&self.event_kind).ok_or_else(|| {
            WebhookError::AuditStore(format!("Unknown event kind {:?}", self.event_kind))
        })?;
        let status_code = u16::try_from(self.status_code).map_err(|_| {
            WebhookError::AuditStore(format!("Invalid status code {}", self.status_code))
        })?;

        Ok(DeliveryRecord {
            id: DeliveryId::from_uuid(self.id),
            subscription_id: SubscriptionId::from_uuid(self.subscription_id),
            event_kind,
            payload_snapshot: self.payload_snapshot,
            status_code,
            response_body: self.response_body,
            created_at: self.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Reads subscriptions from `webhook_subscriptions`.
#[derive(Debug, Clone)]
pub struct PgSubscriptionRegistry {
    pool: PgPool,
}

impl PgSubscriptionRegistry {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRegistry for PgSubscriptionRegistry {
    async fn list_active(&self, owner_id: OwnerId) -> Result<Vec<Subscription>, WebhookError> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r"
            SELECT id, owner_id, target_url, shared_secret, subscribed_events, active
            FROM webhook_subscriptions
            WHERE owner_id = $1 AND active = TRUE
            ORDER BY created_at
            ",
        )
        .bind(owner_id.into_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SubscriptionRow::into_subscription).collect())
    }
}

// ---------------------------------------------------------------------------
// Audit store
// ---------------------------------------------------------------------------

/// Appends to `webhook_deliveries`.
#[derive(Debug, Clone)]
pub struct PgDeliveryStore {
    pool: PgPool,
}

impl PgDeliveryStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recent deliveries for a subscription, newest first.
    pub async fn list_for_subscription(
        &self,
        subscription_id: SubscriptionId,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>, WebhookError> {
        let rows = sqlx::query_as::<_, DeliveryRow>(
            r"
            SELECT id, subscription_id, event_kind, payload_snapshot,
                   status_code, response_body, created_at
            FROM webhook_deliveries
            WHERE subscription_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(subscription_id.into_uuid())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DeliveryRow::into_record).collect()
    }
}

#[async_trait]
impl DeliveryAuditStore for PgDeliveryStore {
    async fn append(&self, mut record: NewDeliveryRecord) -> Result<(), WebhookError> {
        sanitize_json(&mut record.payload_snapshot);
        let response_body = sanitize_text(&record.response_body);

        sqlx::query(
            r"
            INSERT INTO webhook_deliveries
                (id, subscription_id, event_kind, payload_snapshot, status_code, response_body)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(DeliveryId::new().into_uuid())
        .bind(record.subscription_id.into_uuid())
        .bind(record.event_kind.as_str())
        .bind(&record.payload_snapshot)
        .bind(i32::from(record.status_code))
        .bind(response_body.as_ref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// NUL handling
// ---------------------------------------------------------------------------

/// Postgres `TEXT` and `JSONB` reject U+0000; it is stored as U+FFFD instead.
const NUL: char = '\0';
const NUL_REPLACEMENT: &str = "\u{FFFD}";

fn sanitize_text(text: &str) -> Cow<'_, str> {
    if text.contains(NUL) {
        Cow::Owned(text.replace(NUL, NUL_REPLACEMENT))
    } else {
        Cow::Borrowed(text)
    }
}

/// Replace NULs in every string and object key of `value`.
fn sanitize_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => {
            if s.contains(NUL) {
                *s = s.replace(NUL, NUL_REPLACEMENT);
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(sanitize_json),
        serde_json::Value::Object(map) => {
            if map.keys().any(|k| k.contains(NUL)) {
                *map = std::mem::take(map)
                    .into_iter()
                    .map(|(k, v)| (k.replace(NUL, NUL_REPLACEMENT), v))
                    .collect();
            }
            map.values_mut().for_each(sanitize_json);
        }
        _ => {}
    }
}
