//! Collaborator seams: the subscription registry (read) and the delivery
//! audit store (append).
//!
//! The dispatcher only ever reads a snapshot of active subscriptions and
//! appends delivery records. In-memory implementations live here; the
//! Postgres-backed ones live in [`postgres`].

pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use gigwire_core::{DeliveryId, OwnerId, SubscriptionId};
use tokio::sync::RwLock;

use crate::error::WebhookError;
use crate::models::{DeliveryRecord, NewDeliveryRecord, Subscription};

pub use postgres::{PgDeliveryStore, PgSubscriptionRegistry};

/// Read-only lookup of an owner's active subscriptions.
#[async_trait]
pub trait SubscriptionRegistry: Send + Sync + 'static {
    /// Return the owner's subscriptions with `active = true`.
    async fn list_active(&self, owner_id: OwnerId) -> Result<Vec<Subscription>, WebhookError>;
}

/// Append-only sink for delivery audit records.
#[async_trait]
pub trait DeliveryAuditStore: Send + Sync + 'static {
    async fn append(&self, record: NewDeliveryRecord) -> Result<(), WebhookError>;
}

// ---------------------------------------------------------------------------
// In-memory registry
// ---------------------------------------------------------------------------

/// Registry backed by a map, for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionRegistry {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
}

impl InMemorySubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a subscription.
    pub async fn upsert(&self, subscription: Subscription) {
        self.subscriptions
            .write()
            .await
            .insert(subscription.id, subscription);
    }

    pub async fn remove(&self, id: SubscriptionId) -> Option<Subscription> {
        self.subscriptions.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }
}

#[async_trait]
impl SubscriptionRegistry for InMemorySubscriptionRegistry {
    async fn list_active(&self, owner_id: OwnerId) -> Result<Vec<Subscription>, WebhookError> {
        let subscriptions = self.subscriptions.read().await;
        let mut active: Vec<Subscription> = subscriptions
            .values()
            .filter(|s| s.owner_id == owner_id && s.active)
            .cloned()
            .collect();
        active.sort_by_key(|s| s.id);
        Ok(active)
    }
}

// ---------------------------------------------------------------------------
// In-memory audit store
// ---------------------------------------------------------------------------

/// Audit store that keeps records in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryDeliveryStore {
    records: RwLock<Vec<DeliveryRecord>>,
}

impl InMemoryDeliveryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records appended so far.
    pub async fn records(&self) -> Vec<DeliveryRecord> {
        self.records.read().await.clone()
    }

    pub async fn records_for(&self, subscription_id: SubscriptionId) -> Vec<DeliveryRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.subscription_id == subscription_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DeliveryAuditStore for InMemoryDeliveryStore {
    async fn append(&self, record: NewDeliveryRecord) -> Result<(), WebhookError> {
        let stored = DeliveryRecord::from_new(record, DeliveryId::new(), Utc::now());
        self.records.write().await.push(stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;

    fn subscription(owner_id: OwnerId, active: bool) -> Subscription {
        Subscription {
            id: SubscriptionId::new(),
            owner_id,
            target_url: "https://example.com/hook".to_string(),
            shared_secret: "secret".to_string(),
            subscribed_events: [EventKind::GigUpdate].into_iter().collect(),
            active,
        }
    }

    #[tokio::test]
    async fn test_list_active_filters_owner_and_inactive() {
        let registry = InMemorySubscriptionRegistry::new();
        let owner = OwnerId::new();
        let other = OwnerId::new();

        let active = subscription(owner, true);
        registry.upsert(active.clone()).await;
        registry.upsert(subscription(owner, false)).await;
        registry.upsert(subscription(other, true)).await;

        let listed = registry.list_active(owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, active.id);
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_remove_subscription() {
        let registry = InMemorySubscriptionRegistry::new();
        let sub = subscription(OwnerId::new(), true);
        registry.upsert(sub.clone()).await;

        assert!(registry.remove(sub.id).await.is_some());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_append_assigns_id_and_timestamp() {
        let store = InMemoryDeliveryStore::new();
        let subscription_id = SubscriptionId::new();
        let before = Utc::now();

        store
            .append(NewDeliveryRecord {
                subscription_id,
                event_kind: EventKind::GigUpdate,
                payload_snapshot: serde_json::json!({"event": "gig.update"}),
                status_code: 204,
                response_body: String::new(),
            })
            .await
            .unwrap();

        let records = store.records_for(subscription_id).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status_code, 204);
        assert!(records[0].created_at >= before);
        assert!(store.records_for(SubscriptionId::new()).await.is_empty());
    }
}
