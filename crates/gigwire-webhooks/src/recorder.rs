//! Delivery audit recording.
//!
//! Exactly one record per attempt, whatever the outcome. Store failures are
//! logged and swallowed so they never reach the dispatch path.

use std::sync::Arc;

use crate::executor::DeliveryOutcome;
use crate::models::{EventKind, NewDeliveryRecord, Subscription};
use crate::store::DeliveryAuditStore;

#[derive(Clone)]
pub struct DeliveryRecorder {
    store: Arc<dyn DeliveryAuditStore>,
}

impl DeliveryRecorder {
    #[must_use]
    pub fn new(store: Arc<dyn DeliveryAuditStore>) -> Self {
        Self { store }
    }

    /// Build the audit record for one attempt.
    #[must_use]
    pub fn build_record(
        subscription: &Subscription,
        event_kind: EventKind,
        payload_snapshot: serde_json::Value,
        outcome: &DeliveryOutcome,
    ) -> NewDeliveryRecord {
        NewDeliveryRecord {
            subscription_id: subscription.id,
            event_kind,
            payload_snapshot,
            status_code: outcome.status_code(),
            response_body: outcome.response_body(),
        }
    }

    /// Append the record for one attempt. Returns whether the append succeeded.
    pub async fn record(
        &self,
        subscription: &Subscription,
        event_kind: EventKind,
        payload_snapshot: serde_json::Value,
        outcome: &DeliveryOutcome,
    ) -> bool {
        let record = Self::build_record(subscription, event_kind, payload_snapshot, outcome);
        let status_code = record.status_code;

        match self.store.append(record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    subscription_id = %subscription.id,
                    event_kind = %event_kind,
                    status_code,
                    error = %e,
                    "Failed to append delivery record"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeliveryFailure, WebhookError};
    use crate::models::NewDeliveryRecord;
    use crate::store::InMemoryDeliveryStore;
    use async_trait::async_trait;
    use gigwire_core::{OwnerId, SubscriptionId};

    struct BrokenStore;

    #[async_trait]
    impl DeliveryAuditStore for BrokenStore {
        async fn append(&self, _record: NewDeliveryRecord) -> Result<(), WebhookError> {
            Err(WebhookError::AuditStore("disk full".into()))
        }
    }

    fn subscription() -> Subscription {
        Subscription {
            id: SubscriptionId::new(),
            owner_id: OwnerId::new(),
            target_url: "https://example.com/hook".into(),
            shared_secret: "secret".into(),
            subscribed_events: [EventKind::ReviewNew].into_iter().collect(),
            active: true,
        }
    }

    #[test]
    fn test_build_record_from_response() {
        let sub = subscription();
        let outcome = DeliveryOutcome::Response {
            status_code: 500,
            body: "boom".into(),
        };
        let record = DeliveryRecorder::build_record(
            &sub,
            EventKind::ReviewNew,
            serde_json::json!({"event": "review.new"}),
            &outcome,
        );
        assert_eq!(record.subscription_id, sub.id);
        assert_eq!(record.status_code, 500);
        assert_eq!(record.response_body, "boom");
        assert!(!record.is_success());
    }

    #[test]
    fn test_build_record_from_failure() {
        let outcome = DeliveryOutcome::Failed(DeliveryFailure::Transport("refused".into()));
        let record = DeliveryRecorder::build_record(
            &subscription(),
            EventKind::ReviewNew,
            serde_json::json!({}),
            &outcome,
        );
        assert_eq!(record.status_code, 0);
        assert!(record.response_body.contains("refused"));
    }

    #[tokio::test]
    async fn test_record_appends_once() {
        let store = Arc::new(InMemoryDeliveryStore::new());
        let recorder = DeliveryRecorder::new(store.clone());
        let outcome = DeliveryOutcome::Response {
            status_code: 200,
            body: "ok".into(),
        };

        assert!(
            recorder
                .record(&subscription(), EventKind::ReviewNew, serde_json::json!({}), &outcome)
                .await
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let recorder = DeliveryRecorder::new(Arc::new(BrokenStore));
        let outcome = DeliveryOutcome::Failed(DeliveryFailure::Unknown("x".into()));
        let appended = recorder
            .record(&subscription(), EventKind::ReviewNew, serde_json::json!({}), &outcome)
            .await;
        assert!(!appended);
    }
}
