//! Event dispatch orchestration.
//!
//! Responsible for finding an owner's subscriptions that match an event kind,
//! building one envelope, fanning out one task per subscription, and waiting
//! until every attempt has been recorded.
//!
//! Each attempt runs Validating → (Blocked | Signing → Sending) → Recorded.
//! Nothing inside a branch can fail the dispatch call or its siblings.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use gigwire_core::OwnerId;
use tokio::task::JoinHandle;

use crate::config::DispatcherConfig;
use crate::crypto;
use crate::envelope::EventEnvelope;
use crate::error::{DeliveryFailure, WebhookError};
use crate::executor::{DeliveryOutcome, DeliveryTransport, HttpDeliveryExecutor, OutboundRequest};
use crate::models::{EventKind, Subscription};
use crate::recorder::DeliveryRecorder;
use crate::store::{DeliveryAuditStore, SubscriptionRegistry};
use crate::validation;

/// How one attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptKind {
    Blocked,
    Succeeded,
    NonSuccess,
    Failed,
}

impl AttemptKind {
    fn from_outcome(outcome: &DeliveryOutcome) -> Self {
        match outcome {
            DeliveryOutcome::Response { .. } if outcome.is_success() => Self::Succeeded,
            DeliveryOutcome::Response { .. } => Self::NonSuccess,
            DeliveryOutcome::Failed(DeliveryFailure::Blocked(_)) => Self::Blocked,
            DeliveryOutcome::Failed(_) => Self::Failed,
        }
    }
}

/// Summary of one dispatch call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscriptions whose event set contained the event kind.
    pub matched: usize,
    /// Attempts rejected by the URL safety validator.
    pub blocked: usize,
    /// Attempts answered with a 2xx status.
    pub succeeded: usize,
    /// Attempts answered with any other status.
    pub non_success: usize,
    /// Attempts without an HTTP response (transport, timeout, unknown).
    pub failed: usize,
    /// Records the audit store accepted.
    pub recorded: usize,
}

impl DispatchReport {
    fn add(&mut self, kind: AttemptKind, recorded: bool) {
        match kind {
            AttemptKind::Blocked => self.blocked += 1,
            AttemptKind::Succeeded => self.succeeded += 1,
            AttemptKind::NonSuccess => self.non_success += 1,
            AttemptKind::Failed => self.failed += 1,
        }
        if recorded {
            self.recorded += 1;
        }
    }
}

/// Fans events out to subscribers.
///
/// Cheap to clone; clones share the registry, the audit store and the HTTP
/// connection pool.
#[derive(Clone)]
pub struct Dispatcher {
    config: DispatcherConfig,
    registry: Arc<dyn SubscriptionRegistry>,
    recorder: DeliveryRecorder,
    transport: Arc<dyn DeliveryTransport>,
}

impl Dispatcher {
    /// Create a dispatcher that delivers over HTTP.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be built.
    pub fn new(
        config: DispatcherConfig,
        registry: Arc<dyn SubscriptionRegistry>,
        store: Arc<dyn DeliveryAuditStore>,
    ) -> Result<Self, WebhookError> {
        let transport = Arc::new(HttpDeliveryExecutor::new(&config)?);
        Ok(Self::with_transport(config, registry, store, transport))
    }

    /// Create a dispatcher with a custom transport.
    #[must_use]
    pub fn with_transport(
        config: DispatcherConfig,
        registry: Arc<dyn SubscriptionRegistry>,
        store: Arc<dyn DeliveryAuditStore>,
        transport: Arc<dyn DeliveryTransport>,
    ) -> Self {
        Self {
            config,
            registry,
            recorder: DeliveryRecorder::new(store),
            transport,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Deliver `payload` to every active subscription of `owner_id` that
    /// listens for `event_kind`, and wait until each attempt is recorded.
    ///
    /// Never fails: subscriber errors, timeouts and store failures are
    /// absorbed into delivery records and logs.
    pub async fn dispatch(&self, owner_id: OwnerId, event_kind: EventKind, payload: serde_json::Value) {
        self.dispatch_report(owner_id, event_kind, payload).await;
    }

    /// Fire-and-forget wrapper around [`dispatch`](Self::dispatch).
    ///
    /// Must be called from within a tokio runtime. The returned handle may be
    /// dropped; the dispatch keeps running to completion.
    pub fn spawn_dispatch(
        &self,
        owner_id: OwnerId,
        event_kind: EventKind,
        payload: serde_json::Value,
    ) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(owner_id, event_kind, payload).await })
    }

    /// Same as [`dispatch`](Self::dispatch), returning per-outcome counts.
    pub async fn dispatch_report(
        &self,
        owner_id: OwnerId,
        event_kind: EventKind,
        payload: serde_json::Value,
    ) -> DispatchReport {
        let subscriptions = match self.registry.list_active(owner_id).await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    owner_id = %owner_id,
                    event_kind = %event_kind,
                    error = %e,
                    "Failed to query active subscriptions"
                );
                return DispatchReport::default();
            }
        };

        let matching: Vec<Subscription> = subscriptions
            .into_iter()
            .filter(|s| s.is_subscribed_to(event_kind))
            .collect();

        if matching.is_empty() {
            tracing::debug!(
                target: "webhook_delivery",
                owner_id = %owner_id,
                event_kind = %event_kind,
                "No active subscriptions match event kind"
            );
            return DispatchReport::default();
        }

        tracing::info!(
            target: "webhook_delivery",
            owner_id = %owner_id,
            event_kind = %event_kind,
            subscription_count = matching.len(),
            "Dispatching event to matching subscriptions"
        );

        let mut report = DispatchReport {
            matched: matching.len(),
            ..DispatchReport::default()
        };

        let envelope = EventEnvelope::build(event_kind, payload, Utc::now());
        let (body, snapshot) = match encode_envelope(&envelope) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    owner_id = %owner_id,
                    event_kind = %event_kind,
                    error = %e,
                    "Failed to serialize event envelope"
                );
                let outcome = DeliveryOutcome::Failed(DeliveryFailure::Unknown(format!(
                    "failed to serialize envelope: {e}"
                )));
                for subscription in &matching {
                    let recorded = self
                        .recorder
                        .record(subscription, event_kind, serde_json::Value::Null, &outcome)
                        .await;
                    report.add(AttemptKind::Failed, recorded);
                }
                return report;
            }
        };

        let handles: Vec<(Subscription, JoinHandle<(AttemptKind, bool)>)> = matching
            .into_iter()
            .map(|subscription| {
                let dispatcher = self.clone();
                let branch_subscription = subscription.clone();
                let body = body.clone();
                let snapshot = snapshot.clone();
                let handle = tokio::spawn(async move {
                    dispatcher
                        .attempt(&branch_subscription, event_kind, body, snapshot)
                        .await
                });
                (subscription, handle)
            })
            .collect();

        // Every branch is already running; this only waits for all of them.
        for (subscription, handle) in handles {
            match handle.await {
                Ok((kind, recorded)) => report.add(kind, recorded),
                Err(join_error) => {
                    tracing::error!(
                        target: "webhook_delivery",
                        subscription_id = %subscription.id,
                        event_kind = %event_kind,
                        error = %join_error,
                        "Delivery task panicked"
                    );
                    let outcome = DeliveryOutcome::Failed(DeliveryFailure::Unknown(format!(
                        "delivery task aborted: {join_error}"
                    )));
                    let recorded = self
                        .recorder
                        .record(&subscription, event_kind, snapshot.clone(), &outcome)
                        .await;
                    report.add(AttemptKind::Failed, recorded);
                }
            }
        }

        tracing::debug!(
            target: "webhook_delivery",
            owner_id = %owner_id,
            event_kind = %event_kind,
            matched = report.matched,
            succeeded = report.succeeded,
            non_success = report.non_success,
            failed = report.failed,
            blocked = report.blocked,
            "Dispatch finished"
        );

        report
    }

    /// One branch: validate, sign, send, record.
    async fn attempt(
        &self,
        subscription: &Subscription,
        event_kind: EventKind,
        body: Bytes,
        snapshot: serde_json::Value,
    ) -> (AttemptKind, bool) {
        if let Err(e) = validation::validate_target_url(&subscription.target_url, self.config.production)
        {
            tracing::warn!(
                target: "webhook_delivery",
                subscription_id = %subscription.id,
                event_kind = %event_kind,
                reason = %e,
                "Delivery blocked by URL safety check"
            );
            let outcome = DeliveryOutcome::Failed(DeliveryFailure::Blocked(e.to_string()));
            let recorded = self
                .recorder
                .record(subscription, event_kind, snapshot, &outcome)
                .await;
            return (AttemptKind::Blocked, recorded);
        }

        let signature = crypto::sign_payload(&body, &subscription.shared_secret);
        let request = OutboundRequest {
            url: subscription.target_url.clone(),
            event_kind,
            signature,
            body,
        };

        let start = Instant::now();
        let outcome = self.transport.deliver(request).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        let kind = AttemptKind::from_outcome(&outcome);

        match (&outcome, kind) {
            (_, AttemptKind::Succeeded) => tracing::info!(
                target: "webhook_delivery",
                subscription_id = %subscription.id,
                event_kind = %event_kind,
                status_code = outcome.status_code(),
                latency_ms,
                "Webhook delivery succeeded"
            ),
            (DeliveryOutcome::Failed(failure), _) => tracing::warn!(
                target: "webhook_delivery",
                subscription_id = %subscription.id,
                event_kind = %event_kind,
                failure = failure.kind(),
                error = %failure,
                latency_ms,
                "Webhook delivery failed"
            ),
            _ => tracing::warn!(
                target: "webhook_delivery",
                subscription_id = %subscription.id,
                event_kind = %event_kind,
                status_code = outcome.status_code(),
                latency_ms,
                "Webhook delivery returned non-success status"
            ),
        }

        let recorded = self
            .recorder
            .record(subscription, event_kind, snapshot, &outcome)
            .await;
        (kind, recorded)
    }
}

fn encode_envelope(envelope: &EventEnvelope) -> Result<(Bytes, serde_json::Value), WebhookError> {
    Ok((envelope.to_bytes()?, envelope.to_snapshot()?))
}
