//! Outbound webhook fan-out for marketplace events.
//!
//! Given an owner, an event kind and a JSON payload, the [`Dispatcher`]
//! delivers one signed envelope to every matching active subscription
//! concurrently, refuses unsafe target URLs, and appends exactly one audit
//! record per attempt whatever the outcome.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gigwire_core::OwnerId;
//! use gigwire_webhooks::{
//!     Dispatcher, DispatcherConfig, EventKind, InMemoryDeliveryStore,
//!     InMemorySubscriptionRegistry,
//! };
//!
//! # async fn run() -> Result<(), gigwire_webhooks::WebhookError> {
//! let dispatcher = Dispatcher::new(
//!     DispatcherConfig::from_env()?,
//!     Arc::new(InMemorySubscriptionRegistry::new()),
//!     Arc::new(InMemoryDeliveryStore::new()),
//! )?;
//! dispatcher
//!     .dispatch(OwnerId::new(), EventKind::ApplicationNew, serde_json::json!({"gig_id": 42}))
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod models;
pub mod recorder;
pub mod store;
pub mod validation;

pub use config::DispatcherConfig;
pub use dispatcher::{DispatchReport, Dispatcher};
pub use envelope::EventEnvelope;
pub use error::{DeliveryFailure, WebhookError, WebhookResult};
pub use executor::{DeliveryOutcome, DeliveryTransport, HttpDeliveryExecutor, OutboundRequest};
pub use models::{DeliveryRecord, EventKind, NewDeliveryRecord, Subscription};
pub use recorder::DeliveryRecorder;
pub use store::{
    DeliveryAuditStore, InMemoryDeliveryStore, InMemorySubscriptionRegistry, PgDeliveryStore,
    PgSubscriptionRegistry, SubscriptionRegistry,
};
