//! gigwire Core Library
//!
//! Shared types for the gigwire services.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (OwnerId, SubscriptionId, DeliveryId)
//!
//! # Example
//!
//! ```
//! use gigwire_core::{OwnerId, SubscriptionId};
//!
//! let owner = OwnerId::new();
//! let subscription = SubscriptionId::new();
//! assert_ne!(owner.as_uuid(), subscription.as_uuid());
//! ```

pub mod ids;

pub use ids::{DeliveryId, OwnerId, ParseIdError, SubscriptionId};
