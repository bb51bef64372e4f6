//! Strongly Typed Identifiers
//!
//! Newtype wrappers around [`Uuid`] so an owner id can never be passed where a
//! subscription id is expected.
//!
//! ```
//! use gigwire_core::{OwnerId, SubscriptionId};
//!
//! fn owner_label(id: OwnerId) -> String {
//!     format!("owner:{id}")
//! }
//!
//! let owner = OwnerId::new();
//! assert!(owner_label(owner).starts_with("owner:"));
//! // owner_label(SubscriptionId::new()); // does not compile
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a string is not a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse {id_type}: {message}")]
pub struct ParseIdError {
    /// Name of the identifier type that failed to parse.
    pub id_type: &'static str,
    /// Underlying UUID parse error message.
    pub message: String,
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            #[must_use]
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    message: e.to_string(),
                })
            }
        }
    };
}

define_id!(
    /// Identifier of the entity that owns webhook subscriptions (a user or
    /// an organization account). Events are dispatched per owner.
    OwnerId
);

define_id!(
    /// Identifier of a registered webhook subscription.
    SubscriptionId
);

define_id!(
    /// Identifier of a persisted delivery record.
    DeliveryId
);
