//! Error types for the webhook engine.
//!
//! [`WebhookError`] covers collaborator, configuration and validation
//! failures. [`DeliveryFailure`] is the per-attempt taxonomy recorded in the
//! audit trail; it never escapes the dispatcher.

use std::fmt;

/// Webhook engine error variants.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("SSRF protection: {0}")]
    SsrfDetected(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Subscription registry error: {0}")]
    Registry(String),

    #[error("Delivery audit store error: {0}")]
    AuditStore(String),

    #[error("Invalid configuration for {var}: {reason}")]
    Config { var: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reason a delivery attempt ended without an HTTP response.
///
/// Every variant is recorded with status code `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The target URL was rejected by the safety validator; nothing was sent.
    Blocked(String),
    /// DNS, connect, reset or other connection-level failure.
    Transport(String),
    /// The per-request deadline elapsed and the request was cancelled.
    Timeout(String),
    /// Any other failure at the transport layer.
    Unknown(String),
}

impl DeliveryFailure {
    /// Synthetic status code stored for attempts without an HTTP response.
    pub const STATUS_CODE: u16 = 0;

    #[must_use]
    pub fn status_code(&self) -> u16 {
        Self::STATUS_CODE
    }

    /// Short diagnostic stored as the record's response body.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Blocked(reason) => {
                format!("Blocked: request not sent for safety reasons ({reason})")
            }
            Self::Transport(msg) => format!("Connection failed: {msg}"),
            Self::Timeout(msg) => format!("Request timeout: {msg}"),
            Self::Unknown(msg) => format!("Request error: {msg}"),
        }
    }

    /// Stable label used in log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Blocked(_) => "blocked",
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

pub type WebhookResult<T> = Result<T, WebhookError>;
