//! Dispatcher configuration.
//!
//! The production flag is explicit rather than read ambiently at call time, so
//! tests and embedders control URL policy deterministically.

use std::env;
use std::time::Duration;

use crate::error::WebhookError;

/// Default per-request timeout for outbound deliveries.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of response body characters kept in a delivery record.
pub const DEFAULT_MAX_RESPONSE_BODY_CHARS: usize = 4096;

/// User agent sent with every delivery.
pub const DEFAULT_USER_AGENT: &str = "gigwire-webhooks/1.0";

/// Runtime settings for the dispatcher and its HTTP executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Production deployments only contact `https` targets.
    pub production: bool,
    /// Hard deadline for one outbound request, body read included.
    pub request_timeout: Duration,
    /// Response bodies longer than this are truncated with a marker.
    pub max_response_body_chars: usize,
    pub user_agent: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            production: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_response_body_chars: DEFAULT_MAX_RESPONSE_BODY_CHARS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl DispatcherConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `APP_ENV`: `production`/`prod` enables production mode (default: development)
    /// - `WEBHOOK_TIMEOUT_MS`: per-request timeout in milliseconds (default: 10000)
    /// - `WEBHOOK_MAX_RESPONSE_CHARS`: response body truncation length (default: 4096)
    pub fn from_env() -> Result<Self, WebhookError> {
        let mut config = Self::default();

        if let Ok(app_env) = env::var("APP_ENV") {
            config.production = is_production_env(&app_env);
        }

        if let Ok(raw) = env::var("WEBHOOK_TIMEOUT_MS") {
            let ms = parse_positive("WEBHOOK_TIMEOUT_MS", &raw)?;
            config.request_timeout = Duration::from_millis(ms);
        }

        if let Ok(raw) = env::var("WEBHOOK_MAX_RESPONSE_CHARS") {
            let chars = parse_positive("WEBHOOK_MAX_RESPONSE_CHARS", &raw)?;
            config.max_response_body_chars = usize::try_from(chars).map_err(|_| {
                WebhookError::Config {
                    var: "WEBHOOK_MAX_RESPONSE_CHARS".to_string(),
                    reason: format!("value {chars} is too large"),
                }
            })?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_response_body_chars(mut self, chars: usize) -> Self {
        self.max_response_body_chars = chars;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// `production` or `prod`, case-insensitive. Anything else is development.
fn is_production_env(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    if lower == "production" || lower == "prod" {
        return true;
    }
    if lower != "development" && lower != "dev" {
        tracing::warn!(
            target: "webhook_delivery",
            value = %value,
            "Unrecognized APP_ENV value, defaulting to development"
        );
    }
    false
}

fn parse_positive(var: &str, raw: &str) -> Result<u64, WebhookError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(WebhookError::Config {
            var: var.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Ok(v) => Ok(v),
        Err(e) => Err(WebhookError::Config {
            var: var.to_string(),
            reason: format!("{raw:?} is not a valid number: {e}"),
        }),
    }
}
