//! Outbound delivery execution.
//!
//! [`HttpDeliveryExecutor`] issues exactly one POST per call with a hard
//! timeout and normalizes whatever happens into a [`DeliveryOutcome`]. It
//! observes status codes but never judges them, and reads no more of a
//! response body than it can record.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response};

use crate::config::DispatcherConfig;
use crate::error::{DeliveryFailure, WebhookError};
use crate::models::EventKind;

/// Header carrying the hex HMAC-SHA256 of the body.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Header carrying the event kind string.
pub const EVENT_HEADER: &str = "X-Webhook-Event";

/// Marker appended to response bodies cut at the character limit.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// One signed request ready to be sent.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub event_kind: EventKind,
    pub signature: String,
    pub body: Bytes,
}

/// Normalized result of a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The subscriber answered; any status, recorded verbatim.
    Response { status_code: u16, body: String },
    /// No HTTP response was obtained.
    Failed(DeliveryFailure),
}

impl DeliveryOutcome {
    /// Status code to record: the real one, or `0` for failures.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Response { status_code, .. } => *status_code,
            Self::Failed(failure) => failure.status_code(),
        }
    }

    /// Body to record: the (truncated) response, or the failure diagnostic.
    #[must_use]
    pub fn response_body(&self) -> String {
        match self {
            Self::Response { body, .. } => body.clone(),
            Self::Failed(failure) => failure.message(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Response { status_code, .. } if (200..300).contains(status_code))
    }
}

/// Sends one request to one subscriber.
///
/// Implementations must not panic and must report every failure as a
/// [`DeliveryOutcome::Failed`].
#[async_trait]
pub trait DeliveryTransport: Send + Sync + 'static {
    async fn deliver(&self, request: OutboundRequest) -> DeliveryOutcome;
}

/// reqwest-backed executor shared by all branches of a dispatch.
#[derive(Debug, Clone)]
pub struct HttpDeliveryExecutor {
    client: Client,
    timeout: Duration,
    max_body_chars: usize,
}

impl HttpDeliveryExecutor {
    /// Build an executor with a pooled client.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &DispatcherConfig) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout: config.request_timeout,
            max_body_chars: config.max_response_body_chars,
        })
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn headers(request: &OutboundRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            EVENT_HEADER,
            HeaderValue::from_static(request.event_kind.as_str()),
        );
        // Hex digests are always valid header values.
        if let Ok(v) = HeaderValue::from_str(&request.signature) {
            headers.insert(SIGNATURE_HEADER, v);
        }
        headers
    }

    fn classify_error(&self, e: &reqwest::Error) -> DeliveryFailure {
        if e.is_timeout() {
            DeliveryFailure::Timeout(format!(
                "no response within {}ms",
                self.timeout.as_millis()
            ))
        } else if e.is_connect() || e.is_request() || e.is_body() {
            DeliveryFailure::Transport(error_chain(e))
        } else {
            DeliveryFailure::Unknown(error_chain(e))
        }
    }
}

#[async_trait]
impl DeliveryTransport for HttpDeliveryExecutor {
    async fn deliver(&self, request: OutboundRequest) -> DeliveryOutcome {
        let headers = Self::headers(&request);
        let start = Instant::now();

        // The client-level timeout covers connect, send and body read; the
        // outer deadline guards against anything that slips past it.
        let attempt = async {
            let response = self
                .client
                .post(&request.url)
                .headers(headers)
                .body(request.body.clone())
                .send()
                .await?;
            let status_code = response.status().as_u16();
            let (raw, cut) = read_body_limited(response, max_body_bytes(self.max_body_chars)).await?;
            Ok::<_, reqwest::Error>((status_code, raw, cut))
        };

        let outcome = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok((status_code, raw, cut))) => DeliveryOutcome::Response {
                status_code,
                body: decode_body(raw, self.max_body_chars, cut),
            },
            Ok(Err(e)) => DeliveryOutcome::Failed(self.classify_error(&e)),
            Err(_) => DeliveryOutcome::Failed(DeliveryFailure::Timeout(format!(
                "no response within {}ms",
                self.timeout.as_millis()
            ))),
        };

        tracing::debug!(
            target: "webhook_delivery",
            event_kind = %request.event_kind,
            status_code = outcome.status_code(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Delivery attempt finished"
        );

        outcome
    }
}

/// Byte budget for a body of `max_chars` characters (UTF-8 is at most 4 bytes each).
fn max_body_bytes(max_chars: usize) -> usize {
    max_chars.saturating_mul(4)
}

/// Read at most `max_bytes` of the body, stopping the stream once the cap is
/// reached. Returns the bytes read and whether anything was left unread.
async fn read_body_limited(
    mut response: Response,
    max_bytes: usize,
) -> Result<(Vec<u8>, bool), reqwest::Error> {
    let hint = response
        .content_length()
        .map_or(4096, |len| usize::try_from(len).unwrap_or(usize::MAX));
    let mut body = Vec::with_capacity(hint.min(max_bytes));

    while let Some(chunk) = response.chunk().await? {
        let room = max_bytes - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }

    Ok((body, false))
}

/// Decode a (possibly cut) body and apply the character limit.
///
/// A cut body always carries [`TRUNCATION_MARKER`], even when the bytes that
/// were kept decode to fewer than `max_chars` characters.
fn decode_body(mut raw: Vec<u8>, max_chars: usize, cut: bool) -> String {
    if cut {
        // Drop a multi-byte character split by the byte cap.
        if let Err(e) = std::str::from_utf8(&raw) {
            if e.error_len().is_none() {
                raw.truncate(e.valid_up_to());
            }
        }
    }

    let text = String::from_utf8_lossy(&raw);
    if cut && text.chars().count() <= max_chars {
        format!("{text}{TRUNCATION_MARKER}")
    } else {
        truncate_body(&text, max_chars)
    }
}

/// Keep the first `max_chars` characters, appending [`TRUNCATION_MARKER`] if cut.
#[must_use]
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut truncated = String::with_capacity(byte_idx + TRUNCATION_MARKER.len());
            truncated.push_str(&body[..byte_idx]);
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => body.to_string(),
    }
}

/// `Display` of the error plus its sources, e.g. "error sending request: connection refused".
fn error_chain(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    msg
}
