//! Common test utilities for gigwire-webhooks integration tests.
//!
//! Provides a recording fake transport, wiremock responders, and fixtures
//! for verifying dispatch behavior without a real database or network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gigwire_core::{OwnerId, SubscriptionId};
use gigwire_webhooks::{
    DeliveryFailure, DeliveryOutcome, DeliveryTransport, Dispatcher, DispatcherConfig, EventKind,
    InMemoryDeliveryStore, InMemorySubscriptionRegistry, OutboundRequest, Subscription,
};
use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Standard test owner IDs
pub const OWNER_A: OwnerId = OwnerId::from_uuid(Uuid::from_bytes([
    0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11,
]));

pub const OWNER_B: OwnerId = OwnerId::from_uuid(Uuid::from_bytes([
    0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22,
]));

/// Standard test secrets
pub const SECRET_1: &str = "whsec_test_secret_key_12345";
pub const SECRET_2: &str = "whsec_another_secret_67890";

/// Build an active subscription for `owner` listening to `events`.
pub fn subscription(
    owner: OwnerId,
    url: &str,
    secret: &str,
    events: &[EventKind],
) -> Subscription {
    Subscription {
        id: SubscriptionId::new(),
        owner_id: owner,
        target_url: url.to_string(),
        shared_secret: secret.to_string(),
        subscribed_events: events.iter().copied().collect(),
        active: true,
    }
}

/// Payload for an `application.new` event.
pub fn application_payload(gig_id: u64) -> serde_json::Value {
    serde_json::json!({
        "gig_id": gig_id,
        "applicant": "maria",
        "cover_letter": "I can start Monday."
    })
}

/// Install a test-writer subscriber once per test binary.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

/// In-memory collaborators plus a dispatcher wired to `transport`.
pub struct Harness {
    pub registry: Arc<InMemorySubscriptionRegistry>,
    pub store: Arc<InMemoryDeliveryStore>,
    pub transport: Arc<RecordingTransport>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    /// Development-mode harness with a 10s timeout.
    pub fn new(transport: RecordingTransport) -> Self {
        Self::with_config(DispatcherConfig::default(), transport)
    }

    pub fn with_config(config: DispatcherConfig, transport: RecordingTransport) -> Self {
        let registry = Arc::new(InMemorySubscriptionRegistry::new());
        let store = Arc::new(InMemoryDeliveryStore::new());
        let transport = Arc::new(transport);
        let dispatcher =
            Dispatcher::with_transport(config, registry.clone(), store.clone(), transport.clone());
        Self {
            registry,
            store,
            transport,
            dispatcher,
        }
    }

    pub async fn add(&self, subscription: Subscription) -> SubscriptionId {
        let id = subscription.id;
        self.registry.upsert(subscription).await;
        id
    }
}

// ---------------------------------------------------------------------------
// RecordingTransport - fake transport for dispatcher tests
// ---------------------------------------------------------------------------

/// What the fake transport does for a given URL.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Fail(DeliveryFailure),
    Panic,
}

#[derive(Debug, Clone)]
struct Route {
    reply: Reply,
    delay: Duration,
}

/// A transport that records every request and answers per URL.
///
/// Unrouted URLs answer `200 ok` immediately. Tracks the peak number of
/// requests in flight to observe concurrency.
#[derive(Default)]
pub struct RecordingTransport {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<OutboundRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `reply` after `delay`.
    pub fn route(self, url: &str, reply: Reply, delay: Duration) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route { reply, delay });
        self
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_to(&self, url: &str) -> Vec<OutboundRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryTransport for RecordingTransport {
    async fn deliver(&self, request: OutboundRequest) -> DeliveryOutcome {
        let route = self
            .routes
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or(Route {
                reply: Reply::Status(200, "ok".to_string()),
                delay: Duration::ZERO,
            });
        self.requests.lock().unwrap().push(request);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match route.reply {
            Reply::Status(status_code, body) => DeliveryOutcome::Response { status_code, body },
            Reply::Fail(failure) => DeliveryOutcome::Failed(failure),
            Reply::Panic => panic!("subscriber transport exploded"),
        }
    }
}

// ---------------------------------------------------------------------------
// CapturedRequest - for inspecting requests that reached a mock server
// ---------------------------------------------------------------------------

/// A captured HTTP request with body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl CapturedRequest {
    /// Parse the body as JSON.
    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// CaptureResponder - captures requests and returns a fixed response
// ---------------------------------------------------------------------------

/// A wiremock responder that captures incoming requests.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    response_code: u16,
    response_body: String,
}

impl CaptureResponder {
    /// Create a new capture responder that returns 200 OK.
    pub fn new() -> Self {
        Self::with_response(200, "")
    }

    /// Create a capture responder that returns a custom status and body.
    pub fn with_response(status: u16, body: &str) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: status,
            response_body: body.to_string(),
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for CaptureResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let captured = CapturedRequest {
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
        };
        self.requests.lock().unwrap().push(captured);
        ResponseTemplate::new(self.response_code).set_body_string(self.response_body.clone())
    }
}

// ---------------------------------------------------------------------------
// DelayedResponder - adds response delay
// ---------------------------------------------------------------------------

/// A wiremock responder that adds a delay before responding.
#[derive(Clone)]
pub struct DelayedResponder {
    delay_ms: u64,
    response_code: u16,
}

impl DelayedResponder {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            response_code: 200,
        }
    }
}

impl Respond for DelayedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(self.response_code).set_delay(Duration::from_millis(self.delay_ms))
    }
}
