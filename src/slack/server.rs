//! Events API HTTP endpoint.
//!
//! Slack expects an answer within three seconds, so the handler only verifies,
//! parses, and enqueues; the listener does the work.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::slack::events::{EventEnvelope, SlackEvent};

type HmacSha256 = Hmac<Sha256>;

/// Requests older than this are rejected as replays.
pub const SIGNATURE_MAX_AGE_SECS: u64 = 60 * 5;

const SIGNATURE_HEADER: &str = "x-slack-signature";
const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const RETRY_HEADER: &str = "x-slack-retry-num";

struct EventsState {
    signing_secret: SecretString,
    events_tx: mpsc::Sender<SlackEvent>,
}

/// Build the router with `POST /slack/events` and a `GET /` health check.
pub fn events_router(signing_secret: SecretString, events_tx: mpsc::Sender<SlackEvent>) -> Router {
    let state = Arc::new(EventsState {
        signing_secret,
        events_tx,
    });

    Router::new()
        .route("/", get(health))
        .route("/slack/events", post(slack_events))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "Slack file bot is running!"
}

async fn slack_events(
    State(state): State<Arc<EventsState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let (Some(signature), Some(timestamp)) = (header(SIGNATURE_HEADER), header(TIMESTAMP_HEADER))
    else {
        return unauthorized("Missing signature headers");
    };

    let now = chrono::Utc::now().timestamp();
    match timestamp.parse::<i64>() {
        Ok(ts) if now.abs_diff(ts) <= SIGNATURE_MAX_AGE_SECS => {}
        _ => return unauthorized("Request too old"),
    }

    if !verify_signature(
        state.signing_secret.expose_secret(),
        timestamp,
        &body,
        signature,
    ) {
        return unauthorized("Invalid signature");
    }

    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Malformed Events API payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "invalid payload" })),
            )
                .into_response();
        }
    };

    match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            Json(serde_json::json!({ "challenge": challenge })).into_response()
        }
        EventEnvelope::EventCallback { event_id, event } => {
            if let Some(retry) = header(RETRY_HEADER) {
                // Redeliveries would duplicate uploads.
                debug!(event_id = ?event_id, retry, "Ignoring Slack retry");
                return ok();
            }

            let label = event.label();
            match state.events_tx.try_send(event) {
                Ok(()) => debug!(event_id = ?event_id, event = label, "Event queued"),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(event_id = ?event_id, event = label, "Event queue full; dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(event_id = ?event_id, "Event listener stopped");
                    return StatusCode::SERVICE_UNAVAILABLE.into_response();
                }
            }
            ok()
        }
        EventEnvelope::Unknown => ok(),
    }
}

fn ok() -> Response {
    Json(serde_json::json!({ "ok": true })).into_response()
}

fn unauthorized(message: &str) -> Response {
    warn!(reason = message, "Rejected Events API request");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// HMAC over Slack's `v0:{timestamp}:{body}` base string.
fn signing_mac(signing_secret: &str, timestamp: &str, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes()).ok()?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Some(mac)
}

/// Compute the `v0=<hex>` signature Slack sends for a request.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mac = signing_mac(signing_secret, timestamp, body)?;
    Some(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

/// Verify a `v0=<hex>` request signature in constant time.
pub fn verify_signature(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
) -> bool {
    let Some(tag) = signature
        .strip_prefix("v0=")
        .and_then(|hex_tag| hex::decode(hex_tag).ok())
    else {
        return false;
    };

    match signing_mac(signing_secret, timestamp, body) {
        Some(mac) => mac.verify_slice(&tag).is_ok(),
        None => {
            warn!("failed to create HMAC");
            false
        }
    }
}
