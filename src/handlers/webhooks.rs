use crate::errors::ServiceError;
use crate::services::checkout::{OrderPayload, ORDER_PAYLOAD_KEY};
use crate::services::orders::CompletedSession;
use crate::AppState;
use axum::{body::Bytes, extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Event type that triggers order creation; every other type is acknowledged
/// and dropped.
const COMPLETION_EVENT_TYPE: &str = "checkout.session.completed";

#[derive(Debug, Deserialize)]
struct PaymentEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    data: PaymentEventData,
}

#[derive(Debug, Deserialize)]
struct PaymentEventData {
    object: SessionObject,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

// POST /api/v1/webhooks/payments
//
// Signature verification is a hard gate: the body is not even parsed until
// the HMAC over the raw bytes checks out. Persistence failures return 500 so
// the processor's at-least-once redelivery kicks in; the unique session-id
// constraint makes those retries safe.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payments",
    request_body = String,
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 400, description = "Invalid signature or unprocessable payload", body = crate::errors::ErrorResponse),
        (status = 500, description = "Persistence failure, event will be redelivered", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    verify_payment_signature(
        &headers,
        &body,
        &state.config.payment_webhook_secret,
        state.config.payment_webhook_tolerance_secs,
    )?;

    let event: PaymentEvent = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid event json: {}", e)))?;

    if event.event_type != COMPLETION_EVENT_TYPE {
        debug!(event_type = %event.event_type, "ignoring non-completion payment event");
        return Ok((StatusCode::OK, "ignored"));
    }

    let object = event.data.object;
    info!(
        session_id = %object.id,
        event_id = event.id.as_deref().unwrap_or("-"),
        "processing checkout completion event"
    );

    // Redelivery cannot repair a malformed or missing payload, so these are
    // 400s rather than 500s; the signature already checked out, meaning the
    // session was created without reconstruction metadata.
    let raw_payload = object.metadata.get(ORDER_PAYLOAD_KEY).ok_or_else(|| {
        error!(session_id = %object.id, "completion event has no order payload in metadata");
        ServiceError::BadRequest("session metadata missing order payload".into())
    })?;
    let payload: OrderPayload = serde_json::from_str(raw_payload).map_err(|e| {
        error!(session_id = %object.id, error = %e, "order payload in metadata is unparsable");
        ServiceError::BadRequest(format!("unparsable order payload: {}", e))
    })?;

    let cents = object.amount_total.ok_or_else(|| {
        ServiceError::BadRequest("completion event missing amount_total".into())
    })?;

    state
        .orders
        .create_from_completed_session(CompletedSession {
            session_id: object.id,
            payment_reference: object.payment_intent,
            amount_total: Decimal::new(cents, 2),
            payload,
        })
        .await?;

    Ok((StatusCode::OK, "ok"))
}

// POST /api/v1/webhooks/distributor
//
// The signature check here is advisory by deliberate policy: a mismatch is
// logged, never rejected. Only a failed store write surfaces an error.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/distributor",
    request_body = String,
    responses(
        (status = 200, description = "Event recorded"),
        (status = 500, description = "Store write failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn distributor_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    if !distributor_signature_matches(&headers, &body, &state.config.distributor_secret_key) {
        warn!("distributor webhook signature mismatch, recording event anyway");
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&body).into_owned()));
    let event_type = payload
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let record = state.distributor_events.ingest(event_type, payload).await?;

    if let Err(e) = state
        .event_sender
        .send(crate::events::Event::DistributorEventLogged {
            event_id: record.id,
            event_type: record.event_type.clone(),
        })
        .await
    {
        warn!(error = %e, "failed to announce distributor event");
    }

    Ok((StatusCode::OK, "ok"))
}

/// HMAC-SHA256 over `"{timestamp}.{raw_body}"` with the shared webhook
/// secret; headers `x-timestamp` and `x-signature` (hex). Any missing header,
/// stale timestamp or digest mismatch fails the request before the body is
/// parsed.
fn verify_payment_signature(
    headers: &HeaderMap,
    payload: &Bytes,
    secret: &str,
    tolerance_secs: u64,
) -> Result<(), ServiceError> {
    let timestamp = headers
        .get("x-timestamp")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::SignatureError("missing x-timestamp header".into()))?;
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::SignatureError("missing x-signature header".into()))?;

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| ServiceError::SignatureError("invalid timestamp".into()))?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).unsigned_abs() > tolerance_secs {
        return Err(ServiceError::SignatureError(
            "timestamp outside tolerance window".into(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("invalid webhook secret".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    if constant_time_eq(&expected, signature) {
        Ok(())
    } else {
        warn!("payment webhook signature verification failed");
        Err(ServiceError::SignatureError("signature mismatch".into()))
    }
}

/// Advisory check for the distributor webhook: HMAC-SHA256 hex over the raw
/// body, header `x-distributor-signature`.
fn distributor_signature_matches(headers: &HeaderMap, payload: &Bytes, secret: &str) -> bool {
    let Some(signature) = headers
        .get("x-distributor-signature")
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, signature)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
