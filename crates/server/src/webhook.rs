//! Webhook dispatcher: receives events from the call platform, routes them by
//! declared type, and converts every failure into a uniform JSON error
//! response. Nothing that happens in here may take the server process down.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crosstalk_core::config::{CallMode, VapiConfig};
use crosstalk_core::event::{WebhookEnvelope, WebhookMessage};
use crosstalk_core::normalize;
use crosstalk_db::repositories::{
    CallRepository, HumanCallRepository, SqlCallRepository, SqlHumanCallRepository,
};
use crosstalk_db::DbPool;

#[derive(Clone)]
pub struct WebhookState {
    pub db_pool: DbPool,
    pub vapi: VapiConfig,
    pub call_mode: CallMode,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook/vapi", post(vapi_webhook))
        // Some deployments put webhooks under /api; both paths are live.
        .route("/api/webhook/vapi", post(vapi_webhook))
        .with_state(state)
}

/// The platform retries deliveries and offers no signature, so this endpoint
/// accepts the body as raw bytes: a body that is not valid JSON (or not the
/// expected envelope) must produce a controlled 500, not an extractor reject.
pub async fn vapi_webhook(
    State(state): State<WebhookState>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let envelope_value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(parse_error) => {
            warn!(
                event_name = "webhook.body_unparseable",
                error = %parse_error,
                "discarding webhook delivery with unparseable body"
            );
            return internal_error();
        }
    };

    // Keep the message exactly as delivered; the normalizer stores it
    // verbatim for forensic replay.
    let raw_message = envelope_value.get("message").cloned().unwrap_or(Value::Null);

    let envelope: WebhookEnvelope = match serde_json::from_value(envelope_value) {
        Ok(envelope) => envelope,
        Err(shape_error) => {
            warn!(
                event_name = "webhook.envelope_invalid",
                error = %shape_error,
                "webhook body parsed but did not match the envelope shape"
            );
            return internal_error();
        }
    };

    dispatch(&state, envelope.message, raw_message).await
}

async fn dispatch(
    state: &WebhookState,
    message: WebhookMessage,
    raw_message: Value,
) -> (StatusCode, Json<Value>) {
    match message {
        WebhookMessage::EndOfCallReport(report) => {
            let call_id = report.call.id.clone();
            info!(
                event_name = "webhook.end_of_call.received",
                call_id = %call_id,
                ended_reason = report.call.ended_reason.as_deref().unwrap_or("unknown"),
                "end of call report received"
            );

            let persisted = match state.call_mode {
                CallMode::TwoAgent => {
                    let patch = normalize::end_of_call_patch(&report, raw_message);
                    SqlCallRepository::new(state.db_pool.clone())
                        .upsert(&patch)
                        .await
                        .map(|record| {
                            info!(
                                event_name = "webhook.end_of_call.saved",
                                call_id = %record.vapi_call_id,
                                duration_seconds = record.duration_seconds.unwrap_or(-1),
                                "call report merged into store"
                            );
                        })
                }
                CallMode::Human => {
                    let patch = normalize::human_end_of_call_patch(&report, raw_message);
                    SqlHumanCallRepository::new(state.db_pool.clone())
                        .upsert(&patch)
                        .await
                        .map(|record| {
                            info!(
                                event_name = "webhook.end_of_call.saved",
                                call_id = %record.vapi_call_id,
                                duration_seconds = record.duration_seconds.unwrap_or(-1),
                                "human call report merged into store"
                            );
                        })
                }
            };

            match persisted {
                Ok(()) => (StatusCode::OK, Json(json!({ "success": true, "callId": call_id }))),
                Err(storage_error) => {
                    error!(
                        event_name = "webhook.end_of_call.store_failed",
                        call_id = %call_id,
                        error = %storage_error,
                        "failed to persist call report"
                    );
                    internal_error()
                }
            }
        }
        WebhookMessage::StatusUpdate(update) => {
            info!(
                event_name = "webhook.status_update",
                call_id = %update.call.id,
                status = update.status.as_deref().unwrap_or("unknown"),
                "status update received"
            );
            (StatusCode::OK, Json(json!({ "success": true, "status": update.status })))
        }
        WebhookMessage::AssistantRequest(request) => {
            info!(
                event_name = "webhook.assistant_request",
                call_id = %request.call.id,
                "assistant request received"
            );
            let response = normalize::resolve_assistant(&state.vapi);
            match serde_json::to_value(&response) {
                Ok(payload) => (StatusCode::OK, Json(payload)),
                Err(encode_error) => {
                    error!(
                        event_name = "webhook.assistant_request.encode_failed",
                        error = %encode_error,
                        "failed to encode assistant response"
                    );
                    internal_error()
                }
            }
        }
        WebhookMessage::Other => {
            info!(event_name = "webhook.ignored", "unhandled webhook event type acknowledged");
            (StatusCode::OK, Json(json!({ "success": true, "message": "event received" })))
        }
    }
}

fn internal_error() -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "internal server error" })))
}
