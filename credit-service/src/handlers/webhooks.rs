use crate::ledger::WebhookOutcome;
use crate::services::paystack::SIGNATURE_HEADER;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use service_core::error::AppError;

/// Paystack event receiver.
///
/// Authentic events are acknowledged with 200 even when the payment is
/// rejected, so the gateway stops redelivering them. Transient failures
/// return an error status and are redelivered.
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .ledger
        .handle_gateway_webhook(&body, signature)
        .await?;

    let status = match &outcome {
        WebhookOutcome::Processed(_) => "processed",
        WebhookOutcome::Ignored(reason) => {
            tracing::debug!(reason, "Webhook ignored");
            "ignored"
        }
        WebhookOutcome::Rejected(reason) => {
            tracing::warn!(reason = %reason, "Webhook payment rejected");
            "rejected"
        }
    };

    Ok((StatusCode::OK, Json(json!({ "status": status }))))
}
