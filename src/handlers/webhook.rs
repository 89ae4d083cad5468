use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use constant_time_eq::constant_time_eq;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::services::WebhookNotice;
use crate::state::AppState;
use crate::utils::error::AppError;

pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

/// Invoice callback body. Only the fields used for reconciliation are read.
#[derive(Debug, Deserialize)]
pub struct InvoiceCallback {
    pub external_id: String,
    pub status: String,
    /// Gateway invoice id.
    pub id: Option<String>,
}

fn token_matches(headers: &HeaderMap, expected: &str) -> bool {
    let presented = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    // An unset token rejects everything.
    !expected.is_empty() && constant_time_eq(presented.as_bytes(), expected.as_bytes())
}

/// Gateway invoice callback.
///
/// The token is checked before the body is even parsed. Duplicate and
/// out-of-order deliveries are absorbed by the order service and still
/// answered with success.
pub async fn xendit_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    if !token_matches(&headers, &state.callback_token) {
        warn!(
            token_present = headers.contains_key(CALLBACK_TOKEN_HEADER),
            "Rejected invoice webhook with invalid callback token"
        );
        return Err(AppError::AuthError("Invalid callback token".to_string()));
    }

    let callback: InvoiceCallback = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Malformed callback body: {}", e)))?;

    state
        .orders
        .reconcile_from_webhook(WebhookNotice {
            external_id: callback.external_id,
            status: callback.status,
            gateway_payment_id: callback.id,
        })
        .await?;

    Ok(Json(json!({ "success": true })).into_response())
}
