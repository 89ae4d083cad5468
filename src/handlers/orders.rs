use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{TicketOrder, TicketPayment};
use crate::services::OrderWithPayment;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::money::format_rupiah;
use crate::utils::response::success;

#[derive(Debug, Serialize)]
pub struct PaymentPage {
    pub order: TicketOrder,
    pub payment: Option<TicketPayment>,
    pub formatted_total: String,
    /// Whether the customer still has something to pay through the gateway.
    pub awaiting_payment: bool,
}

impl From<OrderWithPayment> for PaymentPage {
    fn from(OrderWithPayment { order, payment }: OrderWithPayment) -> Self {
        let awaiting_payment = !order.is_paid() && payment.is_some();
        Self {
            formatted_total: format_rupiah(order.total_price),
            awaiting_payment,
            order,
            payment,
        }
    }
}

pub async fn payment_page(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let page = state.orders.reconcile_from_poll(&code).await?;
    Ok(success(PaymentPage::from(page), "Payment retrieved"))
}

/// Return URL after the hosted invoice page. The webhook may not have
/// arrived yet, so the status is polled before moving on.
pub async fn payment_success(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let page = state.orders.reconcile_from_poll(&code).await?;
    if !page.order.is_paid() {
        info!(order_code = %code, "Returned from gateway before payment was confirmed");
    }
    Ok(Redirect::to(&format!("/ticket-orders/{}/confirmation", page.order.order_code))
        .into_response())
}

pub async fn confirmation(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let details = state.orders.details(&code).await?;
    Ok(success(details, "Order retrieved"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualStatus {
    Paid,
    Expired,
}

#[derive(Debug, Deserialize)]
pub struct ManualUpdateRequest {
    pub status: ManualStatus,
}

/// Development-only status override used to exercise the payment flow
/// without the gateway.
pub async fn manual_update(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(payload): Json<ManualUpdateRequest>,
) -> Result<Response, AppError> {
    if !state.app_env.is_development() {
        return Err(AppError::NotFound("Not found".to_string()));
    }

    let order = state.orders.find_by_code(&code).await?;
    if state.orders.payment_for(&order).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Order {} has no payment to update",
            code
        )));
    }

    warn!(order_code = %code, status = ?payload.status, "Manual payment status override");
    let changed = match payload.status {
        ManualStatus::Paid => state.orders.force_paid(&code).await?,
        ManualStatus::Expired => state.orders.force_expired(&code).await?,
    };

    let message = if changed {
        "Payment status updated"
    } else {
        "Payment status unchanged"
    };
    let order = state.orders.find_by_code(&code).await?;
    Ok(success(order, message))
}
