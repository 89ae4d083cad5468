//! Back-office order management. Identity is asserted by the authenticating
//! proxy in front of the service; each handler checks one capability.

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::response::Response;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::models::{
    CustomerDetails, OrderChannel, OrderFilter, PaymentStatus, StaffRole, StaffUser,
};
use crate::services::{authorize, Capability, ManualOrder, StaffContext};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

pub const STAFF_ID_HEADER: &str = "x-staff-id";
pub const STAFF_ROLE_HEADER: &str = "x-staff-role";

#[async_trait]
impl<S> FromRequestParts<S> for StaffContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let id = header(STAFF_ID_HEADER)
            .ok_or_else(|| AppError::AuthError("Staff identity missing".to_string()))?
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Malformed staff id".to_string()))?;
        let role = header(STAFF_ROLE_HEADER)
            .ok_or_else(|| AppError::AuthError("Staff role missing".to_string()))?
            .parse::<StaffRole>()
            .map_err(AppError::AuthError)?;

        Ok(StaffContext::resolve(StaffUser { id, role }))
    }
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub payment_method: Option<String>,
    pub order_type: Option<OrderChannel>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    pub page: Option<u32>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    staff: StaffContext,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Response, AppError> {
    authorize(&staff, Capability::ViewOrders)?;

    let filter = OrderFilter {
        payment_method: query.payment_method,
        order_type: query.order_type,
        date_from: query.date_from,
        date_to: query.date_to,
        search: query.search,
    };
    let page = state
        .orders
        .list_orders(&filter, query.page.unwrap_or(1))
        .await?;
    Ok(success(page, "Orders retrieved"))
}

pub async fn show_order(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    authorize(&staff, Capability::ViewOrders)?;
    let details = state.orders.details(&code).await?;
    Ok(success(details, "Order retrieved"))
}

fn counter_payment_method(method: &str) -> Result<(), ValidationError> {
    match method {
        "cash" | "card" => Ok(()),
        _ => Err(ValidationError::new("payment_method")),
    }
}

fn manual_payment_status(status: &str) -> Result<(), ValidationError> {
    match status {
        "paid" | "pending" => Ok(()),
        _ => Err(ValidationError::new("payment_status")),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ManualOrderRequest {
    pub beach_ticket_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub customer_name: String,
    #[validate(email, length(max = 255))]
    pub customer_email: String,
    #[validate(length(max = 20))]
    pub customer_phone: Option<String>,
    pub visit_date: NaiveDate,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub additional_request: Option<String>,
    #[validate(custom = "counter_payment_method")]
    pub payment_method: String,
    #[validate(custom = "manual_payment_status")]
    pub payment_status: String,
}

pub async fn create_manual_order(
    State(state): State<AppState>,
    staff: StaffContext,
    Json(payload): Json<ManualOrderRequest>,
) -> Result<Response, AppError> {
    authorize(&staff, Capability::CreateManualOrder)?;
    payload.validate()?;

    let payment_status = payload
        .payment_status
        .parse::<PaymentStatus>()
        .map_err(AppError::ValidationError)?;
    let input = ManualOrder {
        beach_ticket_id: payload.beach_ticket_id,
        customer: CustomerDetails {
            name: payload.customer_name.trim().to_string(),
            email: payload.customer_email.trim().to_string(),
            phone: payload
                .customer_phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        },
        visit_date: payload.visit_date,
        quantity: payload.quantity,
        additional_request: payload.additional_request.filter(|r| !r.trim().is_empty()),
        payment_method: payload.payment_method,
        payment_status,
    };

    let order = state.orders.create_manual_order(&staff.user, input).await?;
    Ok(created(order, "Ticket order created successfully"))
}

pub async fn mark_paid(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    authorize(&staff, Capability::MarkOrderPaid)?;

    let changed = state.orders.force_paid(&code).await?;
    let order = state.orders.find_by_code(&code).await?;
    let message = if changed {
        "Order marked as paid"
    } else {
        "Order is already paid"
    };
    Ok(success(order, message))
}

pub async fn delete_order(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    authorize(&staff, Capability::DeleteOrder)?;

    let order = state.orders.delete_order(&staff.user, &code).await?;
    Ok(empty_success(format!("Order {} deleted", order.order_code)))
}
