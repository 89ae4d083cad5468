use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    BeachTicket, CheckoutSession, CustomerDetails, PromoSnapshot, TicketOrder, TicketPayment,
};
use crate::services::orders::ONLINE_PAYMENT_METHOD;
use crate::services::PromoEvaluation;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::money::format_rupiah;
use crate::utils::response::{created, success};

pub const SESSION_COOKIE: &str = "beach_checkout";

/// Checkout session token from the request cookie, if any.
pub struct SessionToken(pub Option<Uuid>);

#[async_trait]
impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| Uuid::parse_str(value).ok());
        Ok(SessionToken(token))
    }
}

fn session_cookie(token: Uuid) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, token
    ))
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

async fn current_session(state: &AppState, token: Option<Uuid>) -> Option<(Uuid, CheckoutSession)> {
    let token = token?;
    state.sessions.get(token).await.map(|s| (token, s))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SelectTicketRequest {
    pub ticket_id: i64,
    pub visit_date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 100))]
    pub quantity: Option<i32>,
    #[validate(length(max = 1000))]
    pub additional_request: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutView {
    #[serde(flatten)]
    pub session: CheckoutSession,
    pub discount: Decimal,
    pub total: Decimal,
    pub formatted_subtotal: String,
    pub formatted_total: String,
    pub ticket: BeachTicket,
}

impl CheckoutView {
    fn new(session: CheckoutSession, ticket: BeachTicket) -> Self {
        Self {
            discount: session.discount(),
            total: session.total(),
            formatted_subtotal: format_rupiah(session.subtotal),
            formatted_total: format_rupiah(session.total()),
            session,
            ticket,
        }
    }
}

pub async fn select_ticket(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Json(payload): Json<SelectTicketRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let today = Utc::now().date_naive();
    let visit_date = payload.visit_date.unwrap_or(today);
    if visit_date < today {
        return Err(AppError::ValidationError(
            "The visit date cannot be in the past".to_string(),
        ));
    }

    let ticket = state
        .catalog
        .find_ticket(payload.ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", payload.ticket_id)))?;
    if !ticket.is_purchasable() {
        return Err(AppError::ValidationError(format!(
            "Ticket {} is no longer available",
            ticket.name
        )));
    }

    let session = CheckoutSession::select(
        &ticket,
        payload.quantity.unwrap_or(1),
        visit_date,
        payload.additional_request,
    );
    // Only a live session keeps its token; anything else gets a fresh one.
    let known = current_session(&state, token).await.map(|(token, _)| token);
    let token = state.sessions.put(known, session.clone()).await;

    let mut response = success(CheckoutView::new(session, ticket), "Ticket selected");
    response
        .headers_mut()
        .insert(SET_COOKIE, session_cookie(token)?);
    Ok(response)
}

pub async fn show_checkout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<Response, AppError> {
    let (_, session) = current_session(&state, token)
        .await
        .ok_or_else(|| AppError::NotFound("No ticket selected".to_string()))?;
    let ticket = state
        .catalog
        .find_ticket(session.ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", session.ticket_id)))?;

    Ok(success(CheckoutView::new(session, ticket), "Checkout retrieved"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyPromoRequest {
    #[validate(length(min = 1, max = 50))]
    pub promo_code: String,
}

fn promo_failure(message: impl Into<String>) -> Response {
    Json(json!({ "success": false, "message": message.into() })).into_response()
}

pub async fn apply_promo(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Json(payload): Json<ApplyPromoRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let Some((token, mut session)) = current_session(&state, token).await else {
        return Ok(promo_failure("No ticket found in session."));
    };

    let evaluation = state
        .promos
        .evaluate(
            &payload.promo_code,
            session.ticket_id,
            session.subtotal,
            session.visit_date,
            Utc::now().date_naive(),
        )
        .await?;

    let (promo, discount, message) = match evaluation {
        PromoEvaluation::Valid {
            promo,
            discount,
            message,
        } => (promo, discount, message),
        PromoEvaluation::Invalid { message } => return Ok(promo_failure(message)),
    };

    session.apply_promo(PromoSnapshot::capture(&promo, discount));
    let new_total = session.total();
    state.sessions.put(Some(token), session).await;

    Ok(Json(json!({
        "success": true,
        "message": message,
        "discount": discount,
        "new_total": new_total,
        "formatted_discount": format_rupiah(discount),
        "formatted_new_total": format_rupiah(new_total),
    }))
    .into_response())
}

pub async fn remove_promo(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<Response, AppError> {
    let Some((token, mut session)) = current_session(&state, token).await else {
        return Ok(promo_failure("No ticket found in session."));
    };
    let ticket = state
        .catalog
        .find_ticket(session.ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", session.ticket_id)))?;

    session.remove_promo(&ticket);
    let new_total = session.total();
    state.sessions.put(Some(token), session).await;

    Ok(Json(json!({
        "success": true,
        "message": "Promo code removed.",
        "new_total": new_total,
        "formatted_new_total": format_rupiah(new_total),
    }))
    .into_response())
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitOrderRequest {
    #[validate(length(min = 1, max = 255))]
    pub customer_name: String,
    #[validate(email, length(max = 255))]
    pub customer_email: String,
    #[validate(length(min = 1, max = 20))]
    pub customer_phone: String,
    #[validate(length(min = 1))]
    pub payment_method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order_code: String,
    pub total_price: Decimal,
    pub formatted_total: String,
    pub checkout_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PlacedOrder {
    fn new(order: &TicketOrder, payment: Option<&TicketPayment>) -> Self {
        Self {
            order_code: order.order_code.clone(),
            total_price: order.total_price,
            formatted_total: format_rupiah(order.total_price),
            checkout_url: payment.map(|p| p.checkout_url.clone()),
            expires_at: payment.map(|p| p.expired_at),
        }
    }
}

/// Turns the session into an order, then asks the gateway for an invoice.
///
/// The session is cleared as soon as the order exists, so a gateway failure
/// leaves a pending order that the payment page can retry.
pub async fn submit_order(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Json(payload): Json<SubmitOrderRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let (token, session) = current_session(&state, token).await.ok_or_else(|| {
        AppError::ValidationError(
            "Your checkout session has expired, please select a ticket again".to_string(),
        )
    })?;

    let customer = CustomerDetails {
        name: payload.customer_name.trim().to_string(),
        email: payload.customer_email.trim().to_string(),
        phone: Some(payload.customer_phone.trim().to_string()),
    };
    let method = payload
        .payment_method
        .as_deref()
        .unwrap_or(ONLINE_PAYMENT_METHOD);

    let order = state.orders.create_order(&session, customer, method).await?;
    state.sessions.clear(token).await;
    info!(order_code = %order.order_code, "Checkout completed");

    let payment = state.orders.ensure_payment(&order).await?;
    let order = state.orders.find_by_code(&order.order_code).await?;

    Ok(created(
        PlacedOrder::new(&order, payment.as_ref()),
        "Order created successfully",
    ))
}
