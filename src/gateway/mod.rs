//! Contract toward the hosted payment gateway.
//!
//! The gateway mints invoices (payable references with a checkout URL and an
//! expiry) and reports their status. Callbacks are handled in
//! `handlers::webhook`; this module only covers outbound calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

pub mod xendit;

pub use xendit::XenditClient;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("http error: {0}")]
    Http(String),

    #[error("gateway rejected request: status={status} message={message}")]
    Rejected { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Http(e.to_string())
        }
    }
}

/// Invoice status as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Pending,
    Paid,
    Expired,
    Other(String),
}

impl GatewayStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => GatewayStatus::Pending,
            "PAID" | "SETTLED" => GatewayStatus::Paid,
            "EXPIRED" => GatewayStatus::Expired,
            other => GatewayStatus::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceCustomer {
    pub given_names: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    /// Our order code; echoed back in every callback for this invoice.
    pub external_id: String,
    pub amount: Decimal,
    pub description: String,
    pub customer: InvoiceCustomer,
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct Invoice {
    pub id: String,
    pub checkout_url: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, GatewayError>;

    async fn invoice_status(&self, gateway_payment_id: &str) -> Result<GatewayStatus, GatewayError>;
}
