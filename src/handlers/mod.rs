use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod admin;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod webhook;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "beach-tickets",
    };

    success(payload, "Health check successful")
}
