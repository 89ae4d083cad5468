use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{admin, catalog, checkout, health_check, orders, webhook};
use crate::state::AppState;

pub fn create_routes(state: AppState, cors_allowed_origins: &str) -> Router {
    let app_env = state.app_env;

    let storefront = Router::new()
        .route("/beach-tickets", get(catalog::list_tickets))
        .route("/beach-tickets/:id", get(catalog::show_ticket))
        .route(
            "/checkout",
            get(checkout::show_checkout).post(checkout::select_ticket),
        )
        .route(
            "/checkout/promo",
            post(checkout::apply_promo).delete(checkout::remove_promo),
        )
        .route("/ticket-orders", post(checkout::submit_order))
        .route("/ticket-orders/:code/payment", get(orders::payment_page))
        .route(
            "/ticket-orders/:code/payment/success",
            get(orders::payment_success),
        )
        .route(
            "/ticket-orders/:code/confirmation",
            get(orders::confirmation),
        )
        .route(
            "/ticket-orders/:code/manual-update",
            post(orders::manual_update),
        );

    let backoffice = Router::new()
        .route(
            "/orders",
            get(admin::list_orders).post(admin::create_manual_order),
        )
        .route(
            "/orders/:code",
            get(admin::show_order).delete(admin::delete_order),
        )
        .route("/orders/:code/mark-paid", post(admin::mark_paid));

    Router::new()
        .route("/health", get(health_check))
        .merge(storefront)
        .nest("/admin", backoffice)
        .route("/webhooks/xendit/invoice", post(webhook::xendit_invoice))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(app_env))
        .layer(create_cors_layer(cors_allowed_origins))
}
