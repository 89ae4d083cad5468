use std::sync::Arc;

use crate::config::AppEnv;
use crate::services::{CheckoutSessions, OrderService, PromoEvaluator};
use crate::store::TicketCatalog;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub promos: PromoEvaluator,
    pub catalog: Arc<dyn TicketCatalog>,
    pub sessions: CheckoutSessions,
    pub app_env: AppEnv,
    /// Expected value of the gateway's `X-Callback-Token` header.
    pub callback_token: Arc<str>,
}
