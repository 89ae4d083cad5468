use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::models::TicketOrder;

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Fired once when an order moves to paid.
#[async_trait]
pub trait ConfirmationNotifier: Send + Sync {
    async fn order_paid(&self, order: &TicketOrder) -> Result<(), NotifyError>;
}

/// Records the confirmation trigger in the log. Mail delivery lives elsewhere.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl ConfirmationNotifier for LogNotifier {
    async fn order_paid(&self, order: &TicketOrder) -> Result<(), NotifyError> {
        info!(
            order_code = %order.order_code,
            email = %order.customer_email,
            visit_date = %order.visit_date,
            quantity = order.quantity,
            "Ticket order confirmation queued"
        );
        Ok(())
    }
}
