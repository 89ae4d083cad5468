pub mod access;
pub mod notifier;
pub mod order_code;
pub mod orders;
pub mod promo;
pub mod session;

pub use access::{authorize, Capability, StaffContext};
pub use notifier::{ConfirmationNotifier, LogNotifier, NotifyError};
pub use order_code::OrderCodeGenerator;
pub use orders::{
    ManualOrder, OrderDetails, OrderService, OrderWithPayment, WebhookNotice, WebhookOutcome,
};
pub use promo::{PromoEvaluation, PromoEvaluator};
pub use session::CheckoutSessions;
