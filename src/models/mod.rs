pub mod checkout;
pub mod order;
pub mod payment;
pub mod promo;
pub mod ticket;
pub mod user;

pub use checkout::{CheckoutSession, PromoSnapshot};
pub use order::{
    CustomerDetails, OrderChannel, OrderDraft, OrderFilter, OrderPage, OrderPricing,
    PaymentStatus, TicketOrder,
};
pub use payment::{NewPayment, TicketPayment};
pub use promo::{DiscountType, PromoCode};
pub use ticket::{BeachTicket, TicketBenefit, TicketWithBenefits};
pub use user::{StaffRole, StaffUser};
