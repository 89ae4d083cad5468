use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::promo::{DiscountType, PromoCode};
use super::ticket::BeachTicket;

/// Discount captured when a promo code was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoSnapshot {
    pub promo_code_id: i64,
    pub code: String,
    pub discount: Decimal,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
}

impl PromoSnapshot {
    pub fn capture(promo: &PromoCode, discount: Decimal) -> Self {
        Self {
            promo_code_id: promo.id,
            code: promo.code.clone(),
            discount,
            discount_type: promo.discount_type,
            discount_value: promo.discount_value,
        }
    }
}

/// The single in-progress ticket selection of one browsing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub ticket_id: i64,
    pub visit_date: NaiveDate,
    pub quantity: i32,
    pub additional_request: Option<String>,
    pub subtotal: Decimal,
    pub promo: Option<PromoSnapshot>,
}

impl CheckoutSession {
    pub fn select(
        ticket: &BeachTicket,
        quantity: i32,
        visit_date: NaiveDate,
        additional_request: Option<String>,
    ) -> Self {
        Self {
            ticket_id: ticket.id,
            visit_date,
            quantity,
            additional_request: additional_request.filter(|r| !r.trim().is_empty()),
            subtotal: ticket.price_for(quantity),
            promo: None,
        }
    }

    pub fn discount(&self) -> Decimal {
        self.promo
            .as_ref()
            .map_or(Decimal::ZERO, |p| p.discount.min(self.subtotal))
    }

    pub fn total(&self) -> Decimal {
        self.subtotal - self.discount()
    }

    pub fn apply_promo(&mut self, snapshot: PromoSnapshot) {
        self.promo = Some(snapshot);
    }

    /// Drops the discount and re-prices from the ticket's unit price.
    pub fn remove_promo(&mut self, ticket: &BeachTicket) {
        self.promo = None;
        self.subtotal = ticket.price_for(self.quantity);
    }
}
