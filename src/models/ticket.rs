use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BeachTicket {
    pub id: i64,
    pub name: String,
    pub beach_name: String,
    pub ticket_type: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BeachTicket {
    /// Price of `quantity` tickets before any discount.
    pub fn price_for(&self, quantity: i32) -> Decimal {
        self.price * Decimal::from(quantity)
    }

    pub fn is_purchasable(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketBenefit {
    pub id: i64,
    pub beach_ticket_id: i64,
    pub benefit_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketWithBenefits {
    #[serde(flatten)]
    pub ticket: BeachTicket,
    pub benefits: Vec<TicketBenefit>,
}
