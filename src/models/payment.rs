use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::PaymentStatus;

/// A payable reference minted by the gateway for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketPayment {
    pub id: Uuid,
    pub ticket_order_id: Uuid,
    /// Correlates gateway callbacks with this record.
    pub external_id: String,
    /// Gateway-assigned invoice id, once known.
    pub payment_id: Option<String>,
    pub checkout_url: String,
    pub amount: Decimal,
    pub payment_status: PaymentStatus,
    pub expired_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketPayment {
    /// A pending payment whose expiry has passed.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.payment_status == PaymentStatus::Pending && self.expired_at <= now
    }

    /// Whether the customer needs a fresh payable reference instead of this one.
    pub fn needs_replacement(&self, now: DateTime<Utc>) -> bool {
        self.payment_status == PaymentStatus::Expired || self.is_stale(now)
    }
}

/// Gateway data for a payment about to be stored.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub external_id: String,
    pub payment_id: Option<String>,
    pub checkout_url: String,
    pub amount: Decimal,
    pub expired_at: DateTime<Utc>,
}

impl NewPayment {
    pub fn into_payment(self, ticket_order_id: Uuid, now: DateTime<Utc>) -> TicketPayment {
        TicketPayment {
            id: Uuid::new_v4(),
            ticket_order_id,
            external_id: self.external_id,
            payment_id: self.payment_id,
            checkout_url: self.checkout_url,
            amount: self.amount,
            payment_status: PaymentStatus::Pending,
            expired_at: self.expired_at,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn payment(status: PaymentStatus, expires_in: Duration) -> TicketPayment {
        NewPayment {
            external_id: "TIX-ABC1234".to_string(),
            payment_id: Some("inv_1".to_string()),
            checkout_url: "https://checkout.example/inv_1".to_string(),
            amount: Decimal::from(10_000),
            expired_at: Utc::now() + expires_in,
        }
        .into_payment(Uuid::new_v4(), Utc::now())
        .with_status(status)
    }

    impl TicketPayment {
        fn with_status(mut self, status: PaymentStatus) -> Self {
            self.payment_status = status;
            self
        }
    }

    #[test]
    fn test_pending_payment_past_expiry_is_stale() {
        let now = Utc::now();
        assert!(payment(PaymentStatus::Pending, Duration::minutes(-1)).is_stale(now));
        assert!(!payment(PaymentStatus::Pending, Duration::hours(1)).is_stale(now));
        // paid payments never go stale
        assert!(!payment(PaymentStatus::Paid, Duration::minutes(-1)).is_stale(now));
    }

    #[test]
    fn test_expired_payment_needs_replacement() {
        let now = Utc::now();
        assert!(payment(PaymentStatus::Expired, Duration::hours(1)).needs_replacement(now));
        assert!(!payment(PaymentStatus::Paid, Duration::hours(-1)).needs_replacement(now));
    }
}
