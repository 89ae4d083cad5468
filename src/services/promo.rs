use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use crate::models::{DiscountType, PromoCode};
use crate::store::{PromoRepository, StoreError};
use crate::utils::money::{format_rupiah, to_cents};

pub const INVALID_CODE_MESSAGE: &str = "Invalid promo code.";
pub const APPLIED_MESSAGE: &str = "Promo code applied successfully.";

/// Outcome of checking a code against the current selection.
#[derive(Debug, Clone, PartialEq)]
pub enum PromoEvaluation {
    Valid {
        promo: PromoCode,
        discount: Decimal,
        message: String,
    },
    Invalid {
        message: String,
    },
}

impl PromoEvaluation {
    fn invalid(message: impl Into<String>) -> Self {
        PromoEvaluation::Invalid {
            message: message.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, PromoEvaluation::Valid { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            PromoEvaluation::Valid { message, .. } | PromoEvaluation::Invalid { message } => {
                message
            }
        }
    }

    pub fn discount(&self) -> Decimal {
        match self {
            PromoEvaluation::Valid { discount, .. } => *discount,
            PromoEvaluation::Invalid { .. } => Decimal::ZERO,
        }
    }
}

/// Validates discount codes and prices them. Never mutates a code.
#[derive(Clone)]
pub struct PromoEvaluator {
    promos: Arc<dyn PromoRepository>,
}

impl PromoEvaluator {
    pub fn new(promos: Arc<dyn PromoRepository>) -> Self {
        Self { promos }
    }

    pub async fn evaluate(
        &self,
        code: &str,
        ticket_id: i64,
        current_total: Decimal,
        visit_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<PromoEvaluation, StoreError> {
        let promo = self.promos.find_by_code(code.trim()).await?;
        Ok(check(promo, ticket_id, current_total, visit_date, today))
    }
}

/// Pure validation of a looked-up code.
///
/// Unknown and disabled codes share one generic message so callers cannot
/// probe which codes exist.
pub fn check(
    promo: Option<PromoCode>,
    ticket_id: i64,
    current_total: Decimal,
    visit_date: NaiveDate,
    today: NaiveDate,
) -> PromoEvaluation {
    let promo = match promo {
        Some(p) if p.is_active => p,
        _ => return PromoEvaluation::invalid(INVALID_CODE_MESSAGE),
    };

    if promo.has_expired(today) {
        return PromoEvaluation::invalid("This promo code has expired.");
    }
    if promo.is_exhausted() {
        return PromoEvaluation::invalid("This promo code has reached its usage limit.");
    }
    if !promo.applies_to_ticket(ticket_id) {
        return PromoEvaluation::invalid("This promo code is not valid for the selected ticket.");
    }
    if !promo.covers_date(visit_date) {
        return PromoEvaluation::invalid(
            "This promo code is not valid for the selected visit date.",
        );
    }
    if let Some(min) = promo.min_price {
        if current_total < min {
            return PromoEvaluation::invalid(format!(
                "A minimum purchase of {} is required for this promo code.",
                format_rupiah(min)
            ));
        }
    }

    let discount = discount_for(promo.discount_type, promo.discount_value, current_total);
    debug!(code = %promo.code, %discount, "Promo code accepted");

    PromoEvaluation::Valid {
        promo,
        discount,
        message: APPLIED_MESSAGE.to_string(),
    }
}

/// Discount at stored precision, never more than `total`. Whole-rupiah
/// rounding happens only when the amount is shown or invoiced.
pub fn discount_for(kind: DiscountType, value: Decimal, total: Decimal) -> Decimal {
    let total = total.max(Decimal::ZERO);
    let raw = match kind {
        DiscountType::Percentage => to_cents(total * value / Decimal::ONE_HUNDRED),
        DiscountType::Fixed => value,
    };
    raw.max(Decimal::ZERO).min(total)
}
