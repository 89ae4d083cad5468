use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountType::Percentage),
            "fixed" => Ok(DiscountType::Fixed),
            other => Err(format!("unknown discount type '{}'", other)),
        }
    }
}

/// Discount code as maintained by the back office. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: i64,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// `None` means the code applies to every ticket.
    pub beach_ticket_id: Option<i64>,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub min_price: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub is_active: bool,
}

impl PromoCode {
    pub fn is_exhausted(&self) -> bool {
        matches!(self.usage_limit, Some(limit) if self.usage_count >= limit)
    }

    pub fn has_expired(&self, today: NaiveDate) -> bool {
        matches!(self.valid_until, Some(until) if until < today)
    }

    pub fn covers_date(&self, date: NaiveDate) -> bool {
        self.valid_from.map_or(true, |from| date >= from)
            && self.valid_until.map_or(true, |until| date <= until)
    }

    pub fn applies_to_ticket(&self, ticket_id: i64) -> bool {
        self.beach_ticket_id.map_or(true, |scoped| scoped == ticket_id)
    }
}
