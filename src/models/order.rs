use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Shared by orders and their payment records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "expired" => Ok(PaymentStatus::Expired),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

/// Subtotal, discount and total of an order.
///
/// The discount is clamped into `0..=subtotal` so the total can never go
/// negative and always equals `subtotal - discount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderPricing {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl OrderPricing {
    pub fn new(subtotal: Decimal, discount: Decimal) -> Self {
        let subtotal = subtotal.max(Decimal::ZERO);
        let discount = discount.max(Decimal::ZERO).min(subtotal);
        Self {
            subtotal,
            discount,
            total: subtotal - discount,
        }
    }

    pub fn undiscounted(subtotal: Decimal) -> Self {
        Self::new(subtotal, Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketOrder {
    pub id: Uuid,
    pub order_code: String,
    pub beach_ticket_id: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub visit_date: NaiveDate,
    pub quantity: i32,
    pub additional_request: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total_price: Decimal,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_offline_order: bool,
    pub cashier_id: Option<i64>,
    pub promo_code_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketOrder {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Whether an order came through the storefront or was entered by staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderChannel {
    Online,
    Offline,
}

/// Back-office listing filters. Unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub payment_method: Option<String>,
    pub order_type: Option<OrderChannel>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Substring of the order code or the customer's name, e-mail or phone.
    pub search: Option<String>,
}

impl OrderFilter {
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, order: &TicketOrder) -> bool {
        if let Some(method) = self.payment_method.as_deref().filter(|m| !m.is_empty()) {
            if order.payment_method != method {
                return false;
            }
        }
        match self.order_type {
            Some(OrderChannel::Offline) if !order.is_offline_order => return false,
            Some(OrderChannel::Online) if order.is_offline_order => return false,
            _ => {}
        }
        if self.date_from.is_some_and(|from| order.visit_date < from)
            || self.date_to.is_some_and(|to| order.visit_date > to)
        {
            return false;
        }
        match self.search_term() {
            Some(term) => {
                let term = term.to_lowercase();
                [
                    Some(order.order_code.as_str()),
                    Some(order.customer_name.as_str()),
                    Some(order.customer_email.as_str()),
                    order.customer_phone.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

/// One page of a back-office listing, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<TicketOrder>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

/// Customer contact details captured at checkout or at the counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Everything needed to persist an order except its code and id.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub beach_ticket_id: i64,
    pub customer: CustomerDetails,
    pub visit_date: NaiveDate,
    pub quantity: i32,
    pub additional_request: Option<String>,
    pub pricing: OrderPricing,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub is_offline_order: bool,
    pub cashier_id: Option<i64>,
    pub promo_code_id: Option<i64>,
}

impl OrderDraft {
    /// Materialises the draft under `order_code`.
    ///
    /// `paid_at` is stamped if and only if the draft is already paid.
    pub fn into_order(self, order_code: String, now: DateTime<Utc>) -> TicketOrder {
        TicketOrder {
            id: Uuid::new_v4(),
            order_code,
            beach_ticket_id: self.beach_ticket_id,
            customer_name: self.customer.name,
            customer_email: self.customer.email,
            customer_phone: self.customer.phone,
            visit_date: self.visit_date,
            quantity: self.quantity,
            additional_request: self.additional_request,
            subtotal: self.pricing.subtotal,
            discount: self.pricing.discount,
            total_price: self.pricing.total,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            paid_at: (self.payment_status == PaymentStatus::Paid).then_some(now),
            is_offline_order: self.is_offline_order,
            cashier_id: self.cashier_id,
            promo_code_id: self.promo_code_id,
            created_at: now,
            updated_at: now,
        }
    }
}
