//! Persistence seams for the catalog, promo codes and orders.
//!
//! The order store is the single source of truth shared by browser requests
//! and gateway callbacks, so every status transition it exposes is a guarded
//! conditional update rather than a read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    BeachTicket, NewPayment, OrderDraft, OrderFilter, PromoCode, TicketBenefit, TicketOrder,
    TicketPayment,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order code {0} is already taken")]
    DuplicateOrderCode(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait TicketCatalog: Send + Sync {
    async fn find_ticket(&self, id: i64) -> Result<Option<BeachTicket>, StoreError>;

    /// Active tickets ordered by beach, type and name.
    async fn list_active(&self) -> Result<Vec<BeachTicket>, StoreError>;

    async fn benefits_for(&self, ticket_id: i64) -> Result<Vec<TicketBenefit>, StoreError>;
}

#[async_trait]
pub trait PromoRepository: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<PromoCode>, StoreError>;
}

/// Result of trying to attach a fresh payment to an order.
#[derive(Debug, Clone)]
pub enum PaymentInstall {
    /// The new payment is now the order's payable reference.
    Installed(TicketPayment),
    /// Another request changed the order first; this is what it holds now.
    Kept(Option<TicketPayment>),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn order_code_exists(&self, code: &str) -> Result<bool, StoreError>;

    /// Fails with [`StoreError::DuplicateOrderCode`] when the code is taken.
    async fn insert_order(
        &self,
        order_code: &str,
        draft: OrderDraft,
    ) -> Result<TicketOrder, StoreError>;

    async fn find_order(&self, id: Uuid) -> Result<Option<TicketOrder>, StoreError>;

    async fn find_order_by_code(&self, code: &str) -> Result<Option<TicketOrder>, StoreError>;

    /// Matching orders, newest first, plus the total number of matches.
    async fn list_orders(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TicketOrder>, i64), StoreError>;

    async fn find_payment_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<TicketPayment>, StoreError>;

    async fn find_payment_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<TicketPayment>, StoreError>;

    /// Attaches `payment` to the order if the order is unpaid and its current
    /// payment id still equals `replaces`. An expired order returns to pending.
    async fn install_payment(
        &self,
        order_id: Uuid,
        replaces: Option<Uuid>,
        payment: NewPayment,
    ) -> Result<PaymentInstall, StoreError>;

    /// Sets the order (and its payment, if any) to paid unless it already is.
    ///
    /// Returns `true` only for the caller that performed the transition.
    async fn mark_paid(
        &self,
        order_id: Uuid,
        gateway_payment_id: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Expires an unpaid order and its payment, optionally moving the
    /// payment's expiry to `expire_at`. Paid orders are left alone.
    async fn mark_expired(
        &self,
        order_id: Uuid,
        expire_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    async fn record_gateway_payment_id(
        &self,
        payment_id: Uuid,
        gateway_payment_id: &str,
    ) -> Result<(), StoreError>;

    /// Removes the order together with its payment.
    async fn delete_order(&self, order_id: Uuid) -> Result<bool, StoreError>;
}
