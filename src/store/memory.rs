use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OrderStore, PaymentInstall, PromoRepository, StoreError, TicketCatalog};
use crate::models::{
    BeachTicket, NewPayment, OrderDraft, OrderFilter, PaymentStatus, PromoCode, TicketBenefit,
    TicketOrder, TicketPayment,
};

#[derive(Default)]
struct Tables {
    tickets: HashMap<i64, BeachTicket>,
    benefits: Vec<TicketBenefit>,
    promos: HashMap<i64, PromoCode>,
    orders: HashMap<Uuid, TicketOrder>,
    /// Keyed by order id; an order holds at most one payment.
    payments: HashMap<Uuid, TicketPayment>,
}

/// Process-local store with the same guarded transitions as [`super::PgStore`].
///
/// Every method takes the write lock for its whole check-then-update, which
/// stands in for the row locks and conditional updates of the SQL store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_ticket(&self, ticket: BeachTicket) {
        self.tables.write().await.tickets.insert(ticket.id, ticket);
    }

    pub async fn add_benefit(&self, benefit: TicketBenefit) {
        self.tables.write().await.benefits.push(benefit);
    }

    pub async fn add_promo(&self, promo: PromoCode) {
        self.tables.write().await.promos.insert(promo.id, promo);
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl TicketCatalog for MemoryStore {
    async fn find_ticket(&self, id: i64) -> Result<Option<BeachTicket>, StoreError> {
        Ok(self.tables.read().await.tickets.get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<BeachTicket>, StoreError> {
        let tables = self.tables.read().await;
        let mut tickets: Vec<BeachTicket> =
            tables.tickets.values().filter(|t| t.active).cloned().collect();
        tickets.sort_by(|a, b| {
            (&a.beach_name, &a.ticket_type, &a.name).cmp(&(&b.beach_name, &b.ticket_type, &b.name))
        });
        Ok(tickets)
    }

    async fn benefits_for(&self, ticket_id: i64) -> Result<Vec<TicketBenefit>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .benefits
            .iter()
            .filter(|b| b.beach_ticket_id == ticket_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PromoRepository for MemoryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .promos
            .values()
            .find(|p| p.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PromoCode>, StoreError> {
        Ok(self.tables.read().await.promos.get(&id).cloned())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn order_code_exists(&self, code: &str) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().any(|o| o.order_code == code))
    }

    async fn insert_order(
        &self,
        order_code: &str,
        draft: OrderDraft,
    ) -> Result<TicketOrder, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.orders.values().any(|o| o.order_code == order_code) {
            return Err(StoreError::DuplicateOrderCode(order_code.to_string()));
        }
        let order = draft.into_order(order_code.to_string(), Utc::now());
        tables.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<TicketOrder>, StoreError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn find_order_by_code(&self, code: &str) -> Result<Option<TicketOrder>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().find(|o| o.order_code == code).cloned())
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TicketOrder>, i64), StoreError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&TicketOrder> =
            tables.orders.values().filter(|o| filter.matches(o)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn find_payment_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<TicketPayment>, StoreError> {
        Ok(self.tables.read().await.payments.get(&order_id).cloned())
    }

    async fn find_payment_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<TicketPayment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .find(|p| p.external_id == external_id)
            .cloned())
    }

    async fn install_payment(
        &self,
        order_id: Uuid,
        replaces: Option<Uuid>,
        payment: NewPayment,
    ) -> Result<PaymentInstall, StoreError> {
        let mut tables = self.tables.write().await;
        let current = tables.payments.get(&order_id).cloned();
        let now = Utc::now();

        let Some(order) = tables.orders.get_mut(&order_id) else {
            return Ok(PaymentInstall::Kept(current));
        };
        if order.is_paid() || current.as_ref().map(|p| p.id) != replaces {
            return Ok(PaymentInstall::Kept(current));
        }
        if order.payment_status == PaymentStatus::Expired {
            order.payment_status = PaymentStatus::Pending;
            order.updated_at = now;
        }

        let payment = payment.into_payment(order_id, now);
        tables.payments.insert(order_id, payment.clone());
        Ok(PaymentInstall::Installed(payment))
    }

    async fn mark_paid(
        &self,
        order_id: Uuid,
        gateway_payment_id: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        let transitioned = match tables.orders.get_mut(&order_id) {
            Some(order) if !order.is_paid() => {
                order.payment_status = PaymentStatus::Paid;
                order.paid_at = Some(paid_at);
                order.updated_at = paid_at;
                true
            }
            _ => false,
        };

        if let Some(payment) = tables.payments.get_mut(&order_id) {
            if payment.payment_status != PaymentStatus::Paid {
                payment.payment_status = PaymentStatus::Paid;
                payment.paid_at = Some(paid_at);
                payment.updated_at = paid_at;
                if let Some(id) = gateway_payment_id {
                    payment.payment_id = Some(id.to_string());
                }
            }
        }

        Ok(transitioned)
    }

    async fn mark_expired(
        &self,
        order_id: Uuid,
        expire_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let transitioned = match tables.orders.get_mut(&order_id) {
            Some(order) if order.payment_status == PaymentStatus::Pending => {
                order.payment_status = PaymentStatus::Expired;
                order.updated_at = now;
                true
            }
            _ => false,
        };

        if let Some(payment) = tables.payments.get_mut(&order_id) {
            if payment.payment_status != PaymentStatus::Paid {
                payment.payment_status = PaymentStatus::Expired;
                if let Some(at) = expire_at {
                    payment.expired_at = at;
                }
                payment.updated_at = now;
            }
        }

        Ok(transitioned)
    }

    async fn record_gateway_payment_id(
        &self,
        payment_id: Uuid,
        gateway_payment_id: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(payment) = tables.payments.values_mut().find(|p| p.id == payment_id) {
            payment.payment_id = Some(gateway_payment_id.to_string());
            payment.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_order(&self, order_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        tables.payments.remove(&order_id);
        Ok(tables.orders.remove(&order_id).is_some())
    }
}
