//! Order lifecycle: creation, payable references, reconciliation with the
//! gateway, staff overrides and deletion.
//!
//! Every transition into `paid` goes through [`OrderService::settle`], which
//! relies on the store's conditional update so that at most one caller
//! observes the transition and fires the confirmation.

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::gateway::{GatewayStatus, InvoiceCustomer, InvoiceRequest, PaymentGateway};
use crate::models::{
    BeachTicket, CheckoutSession, CustomerDetails, NewPayment, OrderDraft, OrderFilter, OrderPage,
    OrderPricing, PaymentStatus, PromoCode, StaffUser, TicketBenefit, TicketOrder, TicketPayment,
};
use crate::services::notifier::ConfirmationNotifier;
use crate::services::order_code::OrderCodeGenerator;
use crate::store::{OrderStore, PaymentInstall, PromoRepository, StoreError, TicketCatalog};
use crate::utils::error::AppError;

const MAX_INSERT_ATTEMPTS: usize = 3;

pub const ORDERS_PER_PAGE: u32 = 25;

/// Payment method recorded for orders paid through the hosted invoice page.
pub const ONLINE_PAYMENT_METHOD: &str = "xendit";

/// An order with whatever payable reference it currently holds.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithPayment {
    pub order: TicketOrder,
    pub payment: Option<TicketPayment>,
}

/// Everything the confirmation and back-office views show about an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: TicketOrder,
    pub ticket: Option<BeachTicket>,
    pub benefits: Vec<TicketBenefit>,
    pub promo: Option<PromoCode>,
    pub payment: Option<TicketPayment>,
}

/// A status callback from the gateway, already authenticated.
#[derive(Debug, Clone)]
pub struct WebhookNotice {
    pub external_id: String,
    pub status: String,
    pub gateway_payment_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    MarkedPaid,
    AlreadyPaid,
    MarkedExpired,
    /// Non-terminal status; at most the gateway payment id was stored.
    Recorded,
    /// The callback refers to an invoice that has since been replaced.
    Superseded,
}

/// Counter or phone sale entered by staff.
#[derive(Debug, Clone)]
pub struct ManualOrder {
    pub beach_ticket_id: i64,
    pub customer: CustomerDetails,
    pub visit_date: NaiveDate,
    pub quantity: i32,
    pub additional_request: Option<String>,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn TicketCatalog>,
    promos: Arc<dyn PromoRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn ConfirmationNotifier>,
    codes: OrderCodeGenerator,
    app_url: String,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn TicketCatalog>,
        promos: Arc<dyn PromoRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn ConfirmationNotifier>,
        app_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            catalog,
            promos,
            gateway,
            notifier,
            codes: OrderCodeGenerator::new(),
            app_url: app_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_code_generator(mut self, codes: OrderCodeGenerator) -> Self {
        self.codes = codes;
        self
    }

    /// Persists the checkout selection as a pending order.
    ///
    /// The discount captured in the session is written onto the order
    /// together with the promo reference.
    #[instrument(skip_all, fields(ticket_id = session.ticket_id, quantity = session.quantity))]
    pub async fn create_order(
        &self,
        session: &CheckoutSession,
        customer: CustomerDetails,
        payment_method: &str,
    ) -> Result<TicketOrder, AppError> {
        if session.quantity < 1 {
            return Err(AppError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let ticket = self.purchasable_ticket(session.ticket_id).await?;

        let draft = OrderDraft {
            beach_ticket_id: ticket.id,
            customer,
            visit_date: session.visit_date,
            quantity: session.quantity,
            additional_request: session.additional_request.clone(),
            pricing: OrderPricing::new(session.subtotal, session.discount()),
            payment_method: payment_method.to_string(),
            payment_status: PaymentStatus::Pending,
            is_offline_order: false,
            cashier_id: None,
            promo_code_id: session.promo.as_ref().map(|p| p.promo_code_id),
        };

        let order = self.insert_with_fresh_code(draft).await?;
        info!(
            order_code = %order.order_code,
            total = %order.total_price,
            discount = %order.discount,
            "Ticket order created"
        );
        Ok(order)
    }

    /// Records a staff-entered order. No invoice is minted and a paid
    /// manual order does not fire the confirmation.
    #[instrument(skip(self, input), fields(staff_id = staff.id, ticket_id = input.beach_ticket_id))]
    pub async fn create_manual_order(
        &self,
        staff: &StaffUser,
        input: ManualOrder,
    ) -> Result<TicketOrder, AppError> {
        if input.quantity < 1 {
            return Err(AppError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        if input.payment_status == PaymentStatus::Expired {
            return Err(AppError::ValidationError(
                "Manual orders are either paid or pending".to_string(),
            ));
        }
        let ticket = self.purchasable_ticket(input.beach_ticket_id).await?;

        let draft = OrderDraft {
            beach_ticket_id: ticket.id,
            customer: input.customer,
            visit_date: input.visit_date,
            quantity: input.quantity,
            additional_request: input.additional_request,
            pricing: OrderPricing::undiscounted(ticket.price_for(input.quantity)),
            payment_method: input.payment_method,
            payment_status: input.payment_status,
            is_offline_order: true,
            cashier_id: Some(staff.id),
            promo_code_id: None,
        };

        let order = self.insert_with_fresh_code(draft).await?;
        info!(
            order_code = %order.order_code,
            status = %order.payment_status,
            "Manual ticket order created"
        );
        Ok(order)
    }

    async fn purchasable_ticket(&self, ticket_id: i64) -> Result<BeachTicket, AppError> {
        let ticket = self
            .catalog
            .find_ticket(ticket_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", ticket_id)))?;
        if !ticket.is_purchasable() {
            return Err(AppError::ValidationError(format!(
                "Ticket {} is no longer available",
                ticket.name
            )));
        }
        Ok(ticket)
    }

    async fn insert_with_fresh_code(&self, draft: OrderDraft) -> Result<TicketOrder, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let code = self.codes.generate(self.store.as_ref()).await?;
            match self.store.insert_order(&code, draft.clone()).await {
                Ok(order) => return Ok(order),
                Err(StoreError::DuplicateOrderCode(code)) if attempt < MAX_INSERT_ATTEMPTS => {
                    warn!(attempt, code = %code, "Order code taken at insert, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn find_by_code(&self, code: &str) -> Result<TicketOrder, AppError> {
        self.store
            .find_order_by_code(code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", code)))
    }

    /// Back-office listing; `page` is 1-based.
    pub async fn list_orders(&self, filter: &OrderFilter, page: u32) -> Result<OrderPage, AppError> {
        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(ORDERS_PER_PAGE);
        let (orders, total) = self
            .store
            .list_orders(filter, i64::from(ORDERS_PER_PAGE), offset)
            .await?;
        Ok(OrderPage {
            orders,
            total,
            page,
            per_page: ORDERS_PER_PAGE,
        })
    }

    pub async fn payment_for(&self, order: &TicketOrder) -> Result<Option<TicketPayment>, AppError> {
        Ok(self.store.find_payment_for_order(order.id).await?)
    }

    async fn load(&self, code: &str) -> Result<OrderWithPayment, AppError> {
        let order = self.find_by_code(code).await?;
        let payment = self.payment_for(&order).await?;
        Ok(OrderWithPayment { order, payment })
    }

    pub async fn details(&self, code: &str) -> Result<OrderDetails, AppError> {
        let OrderWithPayment { order, payment } = self.load(code).await?;
        let ticket = self.catalog.find_ticket(order.beach_ticket_id).await?;
        let benefits = self.catalog.benefits_for(order.beach_ticket_id).await?;
        let promo = match order.promo_code_id {
            Some(id) => self.promos.find_by_id(id).await?,
            None => None,
        };
        Ok(OrderDetails {
            order,
            ticket,
            benefits,
            promo,
            payment,
        })
    }

    /// Returns a usable payable reference for `order`, minting one only if
    /// there is none or the current one has lapsed.
    ///
    /// Paid and offline orders are returned with whatever they hold. A
    /// zero-total order is settled directly since there is nothing to pay.
    #[instrument(skip(self, order), fields(order_code = %order.order_code))]
    pub async fn ensure_payment(
        &self,
        order: &TicketOrder,
    ) -> Result<Option<TicketPayment>, AppError> {
        let current = self.store.find_payment_for_order(order.id).await?;
        if order.is_paid() || order.is_offline_order {
            return Ok(current);
        }
        if let Some(payment) = &current {
            if !payment.needs_replacement(Utc::now()) {
                debug!(payment_id = %payment.id, "Reusing pending payment");
                return Ok(current);
            }
        }
        if order.total_price.is_zero() {
            self.settle(order.id, None).await?;
            return Ok(current);
        }

        let ticket = self.catalog.find_ticket(order.beach_ticket_id).await?;
        let request = self.invoice_request(order, ticket.as_ref());
        let invoice = self
            .gateway
            .create_invoice(&request)
            .await
            .map_err(|source| AppError::PaymentUnavailable {
                order_code: order.order_code.clone(),
                source,
            })?;

        let replaces = current.as_ref().map(|p| p.id);
        let new_payment = NewPayment {
            external_id: order.order_code.clone(),
            payment_id: Some(invoice.id),
            checkout_url: invoice.checkout_url,
            amount: order.total_price,
            expired_at: invoice.expires_at,
        };

        match self
            .store
            .install_payment(order.id, replaces, new_payment)
            .await?
        {
            PaymentInstall::Installed(payment) => {
                info!(
                    payment_id = %payment.id,
                    expires_at = %payment.expired_at,
                    replaced = replaces.is_some(),
                    "Payment reference created"
                );
                Ok(Some(payment))
            }
            PaymentInstall::Kept(payment) => {
                debug!("Order changed concurrently, keeping its current payment");
                Ok(payment)
            }
        }
    }

    fn invoice_request(&self, order: &TicketOrder, ticket: Option<&BeachTicket>) -> InvoiceRequest {
        let label = ticket.map_or("Beach ticket", |t| t.name.as_str());
        InvoiceRequest {
            external_id: order.order_code.clone(),
            amount: order.total_price,
            description: format!("{} x{} ({})", label, order.quantity, order.order_code),
            customer: InvoiceCustomer {
                given_names: order.customer_name.clone(),
                email: order.customer_email.clone(),
                mobile_number: order.customer_phone.clone(),
            },
            success_redirect_url: format!(
                "{}/ticket-orders/{}/payment/success",
                self.app_url, order.order_code
            ),
            failure_redirect_url: format!(
                "{}/ticket-orders/{}/payment",
                self.app_url, order.order_code
            ),
        }
    }

    /// Applies a gateway callback.
    ///
    /// `PAID` always settles, even for a superseded invoice, since the money
    /// was collected. Other statuses are ignored when they refer to an
    /// invoice the order no longer holds.
    #[instrument(skip(self, notice), fields(external_id = %notice.external_id, status = %notice.status))]
    pub async fn reconcile_from_webhook(
        &self,
        notice: WebhookNotice,
    ) -> Result<WebhookOutcome, AppError> {
        let payment = self
            .store
            .find_payment_by_external_id(&notice.external_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Payment {} not found", notice.external_id))
            })?;

        let superseded = matches!(
            (&payment.payment_id, &notice.gateway_payment_id),
            (Some(known), Some(incoming)) if known != incoming
        );

        let outcome = match GatewayStatus::parse(&notice.status) {
            GatewayStatus::Paid => {
                if self
                    .settle(payment.ticket_order_id, notice.gateway_payment_id.as_deref())
                    .await?
                {
                    WebhookOutcome::MarkedPaid
                } else {
                    WebhookOutcome::AlreadyPaid
                }
            }
            _ if superseded => WebhookOutcome::Superseded,
            GatewayStatus::Expired => {
                self.store.mark_expired(payment.ticket_order_id, None).await?;
                WebhookOutcome::MarkedExpired
            }
            GatewayStatus::Pending | GatewayStatus::Other(_) => {
                if let (None, Some(gateway_id)) =
                    (&payment.payment_id, &notice.gateway_payment_id)
                {
                    self.store
                        .record_gateway_payment_id(payment.id, gateway_id)
                        .await?;
                }
                WebhookOutcome::Recorded
            }
        };

        info!(outcome = ?outcome, "Webhook reconciled");
        Ok(outcome)
    }

    /// Brings the order up to date before the payment page is shown.
    ///
    /// A pending payment is checked against the gateway; a missing, stale or
    /// expired one is replaced. A failed status check falls back to the
    /// stored payment.
    #[instrument(skip(self))]
    pub async fn reconcile_from_poll(&self, code: &str) -> Result<OrderWithPayment, AppError> {
        let current = self.load(code).await?;
        if current.order.is_paid() || current.order.is_offline_order {
            return Ok(current);
        }

        let order_id = current.order.id;
        let live = current
            .payment
            .as_ref()
            .filter(|p| !p.needs_replacement(Utc::now()))
            .map(|p| p.payment_id.clone());

        if let Some(gateway_id) = live {
            let Some(gateway_id) = gateway_id else {
                return Ok(current);
            };
            match self.gateway.invoice_status(&gateway_id).await {
                Ok(GatewayStatus::Paid) => {
                    self.settle(order_id, Some(&gateway_id)).await?;
                    return self.load(code).await;
                }
                Ok(GatewayStatus::Expired) => {
                    info!("Gateway reports invoice expired, issuing a new one");
                    self.store.mark_expired(order_id, None).await?;
                }
                Ok(_) => return Ok(current),
                Err(e) => {
                    warn!(error = %e, "Gateway status check failed, showing stored payment");
                    return Ok(current);
                }
            }
        }

        let order = self.find_by_code(code).await?;
        self.ensure_payment(&order).await?;
        self.load(code).await
    }

    /// Moves the order to paid and fires the confirmation if this call made
    /// the transition. Returns whether it did.
    async fn settle(
        &self,
        order_id: Uuid,
        gateway_payment_id: Option<&str>,
    ) -> Result<bool, AppError> {
        let transitioned = self
            .store
            .mark_paid(order_id, gateway_payment_id, Utc::now())
            .await?;
        if !transitioned {
            debug!(order_id = %order_id, "Order already paid, nothing to do");
            return Ok(false);
        }

        match self.store.find_order(order_id).await? {
            Some(order) => {
                info!(order_code = %order.order_code, "Ticket order paid");
                if let Err(e) = self.notifier.order_paid(&order).await {
                    error!(order_code = %order.order_code, error = %e, "Confirmation failed");
                }
            }
            None => warn!(order_id = %order_id, "Paid order vanished before confirmation"),
        }
        Ok(true)
    }

    /// Staff or test override to paid. Returns whether the order changed.
    #[instrument(skip(self))]
    pub async fn force_paid(&self, code: &str) -> Result<bool, AppError> {
        let order = self.find_by_code(code).await?;
        self.settle(order.id, None).await
    }

    /// Test override to expired. The payment's expiry is moved into the past
    /// so the next payment page view mints a replacement.
    #[instrument(skip(self))]
    pub async fn force_expired(&self, code: &str) -> Result<bool, AppError> {
        let order = self.find_by_code(code).await?;
        let backdated = Utc::now() - Duration::minutes(1);
        let changed = self.store.mark_expired(order.id, Some(backdated)).await?;
        if !changed && order.is_paid() {
            info!("Paid order left untouched by expire override");
        }
        Ok(changed)
    }

    #[instrument(skip(self), fields(staff_id = staff.id))]
    pub async fn delete_order(
        &self,
        staff: &StaffUser,
        code: &str,
    ) -> Result<TicketOrder, AppError> {
        let order = self.find_by_code(code).await?;
        if order.is_paid() {
            warn!(
                order_code = %order.order_code,
                staff_id = staff.id,
                total = %order.total_price,
                "Deleting a paid ticket order"
            );
        }
        if !self.store.delete_order(order.id).await? {
            return Err(AppError::NotFound(format!("Order {} not found", code)));
        }
        info!(order_code = %order.order_code, "Ticket order deleted");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, Invoice};
    use crate::models::{DiscountType, PromoSnapshot, StaffRole};
    use crate::services::notifier::NotifyError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGateway {
        created: AtomicUsize,
        fail: AtomicBool,
        status: Mutex<Option<GatewayStatus>>,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_invoice(&self, _request: &InvoiceRequest) -> Result<Invoice, GatewayError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(GatewayError::Timeout);
            }
            let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Invoice {
                id: format!("inv_{}", n),
                checkout_url: format!("https://pay.example/inv_{}", n),
                expires_at: Utc::now() + Duration::hours(24),
            })
        }

        async fn invoice_status(&self, _id: &str) -> Result<GatewayStatus, GatewayError> {
            self.status
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| GatewayError::Http("unreachable".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingNotifier(AtomicUsize);

    #[async_trait]
    impl ConfirmationNotifier for CountingNotifier {
        async fn order_paid(&self, _order: &TicketOrder) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        store: MemoryStore,
        gateway: Arc<FakeGateway>,
        notifier: Arc<CountingNotifier>,
        service: OrderService,
    }

    async fn harness() -> Harness {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .add_ticket(BeachTicket {
                id: 1,
                name: "Bodur Regular".to_string(),
                beach_name: "bodur".to_string(),
                ticket_type: "regular".to_string(),
                description: None,
                price: Decimal::from(100_000),
                active: true,
                created_at: now,
                updated_at: now,
            })
            .await;
        let gateway = Arc::new(FakeGateway::default());
        let notifier = Arc::new(CountingNotifier::default());
        let service = OrderService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            gateway.clone(),
            notifier.clone(),
            "https://beach.example/",
        );
        Harness {
            store,
            gateway,
            notifier,
            service,
        }
    }

    fn session(quantity: i32) -> CheckoutSession {
        CheckoutSession {
            ticket_id: 1,
            visit_date: NaiveDate::from_ymd_opt(2030, 7, 1).unwrap(),
            quantity,
            additional_request: None,
            subtotal: Decimal::from(100_000) * Decimal::from(quantity),
            promo: None,
        }
    }

    fn customer() -> CustomerDetails {
        CustomerDetails {
            name: "Sari".to_string(),
            email: "sari@example.com".to_string(),
            phone: Some("0812345678".to_string()),
        }
    }

    fn notice(code: &str, status: &str, gateway_id: &str) -> WebhookNotice {
        WebhookNotice {
            external_id: code.to_string(),
            status: status.to_string(),
            gateway_payment_id: Some(gateway_id.to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_order_persists_promo_discount() {
        let h = harness().await;
        let mut session = session(2);
        session.apply_promo(PromoSnapshot {
            promo_code_id: 9,
            code: "SUMMER15".to_string(),
            discount: Decimal::from(30_000),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(15),
        });

        let order = h
            .service
            .create_order(&session, customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();

        assert!(order.order_code.starts_with("TIX-"));
        assert_eq!(order.subtotal, Decimal::from(200_000));
        assert_eq!(order.discount, Decimal::from(30_000));
        assert_eq!(order.total_price, Decimal::from(170_000));
        assert_eq!(order.promo_code_id, Some(9));
        assert_eq!(order.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_order_rejects_zero_quantity_and_unknown_ticket() {
        let h = harness().await;
        let err = h
            .service
            .create_order(&session(0), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let mut unknown = session(1);
        unknown.ticket_id = 99;
        let err = h
            .service
            .create_order(&unknown, customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(h.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_ensure_payment_reuses_valid_pending_payment() {
        let h = harness().await;
        let order = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();

        let first = h.service.ensure_payment(&order).await.unwrap().unwrap();
        let second = h.service.ensure_payment(&order).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.external_id, order.order_code);
        assert_eq!(h.gateway.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_order_retryable() {
        let h = harness().await;
        let order = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();

        h.gateway.fail.store(true, Ordering::SeqCst);
        let err = h.service.ensure_payment(&order).await.unwrap_err();
        assert!(
            matches!(err, AppError::PaymentUnavailable { ref order_code, .. } if *order_code == order.order_code)
        );
        assert!(h.service.payment_for(&order).await.unwrap().is_none());

        h.gateway.fail.store(false, Ordering::SeqCst);
        let page = h.service.reconcile_from_poll(&order.order_code).await.unwrap();
        assert_eq!(page.order.payment_status, PaymentStatus::Pending);
        assert!(page.payment.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_paid_webhook_notifies_once() {
        let h = harness().await;
        let order = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();
        h.service.ensure_payment(&order).await.unwrap();

        let outcome = h
            .service
            .reconcile_from_webhook(notice(&order.order_code, "PAID", "inv_1"))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::MarkedPaid);
        let paid_at = h.service.find_by_code(&order.order_code).await.unwrap().paid_at;
        assert!(paid_at.is_some());

        let outcome = h
            .service
            .reconcile_from_webhook(notice(&order.order_code, "PAID", "inv_1"))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::AlreadyPaid);
        assert_eq!(
            h.service.find_by_code(&order.order_code).await.unwrap().paid_at,
            paid_at
        );
        assert_eq!(h.notifier.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_webhook_for_unknown_reference_is_not_found() {
        let h = harness().await;
        let err = h
            .service
            .reconcile_from_webhook(notice("TIX-NOPE000", "PAID", "inv_x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(h.notifier.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_webhook_for_replaced_invoice_is_ignored() {
        let h = harness().await;
        let order = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();
        h.service.ensure_payment(&order).await.unwrap();

        let outcome = h
            .service
            .reconcile_from_webhook(notice(&order.order_code, "EXPIRED", "inv_old"))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Superseded);
        let order = h.service.find_by_code(&order.order_code).await.unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_expired_webhook_marks_order_and_payment_expired() {
        let h = harness().await;
        let order = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();
        h.service.ensure_payment(&order).await.unwrap();

        let outcome = h
            .service
            .reconcile_from_webhook(notice(&order.order_code, "EXPIRED", "inv_1"))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::MarkedExpired);

        let current = h.service.load(&order.order_code).await.unwrap();
        assert_eq!(current.order.payment_status, PaymentStatus::Expired);
        assert_eq!(
            current.payment.map(|p| p.payment_status),
            Some(PaymentStatus::Expired)
        );
        assert_eq!(h.notifier.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_total_order_settles_without_gateway() {
        let h = harness().await;
        let mut session = session(1);
        session.apply_promo(PromoSnapshot {
            promo_code_id: 2,
            code: "BIGFIX".to_string(),
            discount: Decimal::from(100_000),
            discount_type: DiscountType::Fixed,
            discount_value: Decimal::from(500_000),
        });
        let order = h
            .service
            .create_order(&session, customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();
        assert!(order.total_price.is_zero());

        let payment = h.service.ensure_payment(&order).await.unwrap();
        assert!(payment.is_none());

        let order = h.service.find_by_code(&order.order_code).await.unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.paid_at.is_some());
        assert_eq!(h.gateway.created.load(Ordering::SeqCst), 0);
        assert_eq!(h.notifier.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_replaces_payment_gateway_reports_expired() {
        let h = harness().await;
        let order = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();
        let first = h.service.ensure_payment(&order).await.unwrap().unwrap();
        *h.gateway.status.lock().unwrap() = Some(GatewayStatus::Expired);

        let page = h.service.reconcile_from_poll(&order.order_code).await.unwrap();
        let fresh = page.payment.unwrap();
        assert_ne!(fresh.id, first.id);
        assert_eq!(fresh.payment_id.as_deref(), Some("inv_2"));
        assert_eq!(fresh.payment_status, PaymentStatus::Pending);
        assert_eq!(page.order.payment_status, PaymentStatus::Pending);
        assert_eq!(h.gateway.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_poll_settles_when_gateway_reports_paid() {
        let h = harness().await;
        let order = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();
        h.service.ensure_payment(&order).await.unwrap();
        *h.gateway.status.lock().unwrap() = Some(GatewayStatus::Paid);

        let page = h.service.reconcile_from_poll(&order.order_code).await.unwrap();
        assert!(page.order.is_paid());
        assert_eq!(
            page.payment.map(|p| p.payment_status),
            Some(PaymentStatus::Paid)
        );

        // A webhook racing in afterwards is absorbed.
        let outcome = h
            .service
            .reconcile_from_webhook(notice(&order.order_code, "PAID", "inv_1"))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::AlreadyPaid);
        assert_eq!(h.notifier.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_keeps_stored_payment_when_status_check_fails() {
        let h = harness().await;
        let order = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();
        let payment = h.service.ensure_payment(&order).await.unwrap().unwrap();

        let page = h.service.reconcile_from_poll(&order.order_code).await.unwrap();
        assert_eq!(page.payment.map(|p| p.id), Some(payment.id));
        assert_eq!(h.gateway.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forced_expiry_mints_new_reference_on_next_view() {
        let h = harness().await;
        let order = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();
        let old = h.service.ensure_payment(&order).await.unwrap().unwrap();

        assert!(h.service.force_expired(&order.order_code).await.unwrap());
        let expired = h.service.find_by_code(&order.order_code).await.unwrap();
        assert_eq!(expired.payment_status, PaymentStatus::Expired);

        let page = h.service.reconcile_from_poll(&order.order_code).await.unwrap();
        let fresh = page.payment.unwrap();
        assert_ne!(fresh.id, old.id);
        assert_ne!(fresh.payment_id, old.payment_id);
        assert!(fresh.expired_at > old.expired_at);
        assert_eq!(page.order.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_force_paid_uses_single_notification_rule() {
        let h = harness().await;
        let order = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();

        assert!(h.service.force_paid(&order.order_code).await.unwrap());
        assert!(!h.service.force_paid(&order.order_code).await.unwrap());
        assert!(!h.service.force_expired(&order.order_code).await.unwrap());

        let order = h.service.find_by_code(&order.order_code).await.unwrap();
        assert!(order.is_paid());
        assert_eq!(h.notifier.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_manual_paid_order_skips_gateway_and_notification() {
        let h = harness().await;
        let staff = StaffUser {
            id: 5,
            role: StaffRole::Cashier,
        };
        let order = h
            .service
            .create_manual_order(
                &staff,
                ManualOrder {
                    beach_ticket_id: 1,
                    customer: customer(),
                    visit_date: NaiveDate::from_ymd_opt(2030, 7, 2).unwrap(),
                    quantity: 3,
                    additional_request: None,
                    payment_method: "cash".to_string(),
                    payment_status: PaymentStatus::Paid,
                },
            )
            .await
            .unwrap();

        assert!(order.is_offline_order);
        assert_eq!(order.cashier_id, Some(5));
        assert_eq!(order.total_price, Decimal::from(300_000));
        assert!(order.paid_at.is_some());
        assert!(h.service.ensure_payment(&order).await.unwrap().is_none());
        assert_eq!(h.gateway.created.load(Ordering::SeqCst), 0);
        assert_eq!(h.notifier.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_paid_order_is_allowed() {
        let h = harness().await;
        let order = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();
        h.service.force_paid(&order.order_code).await.unwrap();

        let staff = StaffUser {
            id: 1,
            role: StaffRole::Admin,
        };
        h.service.delete_order(&staff, &order.order_code).await.unwrap();
        assert!(matches!(
            h.service.find_by_code(&order.order_code).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_retries_after_code_collision() {
        let h = harness().await;
        let first = h
            .service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();

        let taken = first.order_code.trim_start_matches("TIX-").to_string();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let service = h.service.clone().with_code_generator(OrderCodeGenerator::with_source(
            move || {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    taken.clone()
                } else {
                    "FRESH01".to_string()
                }
            },
        ));

        let second = service
            .create_order(&session(1), customer(), ONLINE_PAYMENT_METHOD)
            .await
            .unwrap();
        assert_eq!(second.order_code, "TIX-FRESH01");
        assert_ne!(second.order_code, first.order_code);
    }
}
