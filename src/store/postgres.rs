use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{OrderStore, PaymentInstall, PromoRepository, StoreError, TicketCatalog};
use crate::models::{
    BeachTicket, NewPayment, OrderChannel, OrderDraft, OrderFilter, PromoCode, TicketBenefit,
    TicketOrder, TicketPayment,
};

const ORDER_COLUMNS: &str = "id, order_code, beach_ticket_id, customer_name, customer_email, \
    customer_phone, visit_date, quantity, additional_request, subtotal, discount, total_price, \
    payment_method, payment_status, paid_at, is_offline_order, cashier_id, promo_code_id, \
    created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, ticket_order_id, external_id, payment_id, checkout_url, \
    amount, payment_status, expired_at, paid_at, created_at, updated_at";

const PROMO_COLUMNS: &str = "id, code, discount_type, discount_value, beach_ticket_id, \
    valid_from, valid_until, min_price, usage_limit, usage_count, is_active";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_payment(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
    ) -> Result<Option<TicketPayment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ticket_payments WHERE ticket_order_id = $1",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(order_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(TicketPayment::try_from)
            .transpose()
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    order_code: String,
    beach_ticket_id: i64,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    visit_date: NaiveDate,
    quantity: i32,
    additional_request: Option<String>,
    subtotal: Decimal,
    discount: Decimal,
    total_price: Decimal,
    payment_method: String,
    payment_status: String,
    paid_at: Option<DateTime<Utc>>,
    is_offline_order: bool,
    cashier_id: Option<i64>,
    promo_code_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn push_order_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    query.push(" WHERE TRUE");
    if let Some(method) = filter.payment_method.as_deref().filter(|m| !m.is_empty()) {
        query.push(" AND payment_method = ").push_bind(method.to_string());
    }
    match filter.order_type {
        Some(OrderChannel::Offline) => {
            query.push(" AND is_offline_order");
        }
        Some(OrderChannel::Online) => {
            query.push(" AND NOT is_offline_order");
        }
        None => {}
    }
    if let Some(from) = filter.date_from {
        query.push(" AND visit_date >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        query.push(" AND visit_date <= ").push_bind(to);
    }
    if let Some(term) = filter.search_term() {
        let pattern = format!("%{}%", term);
        query
            .push(" AND (order_code ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR customer_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR customer_email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR customer_phone ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl TryFrom<OrderRow> for TicketOrder {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(TicketOrder {
            payment_status: row.payment_status.parse().map_err(StoreError::Corrupt)?,
            id: row.id,
            order_code: row.order_code,
            beach_ticket_id: row.beach_ticket_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            visit_date: row.visit_date,
            quantity: row.quantity,
            additional_request: row.additional_request,
            subtotal: row.subtotal,
            discount: row.discount,
            total_price: row.total_price,
            payment_method: row.payment_method,
            paid_at: row.paid_at,
            is_offline_order: row.is_offline_order,
            cashier_id: row.cashier_id,
            promo_code_id: row.promo_code_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct PaymentRow {
    id: Uuid,
    ticket_order_id: Uuid,
    external_id: String,
    payment_id: Option<String>,
    checkout_url: String,
    amount: Decimal,
    payment_status: String,
    expired_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for TicketPayment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(TicketPayment {
            payment_status: row.payment_status.parse().map_err(StoreError::Corrupt)?,
            id: row.id,
            ticket_order_id: row.ticket_order_id,
            external_id: row.external_id,
            payment_id: row.payment_id,
            checkout_url: row.checkout_url,
            amount: row.amount,
            expired_at: row.expired_at,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct PromoRow {
    id: i64,
    code: String,
    discount_type: String,
    discount_value: Decimal,
    beach_ticket_id: Option<i64>,
    valid_from: Option<NaiveDate>,
    valid_until: Option<NaiveDate>,
    min_price: Option<Decimal>,
    usage_limit: Option<i32>,
    usage_count: i32,
    is_active: bool,
}

impl TryFrom<PromoRow> for PromoCode {
    type Error = StoreError;

    fn try_from(row: PromoRow) -> Result<Self, Self::Error> {
        Ok(PromoCode {
            discount_type: row.discount_type.parse().map_err(StoreError::Corrupt)?,
            id: row.id,
            code: row.code,
            discount_value: row.discount_value,
            beach_ticket_id: row.beach_ticket_id,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            min_price: row.min_price,
            usage_limit: row.usage_limit,
            usage_count: row.usage_count,
            is_active: row.is_active,
        })
    }
}

#[async_trait]
impl TicketCatalog for PgStore {
    async fn find_ticket(&self, id: i64) -> Result<Option<BeachTicket>, StoreError> {
        let ticket = sqlx::query_as::<_, BeachTicket>(
            "SELECT id, name, beach_name, ticket_type, description, price, active, created_at, \
             updated_at FROM beach_tickets WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn list_active(&self) -> Result<Vec<BeachTicket>, StoreError> {
        let tickets = sqlx::query_as::<_, BeachTicket>(
            "SELECT id, name, beach_name, ticket_type, description, price, active, created_at, \
             updated_at FROM beach_tickets WHERE active ORDER BY beach_name, ticket_type, name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn benefits_for(&self, ticket_id: i64) -> Result<Vec<TicketBenefit>, StoreError> {
        let benefits = sqlx::query_as::<_, TicketBenefit>(
            "SELECT id, beach_ticket_id, benefit_name FROM ticket_benefits \
             WHERE beach_ticket_id = $1 ORDER BY id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(benefits)
    }
}

#[async_trait]
impl PromoRepository for PgStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, StoreError> {
        let sql = format!(
            "SELECT {} FROM promo_codes WHERE UPPER(code) = UPPER($1)",
            PROMO_COLUMNS
        );
        sqlx::query_as::<_, PromoRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .map(PromoCode::try_from)
            .transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PromoCode>, StoreError> {
        let sql = format!("SELECT {} FROM promo_codes WHERE id = $1", PROMO_COLUMNS);
        sqlx::query_as::<_, PromoRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(PromoCode::try_from)
            .transpose()
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn order_code_exists(&self, code: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ticket_orders WHERE order_code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert_order(
        &self,
        order_code: &str,
        draft: OrderDraft,
    ) -> Result<TicketOrder, StoreError> {
        let order = draft.into_order(order_code.to_string(), Utc::now());
        let sql = format!(
            "INSERT INTO ticket_orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
             $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
            ORDER_COLUMNS
        );
        let result = sqlx::query(&sql)
            .bind(order.id)
            .bind(&order.order_code)
            .bind(order.beach_ticket_id)
            .bind(&order.customer_name)
            .bind(&order.customer_email)
            .bind(&order.customer_phone)
            .bind(order.visit_date)
            .bind(order.quantity)
            .bind(&order.additional_request)
            .bind(order.subtotal)
            .bind(order.discount)
            .bind(order.total_price)
            .bind(&order.payment_method)
            .bind(order.payment_status.as_str())
            .bind(order.paid_at)
            .bind(order.is_offline_order)
            .bind(order.cashier_id)
            .bind(order.promo_code_id)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(order),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateOrderCode(order.order_code))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<TicketOrder>, StoreError> {
        let sql = format!("SELECT {} FROM ticket_orders WHERE id = $1", ORDER_COLUMNS);
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(TicketOrder::try_from)
            .transpose()
    }

    async fn find_order_by_code(&self, code: &str) -> Result<Option<TicketOrder>, StoreError> {
        let sql = format!("SELECT {} FROM ticket_orders WHERE order_code = $1", ORDER_COLUMNS);
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .map(TicketOrder::try_from)
            .transpose()
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TicketOrder>, i64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ticket_orders");
        push_order_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut page =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM ticket_orders", ORDER_COLUMNS));
        push_order_filters(&mut page, filter);
        page.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let orders = page
            .build_query_as::<OrderRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(TicketOrder::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((orders, total))
    }

    async fn find_payment_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<TicketPayment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ticket_payments WHERE ticket_order_id = $1",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .map(TicketPayment::try_from)
            .transpose()
    }

    async fn find_payment_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<TicketPayment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ticket_payments WHERE external_id = $1",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?
            .map(TicketPayment::try_from)
            .transpose()
    }

    async fn install_payment(
        &self,
        order_id: Uuid,
        replaces: Option<Uuid>,
        payment: NewPayment,
    ) -> Result<PaymentInstall, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serialises concurrent installs for the same order.
        let status: Option<String> = sqlx::query_scalar(
            "SELECT payment_status FROM ticket_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
        let current = Self::current_payment(&mut tx, order_id).await?;

        let unpaid = matches!(status.as_deref(), Some("pending") | Some("expired"));
        if !unpaid || current.as_ref().map(|p| p.id) != replaces {
            tx.rollback().await?;
            return Ok(PaymentInstall::Kept(current));
        }

        let now = Utc::now();
        let payment = payment.into_payment(order_id, now);

        sqlx::query("DELETE FROM ticket_payments WHERE ticket_order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "INSERT INTO ticket_payments ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            PAYMENT_COLUMNS
        );
        sqlx::query(&sql)
            .bind(payment.id)
            .bind(payment.ticket_order_id)
            .bind(&payment.external_id)
            .bind(&payment.payment_id)
            .bind(&payment.checkout_url)
            .bind(payment.amount)
            .bind(payment.payment_status.as_str())
            .bind(payment.expired_at)
            .bind(payment.paid_at)
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE ticket_orders SET payment_status = 'pending', updated_at = $2 \
             WHERE id = $1 AND payment_status = 'expired'",
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(PaymentInstall::Installed(payment))
    }

    async fn mark_paid(
        &self,
        order_id: Uuid,
        gateway_payment_id: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let transitioned = sqlx::query(
            "UPDATE ticket_orders SET payment_status = 'paid', paid_at = $2, updated_at = $2 \
             WHERE id = $1 AND payment_status <> 'paid'",
        )
        .bind(order_id)
        .bind(paid_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        sqlx::query(
            "UPDATE ticket_payments SET payment_status = 'paid', paid_at = $2, updated_at = $2, \
             payment_id = COALESCE($3, payment_id) \
             WHERE ticket_order_id = $1 AND payment_status <> 'paid'",
        )
        .bind(order_id)
        .bind(paid_at)
        .bind(gateway_payment_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transitioned)
    }

    async fn mark_expired(
        &self,
        order_id: Uuid,
        expire_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let transitioned = sqlx::query(
            "UPDATE ticket_orders SET payment_status = 'expired', updated_at = $2 \
             WHERE id = $1 AND payment_status = 'pending'",
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        sqlx::query(
            "UPDATE ticket_payments SET payment_status = 'expired', \
             expired_at = COALESCE($2, expired_at), updated_at = $3 \
             WHERE ticket_order_id = $1 AND payment_status <> 'paid'",
        )
        .bind(order_id)
        .bind(expire_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transitioned)
    }

    async fn record_gateway_payment_id(
        &self,
        payment_id: Uuid,
        gateway_payment_id: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE ticket_payments SET payment_id = $2, updated_at = $3 WHERE id = $1")
            .bind(payment_id)
            .bind(gateway_payment_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_order(&self, order_id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM ticket_payments WHERE ticket_order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM ticket_orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;
        Ok(deleted)
    }
}
