#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use beach_tickets::config::AppEnv;
use beach_tickets::gateway::{GatewayError, GatewayStatus, Invoice, InvoiceRequest, PaymentGateway};
use beach_tickets::models::{BeachTicket, DiscountType, PromoCode, TicketBenefit, TicketOrder};
use beach_tickets::routes::create_routes;
use beach_tickets::services::{
    CheckoutSessions, ConfirmationNotifier, NotifyError, OrderService, PromoEvaluator,
};
use beach_tickets::store::MemoryStore;
use beach_tickets::AppState;

pub const CALLBACK_TOKEN: &str = "test-callback-token";
pub const TICKET_ID: i64 = 1;

/// Gateway double: mints sequential invoices and reports a scripted status.
pub struct FakeGateway {
    pub created: AtomicUsize,
    pub fail: AtomicBool,
    pub status: Mutex<Option<GatewayStatus>>,
    pub lifetime: Mutex<Duration>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            created: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            status: Mutex::new(Some(GatewayStatus::Pending)),
            lifetime: Mutex::new(Duration::hours(24)),
        }
    }
}

impl FakeGateway {
    pub fn invoices_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_invoice(&self, _request: &InvoiceRequest) -> Result<Invoice, GatewayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 503,
                message: "SERVICE_UNAVAILABLE: try later".to_string(),
            });
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let lifetime = *self.lifetime.lock().unwrap();
        Ok(Invoice {
            id: format!("inv_{}", n),
            checkout_url: format!("https://checkout.example/inv_{}", n),
            expires_at: Utc::now() + lifetime,
        })
    }

    async fn invoice_status(&self, _id: &str) -> Result<GatewayStatus, GatewayError> {
        self.status
            .lock()
            .unwrap()
            .clone()
            .ok_or(GatewayError::Timeout)
    }
}

#[derive(Default)]
pub struct CountingNotifier {
    pub sent: Mutex<Vec<String>>,
}

impl CountingNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ConfirmationNotifier for CountingNotifier {
    async fn order_paid(&self, order: &TicketOrder) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(order.order_code.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<CountingNotifier>,
}

pub fn visit_date() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(7)
}

fn promo(id: i64, code: &str, kind: DiscountType, value: Decimal) -> PromoCode {
    PromoCode {
        id,
        code: code.to_string(),
        discount_type: kind,
        discount_value: value,
        beach_ticket_id: None,
        valid_from: None,
        valid_until: None,
        min_price: None,
        usage_limit: None,
        usage_count: 0,
        is_active: true,
    }
}

pub async fn spawn_app(app_env: AppEnv) -> TestApp {
    let store = MemoryStore::new();
    let now = Utc::now();
    store
        .add_ticket(BeachTicket {
            id: TICKET_ID,
            name: "Bodur Regular".to_string(),
            beach_name: "bodur".to_string(),
            ticket_type: "regular".to_string(),
            description: Some("Entry for one adult".to_string()),
            price: dec!(100000),
            active: true,
            created_at: now,
            updated_at: now,
        })
        .await;
    store
        .add_benefit(TicketBenefit {
            id: 1,
            beach_ticket_id: TICKET_ID,
            benefit_name: "Free parking".to_string(),
        })
        .await;
    store
        .add_promo(promo(1, "SUMMER15", DiscountType::Percentage, dec!(15)))
        .await;
    store
        .add_promo(promo(2, "BIGFIX", DiscountType::Fixed, dec!(500000)))
        .await;

    let gateway = Arc::new(FakeGateway::default());
    let notifier = Arc::new(CountingNotifier::default());
    let shared = Arc::new(store.clone());

    let state = AppState {
        orders: OrderService::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            gateway.clone(),
            notifier.clone(),
            "https://beach.example",
        ),
        promos: PromoEvaluator::new(shared.clone()),
        catalog: shared,
        sessions: CheckoutSessions::new(std::time::Duration::from_secs(600)),
        app_env,
        callback_token: Arc::from(CALLBACK_TOKEN),
    };

    TestApp {
        router: create_routes(state, "http://localhost:3000"),
        store,
        gateway,
        notifier,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` of the first Set-Cookie header.
    pub fn cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Value,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn webhook(&self, token: Option<&str>, body: Value) -> TestResponse {
        let mut builder = Request::post("/webhooks/xendit/invoice")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header("X-Callback-Token", token);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Selects `quantity` tickets and returns the session cookie.
    pub async fn select(&self, quantity: i32) -> String {
        let response = self
            .json(
                "POST",
                "/checkout",
                None,
                serde_json::json!({
                    "ticket_id": TICKET_ID,
                    "quantity": quantity,
                    "visit_date": visit_date(),
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.cookie().expect("session cookie")
    }

    /// Runs checkout to completion and returns the submit response.
    pub async fn place_order(&self, quantity: i32) -> TestResponse {
        let cookie = self.select(quantity).await;
        self.json(
            "POST",
            "/ticket-orders",
            Some(&cookie),
            serde_json::json!({
                "customer_name": "Sari Dewi",
                "customer_email": "sari@example.com",
                "customer_phone": "081234567890",
            }),
        )
        .await
    }
}
