// Xendit invoice API client.
// Amounts are whole rupiah; every call is bounded by the client-wide timeout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{GatewayError, GatewayStatus, Invoice, InvoiceCustomer, InvoiceRequest, PaymentGateway};
use crate::config::GatewaySettings;
use crate::utils::money::whole_rupiah;

const CURRENCY: &str = "IDR";

#[derive(Clone)]
pub struct XenditClient {
    http: Client,
    api_base: String,
    secret_key: String,
    invoice_duration_secs: u64,
}

#[derive(Serialize)]
struct CreateInvoiceBody<'a> {
    external_id: &'a str,
    amount: Decimal,
    description: &'a str,
    payer_email: &'a str,
    customer: &'a InvoiceCustomer,
    invoice_duration: u64,
    currency: &'static str,
    success_redirect_url: &'a str,
    failure_redirect_url: &'a str,
}

#[derive(Deserialize)]
struct XenditInvoice {
    id: String,
    external_id: String,
    status: String,
    invoice_url: String,
    expiry_date: DateTime<Utc>,
}

#[derive(Deserialize)]
struct XenditErrorEnvelope {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl XenditClient {
    pub fn new(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            secret_key: settings.secret_key.clone(),
            invoice_duration_secs: settings.invoice_duration_secs,
        })
    }

    fn body<'a>(&self, request: &'a InvoiceRequest) -> CreateInvoiceBody<'a> {
        CreateInvoiceBody {
            external_id: &request.external_id,
            amount: whole_rupiah(request.amount),
            description: &request.description,
            payer_email: &request.customer.email,
            customer: &request.customer,
            invoice_duration: self.invoice_duration_secs,
            currency: CURRENCY,
            success_redirect_url: &request.success_redirect_url,
            failure_redirect_url: &request.failure_redirect_url,
        }
    }

    async fn read_invoice(resp: reqwest::Response) -> Result<XenditInvoice, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return resp.json::<XenditInvoice>().await.map_err(GatewayError::from);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(map_error(status, &body))
    }
}

fn map_error(status: StatusCode, body: &str) -> GatewayError {
    let message = match serde_json::from_str::<XenditErrorEnvelope>(body) {
        Ok(env) => format!(
            "{}: {}",
            env.error_code.unwrap_or_else(|| "UNKNOWN".to_string()),
            env.message.unwrap_or_default()
        ),
        Err(_) => body.to_string(),
    };
    GatewayError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl PaymentGateway for XenditClient {
    #[instrument(skip(self, request), fields(external_id = %request.external_id))]
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, GatewayError> {
        let url = format!("{}/v2/invoices", self.api_base);
        let resp = self
            .http
            .post(url)
            .basic_auth(&self.secret_key, None::<&str>)
            .json(&self.body(request))
            .send()
            .await?;

        let invoice = Self::read_invoice(resp).await?;
        if invoice.external_id != request.external_id {
            return Err(GatewayError::Decode(format!(
                "invoice {} echoes external_id {}",
                invoice.id, invoice.external_id
            )));
        }
        debug!(
            invoice_id = %invoice.id,
            status = %invoice.status,
            expiry = %invoice.expiry_date,
            "Invoice created"
        );

        Ok(Invoice {
            id: invoice.id,
            checkout_url: invoice.invoice_url,
            expires_at: invoice.expiry_date,
        })
    }

    #[instrument(skip(self))]
    async fn invoice_status(&self, gateway_payment_id: &str) -> Result<GatewayStatus, GatewayError> {
        let url = format!("{}/v2/invoices/{}", self.api_base, gateway_payment_id);
        let resp = self
            .http
            .get(url)
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;

        let invoice = Self::read_invoice(resp).await?;
        Ok(GatewayStatus::parse(&invoice.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GatewaySettings {
        GatewaySettings {
            secret_key: "xnd_development_key".to_string(),
            api_base: "https://api.xendit.co/".to_string(),
            callback_token: "token".to_string(),
            timeout_ms: 1_000,
            invoice_duration_secs: 3_600,
        }
    }

    #[test]
    fn test_invoice_body_uses_order_code_and_whole_rupiah() {
        let client = XenditClient::new(&settings()).unwrap();
        assert_eq!(client.api_base, "https://api.xendit.co");

        let request = InvoiceRequest {
            external_id: "TIX-ABC1234".to_string(),
            amount: Decimal::new(17_000_049, 2),
            description: "Lalassa Regular x2 (TIX-ABC1234)".to_string(),
            customer: InvoiceCustomer {
                given_names: "Ayu".to_string(),
                email: "ayu@example.com".to_string(),
                mobile_number: None,
            },
            success_redirect_url: "https://shop.example/ok".to_string(),
            failure_redirect_url: "https://shop.example/fail".to_string(),
        };

        let json = serde_json::to_value(client.body(&request)).unwrap();
        assert_eq!(json["external_id"], "TIX-ABC1234");
        assert_eq!(json["amount"], serde_json::json!(170000.0));
        assert_eq!(json["currency"], "IDR");
        assert_eq!(json["invoice_duration"], 3_600);
        assert_eq!(json["payer_email"], "ayu@example.com");
        assert!(json["customer"].get("mobile_number").is_none());
    }

    #[test]
    fn test_error_envelope_is_summarised() {
        let err = map_error(
            StatusCode::BAD_REQUEST,
            r#"{"error_code":"DUPLICATE_ERROR","message":"external_id already used"}"#,
        );
        match err {
            GatewayError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "DUPLICATE_ERROR: external_id already used");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
