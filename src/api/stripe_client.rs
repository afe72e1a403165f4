// src/api/stripe_client.rs
//
// Minimal client for Stripe Checkout (POST /v1/checkout/sessions).
// Auth: `Authorization: Bearer <secret key>`, form-encoded body.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("stripe api error status={status} body={body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("form encoding error: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),
}

/// One-item card checkout for a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub amount: i32,
    pub currency: String,
    pub listing_id: i32,
    pub listing_title: String,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub buyer_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Boundary to the card-payment provider.
pub trait PaymentGateway: Send + Sync {
    fn create_checkout_session(
        &self,
        req: CheckoutRequest,
    ) -> BoxFuture<'_, Result<CheckoutSession, StripeError>>;
}

pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, api_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn post_checkout(&self, req: CheckoutRequest) -> Result<CheckoutSession, StripeError> {
        let body = serde_urlencoded::to_string(checkout_form(&req))?;

        let resp = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(StripeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<CheckoutSession>(&body)
            .map_err(|e| StripeError::InvalidResponse(format!("{e}; body={body}")))
    }
}

impl PaymentGateway for StripeClient {
    fn create_checkout_session(
        &self,
        req: CheckoutRequest,
    ) -> BoxFuture<'_, Result<CheckoutSession, StripeError>> {
        Box::pin(self.post_checkout(req))
    }
}

/// Form fields for a single line-item card payment.
pub fn checkout_form(req: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = [
        ("mode", "payment".to_string()),
        ("payment_method_types[0]", "card".to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", req.currency.clone()),
        ("line_items[0][price_data][unit_amount]", req.amount.to_string()),
        (
            "line_items[0][price_data][product_data][name]",
            req.listing_title.clone(),
        ),
        (
            "line_items[0][price_data][product_data][description]",
            "Automation shortcut - instant download".to_string(),
        ),
        ("success_url", req.success_url.clone()),
        ("cancel_url", req.cancel_url.clone()),
        ("metadata[listingId]", req.listing_id.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    if let Some(email) = &req.customer_email {
        form.push(("customer_email".to_string(), email.clone()));
    }
    if let Some(buyer_id) = req.buyer_id {
        form.push(("metadata[buyerId]".to_string(), buyer_id.to_string()));
    }
    form
}
