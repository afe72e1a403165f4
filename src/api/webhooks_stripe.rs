// src/api/webhooks_stripe.rs
//
// Stripe event receiver. Purchases are recorded here, never at checkout creation.
// Handlers are idempotent: Stripe retries deliveries until it sees a 2xx.

use std::collections::HashMap;

use actix_web::{post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use thiserror::Error;

use crate::error::{AppError, AppResult};
use crate::models::ANONYMOUS_ACCOUNT_ID;
use crate::{db, AppState};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Stale,
    #[error("no matching signature")]
    Mismatch,
}

/// HMAC-SHA256 of `data`, hex encoded.
pub fn sign_hmac_sha256_hex(secret: &str, data: &[u8]) -> String {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a `t=<unix>,v1=<hex>[,v1=...]` header against `payload`.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse().ok(),
            Some(("v1", v)) => candidates.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Stale);
    }

    let mut signed = format!("{timestamp}.").into_bytes();
    signed.extend_from_slice(payload);

    let Ok(mut mac) = <Hmac<Sha256> as Mac>::new_from_slice(secret.as_bytes()) else {
        return Err(SignatureError::Mismatch);
    };
    mac.update(&signed);

    let matched = candidates
        .iter()
        .filter_map(|c| hex::decode(c).ok())
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Deserialize)]
pub struct CompletedSession {
    pub id: String,
    pub payment_intent: Option<String>,
    pub amount_total: Option<i64>,
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CompletedSession {
    pub fn listing_id(&self) -> Option<i32> {
        self.metadata.get("listingId")?.parse().ok()
    }

    pub fn buyer_id(&self) -> i32 {
        self.metadata
            .get("buyerId")
            .and_then(|v| v.parse().ok())
            .unwrap_or(ANONYMOUS_ACCOUNT_ID)
    }

    /// Reference stored on the purchase; the session id stands in when there is no intent.
    pub fn payment_reference(&self) -> &str {
        self.payment_intent.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Deserialize)]
pub struct RefundedCharge {
    pub payment_intent: Option<String>,
}

async fn handle_event(state: &AppState, event: StripeEvent) -> AppResult<Value> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CompletedSession = serde_json::from_value(event.data.object)
                .map_err(|e| AppError::Validation(format!("invalid checkout session: {e}")))?;
            record_purchase(state, &session).await
        }
        "charge.refunded" => {
            let charge: RefundedCharge = serde_json::from_value(event.data.object)
                .map_err(|e| AppError::Validation(format!("invalid charge: {e}")))?;
            let Some(intent) = charge.payment_intent else {
                return Ok(json!({"received": true, "ignored": true}));
            };
            let changed = db::mark_purchase_refunded(&state.pool, &intent).await?;
            log::info!("stripe refund payment_intent={intent} changed={changed}");
            Ok(json!({"received": true}))
        }
        other => {
            log::debug!("stripe event ignored id={} type={other}", event.id);
            Ok(json!({"received": true, "ignored": true}))
        }
    }
}

async fn record_purchase(state: &AppState, session: &CompletedSession) -> AppResult<Value> {
    if session.payment_status.as_deref() != Some("paid") {
        return Ok(json!({"received": true, "ignored": true}));
    }

    let Some(listing_id) = session.listing_id() else {
        log::warn!("stripe session without listingId metadata session={}", session.id);
        return Ok(json!({"received": true, "ignored": true}));
    };

    let Some(price) = session.amount_total.and_then(|a| i32::try_from(a).ok()) else {
        log::warn!("stripe session without usable amount_total session={}", session.id);
        return Ok(json!({"received": true, "ignored": true}));
    };

    if db::find_listing_by_id(&state.pool, listing_id).await?.is_none() {
        log::warn!("stripe session for unknown listing_id={listing_id} session={}", session.id);
        return Ok(json!({"received": true, "ignored": true}));
    }

    let reference = session.payment_reference();

    // The purchase row and the sale credit commit together, so a failed credit
    // leaves nothing behind and the redelivery starts over.
    let mut tx = state.pool.begin().await?;
    let recorded = db::record_completed_purchase(
        &mut *tx,
        session.buyer_id(),
        listing_id,
        price,
        reference,
    )
    .await?;
    let Some(purchase) = recorded else {
        return Ok(json!({"received": true, "idempotent": true}));
    };
    db::apply_sale(&mut *tx, listing_id, price).await?;
    tx.commit().await?;

    log::info!(
        "purchase recorded id={} listing_id={} buyer_id={} price={}",
        purchase.id,
        listing_id,
        purchase.buyer_id,
        price
    );
    Ok(json!({"received": true, "purchaseId": purchase.id}))
}

#[utoipa::path(
    post,
    path = "/webhooks/stripe",
    tag = "webhooks",
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 400, description = "Malformed event"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 500, description = "Server error")
    )
)]
#[post("/webhooks/stripe")]
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(secret) = state.config.stripe_webhook_secret.as_deref() else {
        return Err(AppError::Internal("stripe webhook secret not configured".to_string()));
    };

    let header = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    if let Err(e) = verify_signature(secret, header, &body, Utc::now().timestamp()) {
        log::warn!("stripe webhook rejected: {e}");
        return Err(AppError::Unauthorized);
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("invalid event: {e}")))?;

    let outcome = handle_event(&state, event).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"ping","data":{"object":{}}}"#;

    fn header_for(t: i64, body: &[u8]) -> String {
        let mut signed = format!("{t}.").into_bytes();
        signed.extend_from_slice(body);
        format!("t={t},v1={}", sign_hmac_sha256_hex(SECRET, &signed))
    }

    #[test]
    fn valid_signature_passes() {
        let header = header_for(1_700_000_000, BODY);
        assert_eq!(verify_signature(SECRET, &header, BODY, 1_700_000_010), Ok(()));
    }

    #[test]
    fn any_matching_v1_is_enough() {
        let good = header_for(1_700_000_000, BODY);
        let header = format!("t=1700000000,v1=deadbeef,{}", good.split_once(',').unwrap().1);
        assert_eq!(verify_signature(SECRET, &header, BODY, 1_700_000_000), Ok(()));
    }

    #[test]
    fn tampered_body_or_wrong_secret_fails() {
        let header = header_for(1_700_000_000, BODY);
        assert_eq!(
            verify_signature(SECRET, &header, b"{}", 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature("whsec_other", &header, BODY, 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn old_signature_is_stale() {
        let header = header_for(1_700_000_000, BODY);
        let later = 1_700_000_000 + SIGNATURE_TOLERANCE_SECS + 1;
        assert_eq!(
            verify_signature(SECRET, &header, BODY, later),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn malformed_headers() {
        assert_eq!(
            verify_signature(SECRET, "v1=abc", BODY, 0),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(SECRET, "t=0", BODY, 0),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(SECRET, "garbage", BODY, 0),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn completed_session_metadata() {
        let session: CompletedSession = serde_json::from_value(json!({
            "id": "cs_1",
            "payment_intent": "pi_1",
            "amount_total": 299,
            "payment_status": "paid",
            "metadata": {"listingId": "7", "buyerId": "12"}
        }))
        .unwrap();
        assert_eq!(session.listing_id(), Some(7));
        assert_eq!(session.buyer_id(), 12);
        assert_eq!(session.payment_reference(), "pi_1");

        let anonymous: CompletedSession = serde_json::from_value(json!({
            "id": "cs_2",
            "payment_intent": null,
            "amount_total": 0,
            "payment_status": "paid",
            "metadata": {"listingId": "x"}
        }))
        .unwrap();
        assert_eq!(anonymous.listing_id(), None);
        assert_eq!(anonymous.buyer_id(), ANONYMOUS_ACCOUNT_ID);
        assert_eq!(anonymous.payment_reference(), "cs_2");
    }
}
