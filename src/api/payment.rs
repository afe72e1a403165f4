// src/api/payment.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::require_url;
use crate::api::stripe_client::CheckoutRequest;
use crate::error::{AppError, AppResult};
use crate::models::{Account, Listing};
use crate::{db, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub listing_id: i32,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

/// Opens a hosted card checkout for one listing at its current price.
///
/// No purchase is recorded here: the provider's `checkout.session.completed`
/// webhook does that once payment actually succeeds. Free listings are expected
/// to skip checkout on the client; nothing here enforces it.
pub async fn create_checkout_session(
    state: &AppState,
    caller: Option<&Account>,
    payload: CreateCheckoutRequest,
) -> AppResult<CheckoutResponse> {
    for url in [&payload.success_url, &payload.cancel_url].into_iter().flatten() {
        require_url("redirect url", url)?;
    }

    let listing = db::find_listing_by_id(&state.pool, payload.listing_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("listing {} not found", payload.listing_id)))?;

    let (default_success, default_cancel) = default_redirects(&state.config.app_url, &listing);

    let request = CheckoutRequest {
        amount: listing.price,
        currency: state.config.currency.clone(),
        listing_id: listing.id,
        listing_title: listing.title.clone(),
        success_url: payload.success_url.unwrap_or(default_success),
        cancel_url: payload.cancel_url.unwrap_or(default_cancel),
        customer_email: caller.and_then(|a| a.email.clone()),
        buyer_id: caller.map(|a| a.id),
    };

    log::info!(
        "checkout create listing_id={} amount={} free={} buyer_id={:?}",
        listing.id,
        listing.price,
        listing.is_free(),
        request.buyer_id
    );

    let session = state
        .gateway
        .create_checkout_session(request)
        .await
        .map_err(|e| {
            log::error!("checkout create error listing_id={}: {e}", listing.id);
            AppError::Upstream("could not create checkout session".to_string())
        })?;

    Ok(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    })
}

/// Success returns to the listing page with a `payment=success` marker; cancel returns plain.
fn default_redirects(app_url: &str, listing: &Listing) -> (String, String) {
    let page = format!("{}/shortcut/{}", app_url.trim_end_matches('/'), listing.slug);
    (format!("{page}?payment=success"), page)
}
