// src/access.rs
//
// Caller identity and the three access tiers every procedure declares.

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;

use crate::error::AppError;
use crate::models::Account;
use crate::session::{self, Verification};
use crate::{db, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Public,
    Authenticated,
    Admin,
}

/// Who is calling. `None` is an anonymous caller, which public procedures accept.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<Account>);

impl FromRequest for Caller {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned);

        Box::pin(async move {
            match (state, header) {
                (Some(state), Some(header)) => Ok(Caller(resolve(&state, &header).await)),
                _ => Ok(Caller(None)),
            }
        })
    }
}

/// Maps an `Authorization` header to an account. Any failure yields an anonymous caller.
pub async fn resolve(state: &AppState, header: &str) -> Option<Account> {
    let token = session::bearer_token(header)?;

    let claims = match session::verify(&state.config.jwt_secret, token) {
        Verification::Valid(claims) => claims,
        Verification::Expired => {
            log::debug!("expired credential presented");
            return None;
        }
        Verification::Invalid => {
            log::debug!("invalid credential presented");
            return None;
        }
    };

    match db::find_account_by_id(&state.pool, claims.account_id).await {
        Ok(Some(account)) if account.open_id == claims.open_id => Some(account),
        Ok(_) => None,
        Err(e) => {
            log::error!("credential lookup error account_id={}: {e}", claims.account_id);
            None
        }
    }
}

/// Decides whether `caller` may run a procedure of `tier`. Runs before the procedure body.
pub fn gate(tier: Tier, caller: Caller) -> Result<Option<Account>, AppError> {
    match (tier, caller.0) {
        (Tier::Public, account) => Ok(account),
        (_, None) => Err(AppError::Unauthorized),
        (Tier::Authenticated, Some(account)) => Ok(Some(account)),
        (Tier::Admin, Some(account)) if account.is_admin() => Ok(Some(account)),
        (Tier::Admin, Some(_)) => Err(AppError::admin_required()),
    }
}
