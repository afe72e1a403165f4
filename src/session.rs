// src/session.rs
//
// Stateless signed credential. Nothing is stored server-side; a token stays valid
// until it expires or the signing secret rotates.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

pub const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "accountId")]
    pub account_id: i32,
    #[serde(rename = "openId")]
    pub open_id: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(account_id: i32, open_id: &str, issued_at: DateTime<Utc>) -> Self {
        Self {
            account_id,
            open_id: open_id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        }
    }
}

/// Outcome of checking a presented token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid(Claims),
    Expired,
    Invalid,
}

pub fn issue(secret: &str, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify(secret: &str, token: &str) -> Verification {
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => Verification::Valid(data.claims),
        Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => Verification::Expired,
        Err(_) => Verification::Invalid,
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// 32 random bytes, hex encoded. Used as the account's opaque identifier.
pub fn new_open_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
