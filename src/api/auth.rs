// src/api/auth.rs

use actix_web::web;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::{require_email, require_text};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::{Account, Role};
use crate::session::{self, Claims};
use crate::{db, AppState};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Option<Role>,
}

impl RegisterRequest {
    fn validate(&self) -> AppResult<()> {
        require_email("email", &self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        require_text("name", &self.name)?;
        if self.role == Some(Role::Admin) {
            return Err(AppError::Forbidden(
                "admin accounts cannot be self-registered".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: Account,
}

pub async fn register(state: &AppState, payload: RegisterRequest) -> AppResult<AuthResponse> {
    payload.validate()?;
    let email = normalize_email(&payload.email);

    if db::find_account_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Conflict("email already registered".to_string()));
    }

    let password = payload.password;
    let password_hash = web::block(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("hash worker: {e}")))?
        .map_err(|e| AppError::Internal(format!("bcrypt hash: {e}")))?;

    let role = payload.role.unwrap_or(Role::User);
    let open_id = session::new_open_id();

    let account = match db::insert_password_account(
        &state.pool,
        &open_id,
        payload.name.trim(),
        &email,
        &password_hash,
        role,
    )
    .await
    {
        Ok(account) => account,
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict("email already registered".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if role == Role::Creator {
        db::insert_creator_profile(&state.pool, account.id).await?;
    }

    log::info!("account registered id={} role={:?}", account.id, account.role);
    let token = issue_token(state, &account)?;
    Ok(AuthResponse {
        token,
        user: account,
    })
}

/// Password sign-in. Reserved for administrators.
pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<AuthResponse> {
    let email = normalize_email(&payload.email);

    let Some(mut account) = db::find_account_by_email(&state.pool, &email).await? else {
        return Err(AppError::InvalidCredentials);
    };

    // provider-only accounts have no password to compare against
    let Some(password_hash) = account.password_hash.clone() else {
        return Err(AppError::InvalidCredentials);
    };

    let password = payload.password;
    let matches = web::block(move || verify(password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("verify worker: {e}")))?
        .map_err(|e| AppError::Internal(format!("bcrypt verify: {e}")))?;

    if !matches {
        log::warn!("failed sign-in account_id={}", account.id);
        return Err(AppError::InvalidCredentials);
    }

    if !account.is_admin() {
        return Err(AppError::admin_required());
    }

    db::touch_last_signed_in(&state.pool, account.id).await?;
    account.last_signed_in = Some(Utc::now());

    log::info!("admin signed in account_id={}", account.id);
    let token = issue_token(state, &account)?;
    Ok(AuthResponse {
        token,
        user: account,
    })
}

fn issue_token(state: &AppState, account: &Account) -> AppResult<String> {
    let claims = Claims::new(account.id, &account.open_id, Utc::now());
    session::issue(&state.config.jwt_secret, &claims)
        .map_err(|e| AppError::Internal(format!("jwt encode: {e}")))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(password: &str, role: Option<Role>) -> RegisterRequest {
        RegisterRequest {
            email: "a@b.com".into(),
            password: password.into(),
            name: "A".into(),
            role,
        }
    }

    #[test]
    fn short_password_is_rejected() {
        let err = request("12345", None).validate().unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        assert!(request("secret1", None).validate().is_ok());
    }

    #[test]
    fn admin_role_cannot_be_requested() {
        let err = request("secret1", Some(Role::Admin)).validate().unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
        assert!(request("secret1", Some(Role::Creator)).validate().is_ok());
    }

    #[test]
    fn unknown_role_fails_to_decode() {
        let parsed = serde_json::from_str::<RegisterRequest>(
            r#"{"email":"a@b.com","password":"secret1","name":"A","role":"owner"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn emails_are_compared_case_insensitively() {
        assert_eq!(normalize_email("  A@B.Com "), "a@b.com");
    }
}
