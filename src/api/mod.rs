// src/api/mod.rs
//
// Procedure registry and the HTTP surface around it. Every callable operation is
// listed in `PROCEDURES` with its kind and access tier; `dispatch` validates the
// call against that entry before running anything.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::{get, post, web, HttpResponse, ResponseError};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::access::{self, Caller, Tier};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::Account;
use crate::{docs, AppState};

pub mod admin;
pub mod auth;
pub mod creator;
pub mod listings;
pub mod payment;
pub mod stripe_client;
pub mod webhooks_stripe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Query,
    Mutation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Procedure {
    pub name: &'static str,
    pub kind: Kind,
    pub tier: Tier,
}

const fn procedure(name: &'static str, kind: Kind, tier: Tier) -> Procedure {
    Procedure { name, kind, tier }
}

pub const PROCEDURES: &[Procedure] = &[
    procedure("listings.list", Kind::Query, Tier::Public),
    procedure("listings.getBySlug", Kind::Query, Tier::Public),
    procedure("listings.report", Kind::Mutation, Tier::Authenticated),
    procedure("auth.register", Kind::Mutation, Tier::Public),
    procedure("auth.login", Kind::Mutation, Tier::Public),
    procedure("auth.me", Kind::Query, Tier::Authenticated),
    procedure("payment.createCheckoutSession", Kind::Mutation, Tier::Public),
    procedure("creator.submit", Kind::Mutation, Tier::Public),
    procedure("creator.profile", Kind::Query, Tier::Authenticated),
    procedure("admin.pendingListings", Kind::Query, Tier::Admin),
    procedure("admin.allListings", Kind::Query, Tier::Admin),
    procedure("admin.getById", Kind::Query, Tier::Admin),
    procedure("admin.approve", Kind::Mutation, Tier::Admin),
    procedure("admin.reject", Kind::Mutation, Tier::Admin),
    procedure("admin.update", Kind::Mutation, Tier::Admin),
    procedure("admin.createDirect", Kind::Mutation, Tier::Admin),
    procedure("admin.reports", Kind::Query, Tier::Admin),
    procedure("admin.resolveReport", Kind::Mutation, Tier::Admin),
];

pub fn lookup(name: &str) -> Option<&'static Procedure> {
    PROCEDURES.iter().find(|p| p.name == name)
}

/// Runs the named procedure for `caller`. Method and tier are checked before the
/// input is decoded or any storage is touched.
pub async fn dispatch(
    state: &AppState,
    caller: Caller,
    name: &str,
    via: Kind,
    input: Value,
) -> AppResult<Value> {
    let procedure =
        lookup(name).ok_or_else(|| AppError::NotFound(format!("no procedure named {name}")))?;

    if procedure.kind == Kind::Mutation && via == Kind::Query {
        return Err(AppError::Validation(format!(
            "{name} is a mutation and must be called with POST"
        )));
    }

    let account = access::gate(procedure.tier, caller)?;

    match procedure.name {
        "listings.list" => reply(listings::list(state, input_or_default(input)?).await?),
        "listings.getBySlug" => reply(listings::get_by_slug(state, input_as(input)?).await?),
        "listings.report" => {
            reply(listings::report(state, &signed_in(account)?, input_as(input)?).await?)
        }
        "auth.register" => reply(auth::register(state, input_as(input)?).await?),
        "auth.login" => reply(auth::login(state, input_as(input)?).await?),
        "auth.me" => reply(signed_in(account)?),
        "payment.createCheckoutSession" => reply(
            payment::create_checkout_session(state, account.as_ref(), input_as(input)?).await?,
        ),
        "creator.submit" => reply(creator::submit(state, input_as(input)?).await?),
        "creator.profile" => reply(creator::profile(state, &signed_in(account)?).await?),
        "admin.pendingListings" => reply(admin::pending_listings(state).await?),
        "admin.allListings" => reply(admin::all_listings(state).await?),
        "admin.getById" => reply(admin::get_by_id(state, input_as(input)?).await?),
        "admin.approve" => reply(admin::approve(state, input_as(input)?).await?),
        "admin.reject" => reply(admin::reject(state, input_as(input)?).await?),
        "admin.update" => reply(admin::update(state, input_as(input)?).await?),
        "admin.createDirect" => {
            reply(admin::create_direct(state, &signed_in(account)?, input_as(input)?).await?)
        }
        "admin.reports" => reply(admin::reports(state, input_or_default(input)?).await?),
        "admin.resolveReport" => reply(admin::resolve_report(state, input_as(input)?).await?),
        other => Err(AppError::NotFound(format!("no procedure named {other}"))),
    }
}

fn signed_in(account: Option<Account>) -> AppResult<Account> {
    account.ok_or(AppError::Unauthorized)
}

fn reply<T: Serialize>(value: T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(format!("encode reply: {e}")))
}

fn input_as<T: DeserializeOwned>(input: Value) -> AppResult<T> {
    serde_json::from_value(input).map_err(|e| AppError::Validation(format!("invalid input: {e}")))
}

fn input_or_default<T: DeserializeOwned + Default>(input: Value) -> AppResult<T> {
    if input.is_null() {
        return Ok(T::default());
    }
    input_as(input)
}

/// Simple acknowledgement for mutations with nothing else to report.
#[derive(Debug, Serialize, ToSchema)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

// --- input checks shared by the namespaces ---

pub(crate) fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub(crate) fn require_url(field: &str, value: &str) -> AppResult<()> {
    match reqwest::Url::parse(value.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(()),
        _ => Err(AppError::Validation(format!("{field} must be a valid URL"))),
    }
}

pub(crate) fn require_email(field: &str, value: &str) -> AppResult<()> {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::Validation(format!("{field} must be a valid email"))),
    }
}

pub(crate) fn require_price(price: i32) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::Validation("price must not be negative".to_string()));
    }
    Ok(())
}

// --- HTTP surface ---

#[derive(Debug, Serialize, ToSchema)]
pub struct RpcSuccess {
    #[schema(value_type = Object)]
    pub data: Value,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RpcQueryParams {
    /// JSON-encoded procedure input.
    pub input: Option<String>,
}

#[utoipa::path(
    get,
    path = "/rpc/{procedure}",
    tag = "rpc",
    params(
        ("procedure" = String, Path, description = "Namespaced procedure name, e.g. listings.list"),
        RpcQueryParams
    ),
    responses(
        (status = 200, description = "Procedure result", body = RpcSuccess),
        (status = 400, description = "Invalid input or mutation called with GET"),
        (status = 401, description = "Credential required"),
        (status = 403, description = "Admin account required"),
        (status = 404, description = "Unknown procedure or entity")
    )
)]
#[get("/rpc/{procedure}")]
pub async fn rpc_query(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
    params: web::Query<RpcQueryParams>,
) -> Result<HttpResponse, AppError> {
    let input = match params.into_inner().input {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
            .map_err(|e| AppError::Validation(format!("input is not valid JSON: {e}")))?,
        _ => Value::Null,
    };
    let data = dispatch(&state, caller, &path.into_inner(), Kind::Query, input).await?;
    Ok(HttpResponse::Ok().json(RpcSuccess { data }))
}

#[utoipa::path(
    post,
    path = "/rpc/{procedure}",
    tag = "rpc",
    params(("procedure" = String, Path, description = "Namespaced procedure name, e.g. auth.login")),
    responses(
        (status = 200, description = "Procedure result", body = RpcSuccess),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Credential required or invalid credentials"),
        (status = 403, description = "Admin account required"),
        (status = 404, description = "Unknown procedure or entity"),
        (status = 409, description = "Duplicate unique field"),
        (status = 502, description = "Payment provider failure")
    )
)]
#[post("/rpc/{procedure}")]
pub async fn rpc_mutation(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("body is not valid JSON: {e}")))?
    };
    let data = dispatch(&state, caller, &path.into_inner(), Kind::Mutation, input).await?;
    Ok(HttpResponse::Ok().json(RpcSuccess { data }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses((status = 200, description = "Service is up", body = Health))
)]
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(Health {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    get,
    path = "/",
    tag = "service",
    responses((status = 200, description = "Service name, version and endpoints"))
)]
#[get("/")]
pub async fn info() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Shortcut Market API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "rpc": "/rpc",
            "docs": "/docs/",
            "stripeWebhook": "/webhooks/stripe",
        }
    }))
}

/// Registers every route. Shared by `main` and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(info)
        .service(health)
        .service(rpc_query)
        .service(rpc_mutation)
        .service(webhooks_stripe::stripe_webhook)
        .service(
            SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
        );
}

/// Refuses requests whose `Origin` is not on the allow-list before any route runs.
/// Requests without an `Origin` header (same-origin, server-to-server) pass.
pub async fn reject_foreign_origin<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, actix_web::Error> {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .map(|o| o.to_str().unwrap_or_default().to_owned());

    let blocked = match (origin, req.app_data::<web::Data<AppState>>()) {
        (Some(origin), Some(state)) if !state.config.is_allowed_origin(&origin) => Some(origin),
        _ => None,
    };

    if let Some(origin) = blocked {
        log::warn!("rejected request from origin {origin:?} to {}", req.path());
        let res = AppError::Forbidden("origin not allowed".to_string()).error_response();
        return Ok(req.into_response(res).map_into_right_body());
    }

    Ok(next.call(req).await?.map_into_left_body())
}

/// Cross-origin policy: only origins on the configured allow-list get through.
pub fn cors(config: Arc<Config>) -> Cors {
    Cors::default()
        .allowed_origin_fn(move |origin, _head| {
            let allowed = origin
                .to_str()
                .map(|o| config.is_allowed_origin(o))
                .unwrap_or(false);
            if !allowed {
                log::warn!("CORS blocked origin: {origin:?}");
            }
            allowed
        })
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .supports_credentials()
        .max_age(3600)
}
