pub mod access;
pub mod api;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod models;
pub mod session;
pub mod slug;

use std::sync::Arc;

use sqlx::PgPool;

use crate::api::stripe_client::PaymentGateway;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub gateway: Arc<dyn PaymentGateway>,
}
