// src/main.rs
use std::sync::Arc;

use actix_web::middleware::{from_fn, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use shortcut_market::api::{self, stripe_client::StripeClient};
use shortcut_market::config::Config;
use shortcut_market::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Arc::new(Config::from_env().context("load configuration")?);

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("run migrations")?;

    let gateway = Arc::new(StripeClient::new(
        &config.stripe_secret_key,
        &config.stripe_api_base,
    ));

    if config.stripe_webhook_secret.is_none() {
        log::warn!("STRIPE_WEBHOOK_SECRET not set, purchases will not be recorded");
    }

    let state = web::Data::new(AppState {
        pool,
        config: config.clone(),
        gateway,
    });

    let port = config.port;
    log::info!("listening on 0.0.0.0:{port}");
    log::info!("health check: http://localhost:{port}/health");
    log::info!("rpc endpoint: http://localhost:{port}/rpc");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(from_fn(api::reject_foreign_origin))
            .wrap(api::cors(config.clone()))
            .wrap(Logger::default())
            .configure(api::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
