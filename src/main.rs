//! Hospital backend
//!
//! Main entry point for the hospital HTTP server.

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::NormalizePath;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing::info;
use tracing_actix_web::TracingLogger;

use hospital::api::{self, AppState};
use hospital::auth::TokenIssuer;
use hospital::config;
use hospital::db::Database;
use hospital::services::StatsCache;
use hospital::telemetry;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = config::load_config().context("Failed to load configuration")?;
    telemetry::init(&config.logging);

    let database = Database::connect(&config.database.url)
        .await
        .with_context(|| format!("Failed to connect to {}", config.database.url))?;
    database
        .initialize_schema()
        .await
        .context("Failed to initialize database schema")?;

    let tokens = TokenIssuer::from_config(&config.auth).context("Invalid auth configuration")?;
    let stats = Arc::new(StatsCache::with_system_clock(Duration::from_secs(
        config.cache.dashboard_ttl_secs,
    )));
    let state = web::Data::new(AppState::new(&database, tokens, stats));

    let origins = config.server.allowed_origins.clone();
    let address = (config.server.host.clone(), config.server.port);
    info!(host = %address.0, port = address.1, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors(&origins))
            .wrap(TracingLogger::default())
            .wrap(NormalizePath::trim())
            .configure(api::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}

/// Only the configured origins may call the API from a browser. `*` opens
/// it to any origin.
fn cors(origins: &[String]) -> Cors {
    let base = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600);

    origins.iter().fold(base, |cors, origin| {
        if origin == "*" {
            cors.allow_any_origin()
        } else {
            cors.allowed_origin(origin)
        }
    })
}
