//! # Taskhub API Server
//!
//! The main entry point for the Actix-web HTTP server.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

#[cfg(feature = "scheduler")]
mod background;
mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;

use config::AppConfig;
use middleware::{AdminAllowlistMiddleware, RateLimitMiddleware};
use observability::RequestIdMiddleware;
use state::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logging first, so config warnings are visible
    telemetry::init_telemetry(&telemetry::TelemetryConfig::from_env());

    // Load configuration
    let config = AppConfig::from_env();

    tracing::info!(
        "Starting Taskhub API Server on {}:{}",
        config.host,
        config.port
    );

    // Build application state
    let state = AppState::new(&config).await?;

    #[cfg(feature = "scheduler")]
    let mut scheduler = {
        let scheduler = background::Scheduler::new(config.scheduler.clone()).await?;
        if let Some(store) = state.memory_store.clone() {
            scheduler.add_window_sweep(store).await?;
        }
        scheduler.start().await?;
        scheduler
    };

    let trust_forwarded_for = config.trust_forwarded_for;
    let admin_allowlist = config.admin_allowlist.clone();

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .wrap(AdminAllowlistMiddleware::new(
                admin_allowlist.clone(),
                trust_forwarded_for,
            ))
            .wrap(
                RateLimitMiddleware::new(state.controller.clone(), state.metrics.clone())
                    .trust_forwarded_for(trust_forwarded_for),
            )
            .wrap(TracingLogger::default())
            .wrap(RequestIdMiddleware)
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    #[cfg(feature = "scheduler")]
    scheduler.shutdown().await?;

    Ok(())
}
