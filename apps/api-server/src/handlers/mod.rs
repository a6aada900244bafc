//! HTTP handlers and route configuration.

mod health;
mod index;
mod metrics;

use actix_web::web;

use crate::middleware::error::not_found;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index::index))
        .route("/health", web::get().to(health::health_check))
        .route("/metrics", web::get().to(metrics::metrics))
        .default_service(web::to(not_found));
}
