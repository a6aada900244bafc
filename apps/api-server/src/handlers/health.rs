//! Health check endpoint.

use actix_web::{HttpResponse, web};
use taskhub_shared::dto::HealthResponse;

use crate::state::AppState;

/// Health check endpoint - reports whether the window store answers.
///
/// GET /health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let ping = state.store().ping().await;

    let response = HealthResponse {
        status: if ping.is_ok() { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        store: if ping.is_ok() { "connected" } else { "unreachable" }.to_string(),
        error: ping.as_ref().err().map(|e| e.to_string()),
    };

    match ping {
        Ok(()) => HttpResponse::Ok().json(response),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(response)
        }
    }
}
