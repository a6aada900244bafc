//! Prometheus scrape endpoint.

use actix_web::{HttpResponse, web};

use crate::middleware::error::AppResult;
use crate::state::AppState;

/// GET /metrics
pub async fn metrics(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let body = state.metrics.render()?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}
