//! Service index.

use actix_web::{HttpResponse, web};
use taskhub_core::RouteClass;
use taskhub_shared::dto::{PolicySummary, ServiceIndex};

use crate::state::AppState;

/// GET /
pub async fn index(state: web::Data<AppState>) -> HttpResponse {
    let policies = &state.controller.config().policies;

    let mut rate_limits: Vec<PolicySummary> = policies
        .routes()
        .map(|(class, policy)| PolicySummary {
            route: class.to_string(),
            max_requests: policy.max_requests(),
            window_secs: policy.window_secs(),
        })
        .collect();
    rate_limits.sort_by(|a, b| a.route.cmp(&b.route));

    let default = policies.default_policy();
    rate_limits.push(PolicySummary {
        route: RouteClass::Other.to_string(),
        max_requests: default.max_requests(),
        window_secs: default.window_secs(),
    });

    HttpResponse::Ok().json(ServiceIndex {
        message: "Taskhub API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        health: "/health".to_string(),
        metrics: "/metrics".to_string(),
        rate_limits,
    })
}
