//! Rate limiting middleware.
//!
//! Runs the admission controller once per request before the handler.
//! Admitted (and fail-open) responses carry the quota headers; rejected
//! requests short-circuit with 429 and `{"detail": "Rate limit exceeded"}`.

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{self, HeaderMap, HeaderName, HeaderValue},
};
use std::future::{Future, Ready, ready};
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use taskhub_core::domain::QuotaHeaders;
use taskhub_core::{AdmissionController, RequestFacts, RouteClass};
use taskhub_shared::DetailResponse;
use taskhub_shared::headers::{RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING, RATE_LIMIT_RESET, RETRY_AFTER};

use crate::observability::Metrics;

/// Rate limiting middleware factory.
pub struct RateLimitMiddleware {
    controller: Arc<AdmissionController>,
    metrics: Arc<Metrics>,
    trust_forwarded_for: bool,
}

impl RateLimitMiddleware {
    pub fn new(controller: Arc<AdmissionController>, metrics: Arc<Metrics>) -> Self {
        Self {
            controller,
            metrics,
            trust_forwarded_for: false,
        }
    }

    /// Take the client address from `Forwarded`/`X-Forwarded-For`.
    /// Only safe behind a proxy that overwrites those headers.
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            controller: self.controller.clone(),
            metrics: self.metrics.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    controller: Arc<AdmissionController>,
    metrics: Arc<Metrics>,
    trust_forwarded_for: bool,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let controller = self.controller.clone();
        let metrics = self.metrics.clone();
        let source_ip = client_ip(&req, self.trust_forwarded_for);

        Box::pin(async move {
            let path = req.path().to_string();

            if controller.is_exempt(&path, source_ip.as_deref()) {
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            let user_agent = req
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            let facts = RequestFacts {
                path: &path,
                source_ip: source_ip.as_deref(),
                user_agent: user_agent.as_deref(),
            };

            let started = Instant::now();
            let decision = controller.evaluate(&facts).await;
            metrics.record_decision(RouteClass::classify(&path), &decision, started.elapsed());

            let quota = decision.headers();

            if !decision.is_admitted() {
                let mut response = HttpResponse::TooManyRequests().json(DetailResponse::rate_limited());
                apply_quota_headers(response.headers_mut(), &quota);

                let (http_req, _payload) = req.into_parts();
                return Ok(ServiceResponse::new(http_req, response).map_into_right_body());
            }

            let mut res = service.call(req).await?;
            apply_quota_headers(res.headers_mut(), &quota);
            Ok(res.map_into_left_body())
        })
    }
}

fn apply_quota_headers(headers: &mut HeaderMap, quota: &QuotaHeaders) {
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_LIMIT),
        HeaderValue::from(quota.limit),
    );
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_REMAINING),
        HeaderValue::from(quota.remaining),
    );
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_RESET),
        HeaderValue::from(quota.reset),
    );
    if let Some(retry_after) = quota.retry_after {
        headers.insert(HeaderName::from_static(RETRY_AFTER), HeaderValue::from(retry_after));
    }
}

/// Source address of the request, without port.
pub(crate) fn client_ip(req: &ServiceRequest, trust_forwarded_for: bool) -> Option<String> {
    if trust_forwarded_for {
        let info = req.connection_info();
        if let Some(addr) = info.realip_remote_addr() {
            return Some(strip_port(addr));
        }
    }

    req.peer_addr().map(|addr| addr.ip().to_string())
}

/// `1.2.3.4:80` -> `1.2.3.4`, `[::1]:80` -> `::1`; anything else as-is.
fn strip_port(addr: &str) -> String {
    if let Ok(socket) = addr.parse::<SocketAddr>() {
        return socket.ip().to_string();
    }
    let bare = addr.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => addr.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test as actix_test, web};
    use async_trait::async_trait;
    use std::time::Duration;

    use taskhub_core::AdmissionConfig;
    use taskhub_core::ports::{ManualClock, StoreError, WindowStore};
    use taskhub_infra::InMemoryWindowStore;

    const PEER: &str = "203.0.113.7:40000";
    const NOW: i64 = 1_700_000_000;

    struct DownStore;

    #[async_trait]
    impl WindowStore for DownStore {
        async fn record_hit(&self, _: &str, _: i64, _: Duration) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn controller(store: Arc<dyn WindowStore>) -> Arc<AdmissionController> {
        Arc::new(AdmissionController::new(
            store,
            Arc::new(ManualClock::new(NOW)),
            AdmissionConfig::default(),
        ))
    }

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().body("ok")
    }

    fn get(path: &str) -> actix_test::TestRequest {
        actix_test::TestRequest::get()
            .uri(path)
            .peer_addr(PEER.parse().unwrap())
            .insert_header((header::USER_AGENT, "curl/8.0"))
    }

    fn header_value(res: &ServiceResponse<impl actix_web::body::MessageBody>, name: &str) -> String {
        res.headers().get(name).unwrap().to_str().unwrap().to_string()
    }

    #[actix_web::test]
    async fn test_admitted_requests_carry_quota_headers() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(
                    controller(Arc::new(InMemoryWindowStore::new())),
                    metrics.clone(),
                ))
                .route("/api/v1/auth/login", web::post().to(ok)),
        )
        .await;

        for expected_remaining in (0..5).rev() {
            let req = get("/api/v1/auth/login").method(actix_web::http::Method::POST);
            let res = actix_test::call_service(&app, req.to_request()).await;

            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(header_value(&res, RATE_LIMIT_LIMIT), "5");
            assert_eq!(header_value(&res, RATE_LIMIT_REMAINING), expected_remaining.to_string());
            assert_eq!(header_value(&res, RATE_LIMIT_RESET), (NOW + 60).to_string());
            assert!(res.headers().get(RETRY_AFTER).is_none());
        }

        assert_eq!(metrics.decision_count("admitted", RouteClass::Login), 5);
    }

    #[actix_web::test]
    async fn test_sixth_login_is_rejected() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(
                    controller(Arc::new(InMemoryWindowStore::new())),
                    metrics.clone(),
                ))
                .route("/api/v1/auth/login", web::post().to(ok)),
        )
        .await;

        for _ in 0..5 {
            let req = get("/api/v1/auth/login").method(actix_web::http::Method::POST);
            let res = actix_test::call_service(&app, req.to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let req = get("/api/v1/auth/login").method(actix_web::http::Method::POST);
        let res = actix_test::call_service(&app, req.to_request()).await;

        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header_value(&res, RATE_LIMIT_REMAINING), "0");
        assert_eq!(header_value(&res, RETRY_AFTER), "60");

        let body: serde_json::Value = actix_test::read_body_json(res).await;
        assert_eq!(body, serde_json::json!({"detail": "Rate limit exceeded"}));
        assert_eq!(metrics.decision_count("rejected", RouteClass::Login), 1);
    }

    #[actix_web::test]
    async fn test_user_agents_get_separate_windows() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(
                    controller(Arc::new(InMemoryWindowStore::new())),
                    Arc::new(Metrics::new().unwrap()),
                ))
                .route("/api/v1/auth/register", web::post().to(ok)),
        )
        .await;

        for _ in 0..3 {
            let req = get("/api/v1/auth/register").method(actix_web::http::Method::POST);
            actix_test::call_service(&app, req.to_request()).await;
        }

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .peer_addr(PEER.parse().unwrap())
            .insert_header((header::USER_AGENT, "Mozilla/5.0"))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header_value(&res, RATE_LIMIT_REMAINING), "2");
    }

    #[actix_web::test]
    async fn test_store_outage_fails_open() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(controller(Arc::new(DownStore)), metrics.clone()))
                .route("/api/v1/auth/login", web::post().to(ok)),
        )
        .await;

        for _ in 0..20 {
            let req = get("/api/v1/auth/login").method(actix_web::http::Method::POST);
            let res = actix_test::call_service(&app, req.to_request()).await;

            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(header_value(&res, RATE_LIMIT_REMAINING), "5");
        }

        assert_eq!(metrics.decision_count("fail_open", RouteClass::Login), 20);
        assert_eq!(metrics.decision_count("rejected", RouteClass::Login), 0);
    }

    #[actix_web::test]
    async fn test_exempt_paths_have_no_headers() {
        let store = Arc::new(InMemoryWindowStore::new());
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(
                    controller(store.clone()),
                    Arc::new(Metrics::new().unwrap()),
                ))
                .route("/health", web::get().to(ok)),
        )
        .await;

        for _ in 0..200 {
            let res = actix_test::call_service(&app, get("/health").to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
            assert!(res.headers().get(RATE_LIMIT_LIMIT).is_none());
        }

        assert!(store.is_empty().await);
    }

    #[actix_web::test]
    async fn test_trusted_address_bypasses() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(
                    controller(Arc::new(DownStore)),
                    Arc::new(Metrics::new().unwrap()),
                ))
                .route("/api/v1/tasks", web::get().to(ok)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/api/v1/tasks")
            .peer_addr("127.0.0.1:50000".parse().unwrap())
            .to_request();
        let res = actix_test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(RATE_LIMIT_LIMIT).is_none());
    }

    #[actix_web::test]
    async fn test_forwarded_for_ignored_unless_trusted() {
        let store = Arc::new(InMemoryWindowStore::new());
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(
                    controller(store.clone()),
                    Arc::new(Metrics::new().unwrap()),
                ))
                .route("/api/v1/tasks", web::get().to(ok)),
        )
        .await;

        // A spoofed loopback address must not unlock the trusted bypass.
        let req = get("/api/v1/tasks")
            .insert_header(("x-forwarded-for", "127.0.0.1"))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(header_value(&res, RATE_LIMIT_LIMIT), "100");
    }

    #[actix_web::test]
    async fn test_forwarded_for_used_when_trusted() {
        let app = actix_test::init_service(
            App::new()
                .wrap(
                    RateLimitMiddleware::new(
                        controller(Arc::new(DownStore)),
                        Arc::new(Metrics::new().unwrap()),
                    )
                    .trust_forwarded_for(true),
                )
                .route("/api/v1/tasks", web::get().to(ok)),
        )
        .await;

        let req = get("/api/v1/tasks")
            .insert_header(("x-forwarded-for", "127.0.0.1, 10.0.0.1"))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert!(res.headers().get(RATE_LIMIT_LIMIT).is_none());
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("198.51.100.4:8080"), "198.51.100.4");
        assert_eq!(strip_port("[2001:db8::1]:443"), "2001:db8::1");
        assert_eq!(strip_port("[::1]"), "::1");
        assert_eq!(strip_port("198.51.100.4"), "198.51.100.4");
        assert_eq!(strip_port("unknown"), "unknown");
    }
}
