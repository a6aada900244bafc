//! Admin allowlist middleware - restricts `/admin` to known addresses.

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use std::collections::HashSet;
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::sync::Arc;

use taskhub_shared::DetailResponse;

use super::rate_limit::client_ip;

const ADMIN_PREFIX: &str = "/admin";

/// Rejects `/admin` requests from addresses outside the allowlist with 403.
/// An empty allowlist disables the check.
pub struct AdminAllowlistMiddleware {
    allowlist: Arc<HashSet<String>>,
    trust_forwarded_for: bool,
}

impl AdminAllowlistMiddleware {
    pub fn new(allowlist: HashSet<String>, trust_forwarded_for: bool) -> Self {
        Self {
            allowlist: Arc::new(allowlist),
            trust_forwarded_for,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAllowlistMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AdminAllowlistService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminAllowlistService {
            service,
            allowlist: self.allowlist.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
        }))
    }
}

pub struct AdminAllowlistService<S> {
    service: S,
    allowlist: Arc<HashSet<String>>,
    trust_forwarded_for: bool,
}

fn is_admin_path(path: &str) -> bool {
    path == ADMIN_PREFIX
        || path
            .strip_prefix(ADMIN_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl<S, B> Service<ServiceRequest> for AdminAllowlistService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !self.allowlist.is_empty() && is_admin_path(req.path()) {
            let source_ip = client_ip(&req, self.trust_forwarded_for);
            let allowed = source_ip
                .as_deref()
                .is_some_and(|ip| self.allowlist.contains(ip));

            if !allowed {
                tracing::warn!(
                    source_ip = source_ip.as_deref().unwrap_or("unknown"),
                    path = %req.path(),
                    "Admin access denied"
                );

                let response = HttpResponse::Forbidden().json(DetailResponse::access_denied());
                let (http_req, _payload) = req.into_parts();
                let srv_response = ServiceResponse::new(http_req, response);

                return Box::pin(async move { Ok(srv_response.map_into_right_body()) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}
