use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

pub const AUTH_COOKIE: &str = "kintal-auth";
pub const AUTH_COOKIE_VALUE: &str = "authenticated";
pub const AUTH_COOKIE_MAX_AGE_SECS: i64 = 86_400;

pub const LOGIN_PATH: &str = "/auth";

/// Prefixes served without the login cookie
const PUBLIC_PREFIXES: [&str; 4] = ["/api", "/health", "/metrics", "/static"];

fn has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .map_or(false, |rest| rest.starts_with('/'))
}

pub fn is_public_path(path: &str) -> bool {
    path == "/favicon.ico" || PUBLIC_PREFIXES.iter().any(|prefix| has_prefix(path, prefix))
}

pub fn is_login_path(path: &str) -> bool {
    has_prefix(path, LOGIN_PATH)
}

/// Shared-password gate for the dashboard pages.
///
/// Anonymous requests are sent to `/auth`; logged-in requests to `/auth`
/// are sent back to `/`.
pub struct AuthGate;

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthGateService { service }))
    }
}

pub struct AuthGateService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let path = req.path().to_string();

        if is_public_path(&path) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        let authenticated = req
            .cookie(AUTH_COOKIE)
            .map_or(false, |cookie| cookie.value() == AUTH_COOKIE_VALUE);

        let target = match (authenticated, is_login_path(&path)) {
            (false, false) => Some(LOGIN_PATH),
            (true, true) => Some("/"),
            _ => None,
        };

        match target {
            Some(location) => {
                log::debug!("🔒 {} -> {}", path, location);
                let (request, _payload) = req.into_parts();
                let response = HttpResponse::Found()
                    .insert_header((header::LOCATION, location))
                    .finish()
                    .map_into_right_body();
                Box::pin(async move { Ok(ServiceResponse::new(request, response)) })
            }
            None => {
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
        }
    }
}
