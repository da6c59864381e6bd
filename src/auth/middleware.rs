use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::{cookie::ACCESS_TOKEN_COOKIE, token::CurrentUser};
use crate::{error::AppError, state::AppState};

/// Why a request carrying a token did not get a [`CurrentUser`].
///
/// Stored in the request extensions so extractors can report it.
#[derive(Debug, Clone)]
pub struct AuthFailure(pub String);

/// Resolves the caller's identity from the `access_token` cookie or a
/// `Bearer` authorization header.
///
/// The middleware never rejects a request: protected handlers ask for an
/// [`AuthenticatedUser`](crate::auth::extractors::AuthenticatedUser), public
/// ones may ask for a [`MaybeUser`](crate::auth::extractors::MaybeUser).
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

fn request_token(req: &ServiceRequest) -> Option<String> {
    let from_cookie = req
        .request()
        .cookie(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(token) = request_token(&req) {
            match req.app_data::<web::Data<AppState>>() {
                Some(state) => match state.tokens.verify_token(&token) {
                    Ok(claims) => {
                        req.extensions_mut().insert(CurrentUser::from(claims));
                    }
                    Err(err) => {
                        log::debug!("Rejected token on {}: {}", req.path(), err);
                        let reason = match err {
                            AppError::Unauthorized(msg) => msg,
                            other => other.to_string(),
                        };
                        req.extensions_mut().insert(AuthFailure(reason));
                    }
                },
                None => {
                    log::error!("AuthMiddleware is mounted without AppState");
                    req.extensions_mut()
                        .insert(AuthFailure("Authentication is not configured".into()));
                }
            }
        }

        Box::pin(self.service.call(req))
    }
}
