use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::{middleware::AuthFailure, token::CurrentUser};
use crate::error::AppError;

/// The caller's identity on routes that require a session.
///
/// Relies on `AuthMiddleware` having attached a [`CurrentUser`]. Without one the
/// request fails with 401, carrying the token error when there was one.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub CurrentUser);

impl AuthenticatedUser {
    pub fn id(&self) -> i64 {
        self.0.user_id
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let extensions = req.extensions();
        if let Some(user) = extensions.get::<CurrentUser>() {
            return ready(Ok(AuthenticatedUser(user.clone())));
        }

        let err = match extensions.get::<AuthFailure>() {
            Some(AuthFailure(reason)) => AppError::Unauthorized(reason.clone()),
            None => AppError::Unauthorized("Missing token".to_string()),
        };
        ready(Err(err.into()))
    }
}

/// The caller's identity when one is present; never fails.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.user_id)
    }
}

impl FromRequest for MaybeUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(MaybeUser(req.extensions().get::<CurrentUser>().cloned())))
    }
}
