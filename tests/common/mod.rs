#![allow(dead_code, unused_macros)]

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web};
use serde_json::{json, Value};
use std::sync::Arc;

use moner::{
    auth::ACCESS_TOKEN_COOKIE, config::Config, mailer::MemoryMailer, state::AppState,
    store::MemoryStore,
};

pub const JWT_SECRET: &str = "integration_test_secret_0123456789abcdef";
pub const PASSWORD: &str = "Password123!";

/// Builds the full application (health check plus the `/api` scope behind
/// `AuthMiddleware`) around the given state.
macro_rules! test_app {
    ($data:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($data.clone())
                .wrap(actix_web::middleware::Logger::default())
                .service(moner::routes::health::health)
                .service(
                    actix_web::web::scope("/api")
                        .wrap(moner::auth::AuthMiddleware)
                        .configure(moner::routes::config),
                ),
        )
        .await
    };
}

/// Test configuration: cheap bcrypt and no wait between code reissues,
/// with `overrides` applied on top.
pub fn test_config_with(overrides: &[(&str, &str)]) -> Config {
    let overrides: Vec<(String, String)> = overrides
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    Config::from_lookup(move |key| {
        if let Some((_, value)) = overrides.iter().find(|(k, _)| k == key) {
            return Some(value.clone());
        }
        match key {
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            "BCRYPT_COST" => Some("4".to_string()),
            "VERIFICATION_RESEND_SECS" => Some("0".to_string()),
            _ => None,
        }
    })
    .unwrap()
}

pub fn test_config() -> Config {
    test_config_with(&[])
}

/// Fresh in-memory state for `config` plus a handle on the outbox.
pub fn test_state_from(config: &Config) -> (web::Data<AppState>, MemoryMailer) {
    let mailer = MemoryMailer::new();
    let state = AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(mailer.clone()),
    )
    .unwrap();
    (web::Data::new(state), mailer)
}

pub fn test_state() -> (web::Data<AppState>, MemoryMailer) {
    test_state_from(&test_config())
}

pub struct Reply {
    pub status: StatusCode,
    pub json: Value,
    /// The `access_token` cookie set or removed by the response.
    pub cookie: Option<Cookie<'static>>,
}

pub async fn send<S, B>(app: &S, req: actix_http::Request) -> Reply
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let cookie = resp
        .response()
        .cookies()
        .find(|cookie| cookie.name() == ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.into_owned());
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Reply {
        status,
        json,
        cookie,
    }
}

pub async fn register<S, B>(app: &S, email: &str, username: &str) -> Reply
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/users/register")
        .set_json(json!({
            "email": email,
            "username": username,
            "password": PASSWORD
        }))
        .to_request();
    send(app, req).await
}

/// Registers and verifies an account, returning its id and session cookie.
pub async fn signed_up<S, B>(
    app: &S,
    mailer: &MemoryMailer,
    email: &str,
    username: &str,
) -> (i64, Cookie<'static>)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let registered = register(app, email, username).await;
    assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.json);
    let user_id = registered.json["id"].as_i64().unwrap();

    let code = mailer.last_code_for(email).expect("verification code mailed");
    let req = test::TestRequest::patch()
        .uri("/api/users/verify")
        .set_json(json!({ "userId": user_id, "code": code }))
        .to_request();
    let verified = send(app, req).await;
    assert_eq!(verified.status, StatusCode::OK, "{}", verified.json);

    (user_id, verified.cookie.expect("session cookie"))
}
