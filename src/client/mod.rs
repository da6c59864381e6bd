//! Typed client for the JSON API.
//!
//! [`ApiClient`] wraps every endpoint. [`SessionStore`] layers the signed-in
//! state on top of it, and [`guard`] decides where navigation may go.

pub mod guard;
pub mod session;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::{fmt, sync::Arc, time::Duration};

use crate::auth::{AuthResponse, RegisterRequest};
use crate::models::{
    Experience, ExperienceInput, Page, PublicUserResponse, Skill, SkillQuery, UserResponse,
    UserSummary,
};

pub use guard::{before_each, resolve, Navigation, Route, RouteMeta};
pub use session::{LoginOutcome, Session, SessionStore, SessionUser};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    Api {
        status: u16,
        message: String,
        /// Present when the account still has to be verified.
        user_id: Option<i64>,
    },
    Transport(reqwest::Error),
    /// `verify` was called before registration or login asked for a code.
    NoPendingVerification,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(err) => err.status().map(|status| status.as_u16()),
            ClientError::NoPendingVerification => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientError::Api {
                status, message, ..
            } => write!(f, "{} ({})", message, status),
            ClientError::Transport(err) => write!(f, "request failed: {}", err),
            ClientError::NoPendingVerification => write!(f, "no verification in progress"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> ClientError {
        ClientError::Transport(error)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    user_id: Option<i64>,
}

type ErrorHook = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// HTTP client for the `/api` routes. Keeps the session cookie between calls.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    on_error: Option<ErrorHook>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ApiClient {
    /// `base_url` is the server origin, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            on_error: None,
        })
    }

    /// Registers a callback that sees every failed call before it is returned.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ClientError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/api{}", self.base_url, path))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let result = match request.send().await {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => Err(api_error(response).await),
            Err(err) => Err(ClientError::Transport(err)),
        };

        if let (Err(err), Some(hook)) = (&result, &self.on_error) {
            hook(err);
        }
        result
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = self.execute(request).await?;
        Ok(response.json::<T>().await?)
    }

    async fn fetch_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        self.execute(request).await.map(|_| ())
    }

    // Accounts

    pub async fn register(&self, request: &RegisterRequest) -> Result<UserResponse, ClientError> {
        self.fetch(self.request(Method::POST, "/users/register").json(request))
            .await
    }

    pub async fn verify(&self, user_id: i64, code: &str) -> Result<AuthResponse, ClientError> {
        self.fetch(
            self.request(Method::PATCH, "/users/verify")
                .json(&json!({ "userId": user_id, "code": code })),
        )
        .await
    }

    pub async fn resend_verification(&self, user_id: i64) -> Result<(), ClientError> {
        self.fetch_empty(
            self.request(Method::POST, "/users/resend-verification")
                .json(&json!({ "userId": user_id })),
        )
        .await
    }

    pub async fn login(&self, login: &str, password: &str) -> Result<AuthResponse, ClientError> {
        self.fetch(
            self.request(Method::POST, "/users/login")
                .json(&json!({ "login": login, "password": password })),
        )
        .await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.fetch_empty(self.request(Method::POST, "/users/logout"))
            .await
    }

    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        self.fetch(self.request(Method::GET, "/users/me")).await
    }

    pub async fn delete_account(&self) -> Result<(), ClientError> {
        self.fetch_empty(self.request(Method::DELETE, "/users/me"))
            .await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ClientError> {
        self.fetch_empty(
            self.request(Method::POST, "/users/password/reset")
                .json(&json!({ "email": email })),
        )
        .await
    }

    pub async fn verify_password_reset(
        &self,
        email: &str,
        code: &str,
    ) -> Result<AuthResponse, ClientError> {
        self.fetch(
            self.request(Method::POST, "/users/password/verify")
                .json(&json!({ "email": email, "code": code })),
        )
        .await
    }

    pub async fn change_password(&self, new_password: &str) -> Result<(), ClientError> {
        self.fetch_empty(
            self.request(Method::PATCH, "/users/password/change")
                .json(&json!({ "newPassword": new_password })),
        )
        .await
    }

    pub async fn profile(&self, username: &str) -> Result<PublicUserResponse, ClientError> {
        self.fetch(self.request(Method::GET, &format!("/users/{}", username)))
            .await
    }

    // Social graph

    pub async fn follow(&self, user_id: i64) -> Result<(), ClientError> {
        self.fetch_empty(
            self.request(Method::POST, "/follow")
                .json(&json!({ "followedId": user_id })),
        )
        .await
    }

    pub async fn unfollow(&self, user_id: i64) -> Result<(), ClientError> {
        self.fetch_empty(
            self.request(Method::POST, "/unfollow")
                .json(&json!({ "unfollowedId": user_id })),
        )
        .await
    }

    pub async fn followers(&self, username: &str, page: Page) -> Result<Vec<UserSummary>, ClientError> {
        self.fetch(
            self.request(Method::GET, &format!("/users/{}/followers", username))
                .query(&page),
        )
        .await
    }

    pub async fn following(&self, username: &str, page: Page) -> Result<Vec<UserSummary>, ClientError> {
        self.fetch(
            self.request(Method::GET, &format!("/users/{}/following", username))
                .query(&page),
        )
        .await
    }

    // Timeline

    pub async fn create_experience(&self, input: &ExperienceInput) -> Result<Experience, ClientError> {
        self.fetch(self.request(Method::POST, "/experience").json(input))
            .await
    }

    pub async fn update_experience(
        &self,
        id: i64,
        input: &ExperienceInput,
    ) -> Result<Experience, ClientError> {
        self.fetch(
            self.request(Method::PUT, &format!("/experience/{}", id))
                .json(input),
        )
        .await
    }

    pub async fn delete_experience(&self, id: i64) -> Result<(), ClientError> {
        self.fetch_empty(self.request(Method::DELETE, &format!("/experience/{}", id)))
            .await
    }

    pub async fn experience_for(&self, user_id: i64) -> Result<Vec<Experience>, ClientError> {
        self.fetch(self.request(Method::GET, &format!("/users/{}/experience", user_id)))
            .await
    }

    // Skills

    pub async fn skill_suggestions(&self, query: &SkillQuery) -> Result<Vec<Skill>, ClientError> {
        self.fetch(
            self.request(Method::GET, "/skills/suggestions")
                .query(query),
        )
        .await
    }

    pub async fn update_skills(&self, skill_ids: &[i64]) -> Result<Vec<Skill>, ClientError> {
        self.fetch(
            self.request(Method::PUT, "/skills")
                .json(&json!({ "skillIds": skill_ids })),
        )
        .await
    }

    pub async fn skills_for(&self, user_id: i64) -> Result<Vec<Skill>, ClientError> {
        self.fetch(self.request(Method::GET, &format!("/users/{}/skills", user_id)))
            .await
    }
}

async fn api_error(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let fallback = status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string();

    let (message, user_id) = match response.json::<ErrorBody>().await {
        Ok(body) => (body.error, body.user_id),
        Err(_) => (fallback, None),
    };

    ClientError::Api {
        status: status.as_u16(),
        message,
        user_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalised() {
        let client = ApiClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_unauthorized_detection() {
        let err = ClientError::Api {
            status: 401,
            message: "Missing token".to_string(),
            user_id: None,
        };
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Missing token (401)");

        let forbidden = ClientError::Api {
            status: 403,
            message: "User not verified".to_string(),
            user_id: Some(3),
        };
        assert!(!forbidden.is_unauthorized());
        assert!(!ClientError::NoPendingVerification.is_unauthorized());
    }
}
