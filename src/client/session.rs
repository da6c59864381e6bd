//! Signed-in state for a client of the API.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    guard::{self, Navigation, Route},
    ApiClient, ClientError,
};
use crate::auth::RegisterRequest;
use crate::models::UserResponse;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub email: String,
    pub username: String,
}

impl From<&UserResponse> for SessionUser {
    fn from(user: &UserResponse) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
        }
    }
}

/// Either logged out (`user` is `None`) or logged in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<SessionUser>,
    redirect: Option<Route>,
    pending_verification: Option<i64>,
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn set_user(&mut self, user: SessionUser) {
        self.pending_verification = None;
        self.user = Some(user);
    }

    /// Forgets the user. A remembered redirect survives so the next login can use it.
    pub fn clear_user(&mut self) {
        self.user = None;
    }

    /// Drops the user together with any pending redirect or verification.
    fn end(&mut self) {
        self.user = None;
        self.redirect = None;
        self.pending_verification = None;
    }

    pub fn remember_redirect(&mut self, route: Route) {
        self.redirect = Some(route);
    }

    pub fn pending_redirect(&self) -> Option<&Route> {
        self.redirect.as_ref()
    }

    /// The account waiting for its registration code, if any.
    pub fn pending_verification(&self) -> Option<i64> {
        self.pending_verification
    }

    /// Where to go after signing in: the remembered route, else the user's profile.
    fn landing_route(&mut self) -> Route {
        match self.redirect.take() {
            Some(route) => route,
            None => match &self.user {
                Some(user) => Route::Profile(user.username.clone()),
                None => Route::Login,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Signed in; navigate to the route.
    LoggedIn(Route),
    /// The account is not verified. A new code was emailed.
    NeedsVerification { user_id: i64 },
}

/// The client-side session: an [`ApiClient`] plus who is signed in.
///
/// Any call that comes back with 401, through this store or through
/// [`SessionStore::api`], logs the user out.
#[derive(Debug, Clone)]
pub struct SessionStore {
    api: ApiClient,
    session: Arc<RwLock<Session>>,
}

impl SessionStore {
    pub fn new(api: ApiClient) -> Self {
        let session = Arc::new(RwLock::new(Session::default()));
        let on_unauthorized = Arc::clone(&session);
        let api = api.on_error(move |err| {
            if err.is_unauthorized() {
                let mut session = on_unauthorized
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if session.is_logged_in() {
                    log::info!("Session expired, logging out");
                }
                session.clear_user();
            }
        });
        Self { api, session }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A snapshot of the current session.
    pub fn session(&self) -> Session {
        self.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.read().is_logged_in()
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.read().user().cloned()
    }

    fn sign_in(&self, user: &UserResponse) -> Route {
        let mut session = self.write();
        session.set_user(SessionUser::from(user));
        session.landing_route()
    }

    /// Creates the account. The user stays logged out until [`verify`](Self::verify).
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Route, ClientError> {
        let user = self
            .api
            .register(&RegisterRequest {
                email: email.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.write().pending_verification = Some(user.id);
        Ok(Route::Verify)
    }

    /// Confirms the registration code for the pending account and signs in.
    pub async fn verify(&self, code: &str) -> Result<Route, ClientError> {
        let user_id = self
            .read()
            .pending_verification()
            .ok_or(ClientError::NoPendingVerification)?;
        let auth = self.api.verify(user_id, code).await?;
        Ok(self.sign_in(&auth.user))
    }

    pub async fn resend_verification(&self) -> Result<(), ClientError> {
        let user_id = self
            .read()
            .pending_verification()
            .ok_or(ClientError::NoPendingVerification)?;
        self.api.resend_verification(user_id).await
    }

    pub async fn login(&self, login: &str, password: &str) -> Result<LoginOutcome, ClientError> {
        match self.api.login(login, password).await {
            Ok(auth) => Ok(LoginOutcome::LoggedIn(self.sign_in(&auth.user))),
            Err(ClientError::Api {
                status: 403,
                user_id: Some(user_id),
                ..
            }) => {
                self.write().pending_verification = Some(user_id);
                Ok(LoginOutcome::NeedsVerification { user_id })
            }
            Err(err) => Err(err),
        }
    }

    /// Picks up an existing session cookie. Returns whether a user is signed in.
    pub async fn restore(&self) -> bool {
        match self.api.me().await {
            Ok(user) => {
                self.write().set_user(SessionUser::from(&user));
                true
            }
            Err(err) => {
                log::debug!("No session to restore: {}", err);
                self.write().clear_user();
                false
            }
        }
    }

    /// Ends the session locally even when the server cannot be reached.
    pub async fn logout(&self) -> Route {
        if let Err(err) = self.api.logout().await {
            log::warn!("Logout request failed: {}", err);
        }
        self.write().end();
        Route::Login
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ClientError> {
        self.api.request_password_reset(email).await
    }

    /// Signs in with a password reset code and heads to the new-password form.
    ///
    /// A remembered redirect is dropped: the reset always lands on
    /// [`Route::EditPassword`].
    pub async fn confirm_password_reset(&self, email: &str, code: &str) -> Result<Route, ClientError> {
        let auth = self.api.verify_password_reset(email, code).await?;
        let mut session = self.write();
        session.set_user(SessionUser::from(&auth.user));
        session.redirect = None;
        Ok(Route::EditPassword)
    }

    pub async fn change_password(&self, new_password: &str) -> Result<Route, ClientError> {
        self.api.change_password(new_password).await?;
        Ok(Route::Dashboard)
    }

    pub async fn delete_account(&self) -> Result<Route, ClientError> {
        self.api.delete_account().await?;
        self.write().end();
        Ok(Route::Login)
    }

    /// Runs the navigation guard against the current session.
    pub fn before_each(&self, to: &Route) -> Navigation {
        guard::before_each(to, &mut self.write())
    }

    /// Where navigating to `to` ends up after every redirect.
    pub fn navigate(&self, to: Route) -> Route {
        guard::resolve(to, &mut self.write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_response() -> UserResponse {
        let now = chrono::Utc::now();
        UserResponse {
            id: 5,
            email: "jane@example.com".to_string(),
            username: "jane".to_string(),
            is_verified: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_landing_route_prefers_remembered_redirect() {
        let mut session = Session::default();
        session.remember_redirect(Route::Settings);
        session.set_user(SessionUser::from(&user_response()));

        assert_eq!(session.landing_route(), Route::Settings);
        assert_eq!(session.landing_route(), Route::Profile("jane".to_string()));
    }

    #[test]
    fn test_clear_user_keeps_redirect() {
        let mut session = Session::default();
        session.set_user(SessionUser::from(&user_response()));
        session.remember_redirect(Route::Dashboard);
        session.clear_user();

        assert!(!session.is_logged_in());
        assert_eq!(session.pending_redirect(), Some(&Route::Dashboard));
    }

    #[test]
    fn test_store_guard_uses_shared_session() {
        let store = SessionStore::new(ApiClient::new("http://127.0.0.1:9").unwrap());

        assert_eq!(store.navigate(Route::Dashboard), Route::Login);
        assert_eq!(store.session().pending_redirect(), Some(&Route::Dashboard));
        assert_eq!(store.sign_in(&user_response()), Route::Dashboard);
        assert!(store.is_logged_in());
        assert_eq!(store.before_each(&Route::Login), Navigation::Redirect(Route::Dashboard));
    }

    #[actix_rt::test]
    async fn test_logout_forgets_pending_state() {
        let store = SessionStore::new(ApiClient::new("http://127.0.0.1:9").unwrap());
        {
            let mut session = store.write();
            session.pending_verification = Some(12);
            session.remember_redirect(Route::Settings);
        }

        assert_eq!(store.logout().await, Route::Login);
        assert_eq!(store.session(), Session::default());
        assert!(matches!(
            store.resend_verification().await,
            Err(ClientError::NoPendingVerification)
        ));
    }

    #[actix_rt::test]
    async fn test_verify_without_pending_account() {
        let store = SessionStore::new(ApiClient::new("http://127.0.0.1:9").unwrap());
        assert!(matches!(
            store.verify("123456").await,
            Err(ClientError::NoPendingVerification)
        ));
    }
}
