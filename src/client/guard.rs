//! Client-side routes and the pre-navigation check.

use std::fmt;

use super::session::Session;
use crate::auth::is_reserved_username;

/// Redirect chains longer than this are cut short at the last target.
const MAX_REDIRECTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    Login,
    SignUp,
    /// Entering the emailed registration code.
    Verify,
    RecoverPassword,
    /// Choosing a new password after signing in with a reset code.
    EditPassword,
    Dashboard,
    Settings,
    Profile(String),
    NotFound,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    /// Only reachable with a session; logged-out visitors go to the login page.
    pub requires_auth: bool,
    /// Auth pages that make no sense once signed in.
    pub hide_for_logged: bool,
}

impl Route {
    pub fn meta(&self) -> RouteMeta {
        match self {
            Route::Login | Route::SignUp | Route::Verify | Route::RecoverPassword => RouteMeta {
                requires_auth: false,
                hide_for_logged: true,
            },
            Route::EditPassword | Route::Dashboard | Route::Settings => RouteMeta {
                requires_auth: true,
                hide_for_logged: false,
            },
            Route::Root | Route::Profile(_) | Route::NotFound => RouteMeta::default(),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Root => "/".to_string(),
            Route::Login => "/auth/login".to_string(),
            Route::SignUp => "/auth/sign-up".to_string(),
            Route::Verify => "/auth/verify".to_string(),
            Route::RecoverPassword => "/auth/password/recover".to_string(),
            Route::EditPassword => "/auth/password/edit".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Settings => "/settings".to_string(),
            Route::Profile(username) => format!("/{}", username),
            Route::NotFound => "/404".to_string(),
        }
    }

    /// Maps a location path back to its route. Unknown paths are [`Route::NotFound`].
    pub fn from_path(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Route::Root,
            "/auth/login" => Route::Login,
            "/auth/sign-up" => Route::SignUp,
            "/auth/verify" => Route::Verify,
            "/auth/password/recover" => Route::RecoverPassword,
            "/auth/password/edit" => Route::EditPassword,
            "/dashboard" => Route::Dashboard,
            "/settings" => Route::Settings,
            "/404" => Route::NotFound,
            other => match other.strip_prefix('/') {
                Some(username) if is_username(username) => Route::Profile(username.to_string()),
                _ => Route::NotFound,
            },
        }
    }
}

fn is_username(segment: &str) -> bool {
    !is_reserved_username(segment)
        && (3..=20).contains(&segment.len())
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect(Route),
}

/// Runs before every navigation to `to`.
///
/// Protected routes send logged-out visitors to the login page and remember
/// where they were going. Auth pages send signed-in users to the dashboard.
pub fn before_each(to: &Route, session: &mut Session) -> Navigation {
    let logged_in = session.is_logged_in();

    if *to == Route::Root {
        return Navigation::Redirect(if logged_in {
            Route::Dashboard
        } else {
            Route::Login
        });
    }

    let meta = to.meta();
    if meta.requires_auth && !logged_in {
        session.remember_redirect(to.clone());
        return Navigation::Redirect(Route::Login);
    }
    if meta.hide_for_logged && logged_in {
        return Navigation::Redirect(Route::Dashboard);
    }
    Navigation::Proceed
}

/// Follows [`before_each`] redirects and returns where navigation ends up.
pub fn resolve(to: Route, session: &mut Session) -> Route {
    let mut current = to;
    for _ in 0..MAX_REDIRECTS {
        match before_each(&current, session) {
            Navigation::Proceed => return current,
            Navigation::Redirect(next) => current = next,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SessionUser;
    use pretty_assertions::assert_eq;

    fn signed_in() -> Session {
        let mut session = Session::default();
        session.set_user(SessionUser {
            id: 1,
            email: "jane@example.com".to_string(),
            username: "jane".to_string(),
        });
        session
    }

    #[test]
    fn test_protected_routes_redirect_to_login() {
        let mut session = Session::default();

        assert_eq!(
            before_each(&Route::Settings, &mut session),
            Navigation::Redirect(Route::Login)
        );
        assert_eq!(session.pending_redirect(), Some(&Route::Settings));
    }

    #[test]
    fn test_auth_pages_hidden_when_logged_in() {
        let mut session = signed_in();

        for route in [Route::Login, Route::SignUp, Route::Verify, Route::RecoverPassword] {
            assert_eq!(
                before_each(&route, &mut session),
                Navigation::Redirect(Route::Dashboard)
            );
        }
        assert_eq!(before_each(&Route::Settings, &mut session), Navigation::Proceed);
    }

    #[test]
    fn test_public_routes_always_proceed() {
        let mut anonymous = Session::default();
        let mut member = signed_in();
        let profile = Route::Profile("bob".to_string());

        assert_eq!(before_each(&profile, &mut anonymous), Navigation::Proceed);
        assert_eq!(before_each(&profile, &mut member), Navigation::Proceed);
        assert_eq!(anonymous.pending_redirect(), None);
    }

    #[test]
    fn test_resolve_follows_redirect_chain() {
        assert_eq!(resolve(Route::Root, &mut Session::default()), Route::Login);
        assert_eq!(resolve(Route::Root, &mut signed_in()), Route::Dashboard);
        assert_eq!(resolve(Route::Login, &mut signed_in()), Route::Dashboard);
    }

    #[test]
    fn test_paths_round_trip() {
        for route in [
            Route::Root,
            Route::Login,
            Route::SignUp,
            Route::Verify,
            Route::RecoverPassword,
            Route::EditPassword,
            Route::Dashboard,
            Route::Settings,
            Route::Profile("jane_doe".to_string()),
            Route::NotFound,
        ] {
            assert_eq!(Route::from_path(&route.path()), route);
        }
        assert_eq!(Route::from_path("/dashboard/?tab=1"), Route::Dashboard);
        assert_eq!(Route::from_path("/a/b/c"), Route::NotFound);
        assert_eq!(Route::from_path("/x"), Route::NotFound);
        assert_eq!(Route::from_path("/auth"), Route::NotFound);
        assert_eq!(Route::from_path("/auth/"), Route::NotFound);
    }
}
