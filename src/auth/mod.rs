pub mod cookie;
pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::UserResponse;

pub use cookie::{removal_cookie, session_cookie, ACCESS_TOKEN_COOKIE};
pub use extractors::{AuthenticatedUser, MaybeUser};
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{Claims, CurrentUser, TokenService};

lazy_static! {
    // Regex for username validation: alphanumeric, underscores, hyphens
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    static ref CODE_REGEX: regex::Regex = regex::Regex::new(r"^[0-9]{6}$").unwrap();
}

/// Path segments that would collide with a fixed `/users/*` route or a client page.
pub const RESERVED_USERNAMES: &[&str] = &[
    "register",
    "verify",
    "resend-verification",
    "login",
    "logout",
    "password",
    "auth",
    "dashboard",
    "settings",
    "404",
];

pub fn is_reserved_username(username: &str) -> bool {
    RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(username))
}

fn validate_not_reserved(username: &str) -> Result<(), ValidationError> {
    if is_reserved_username(username) {
        let mut error = ValidationError::new("reserved");
        error.message = Some("Username is reserved".into());
        return Err(error);
    }
    Ok(())
}

/// Payload for `POST /users/register`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    /// 3 to 20 characters: letters, digits, underscores or hyphens.
    #[validate(
        length(min = 3, max = 20, message = "Username must be 3 to 20 characters"),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        ),
        custom = "validate_not_reserved"
    )]
    pub username: String,
    #[validate(length(min = 6, max = 64, message = "Password must be 6 to 64 characters"))]
    pub password: String,
}

/// Payload for `POST /users/login`. `login` is an email address or a username.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 3, max = 255))]
    pub login: String,
    #[validate(length(min = 1, max = 64))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub user_id: i64,
    #[validate(regex(path = "CODE_REGEX", message = "Code must be 6 digits"))]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendVerificationRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PasswordVerifyRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(regex(path = "CODE_REGEX", message = "Code must be 6 digits"))]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 6, max = 64, message = "Password must be 6 to 64 characters"))]
    pub new_password: String,
}

/// Returned by every endpoint that starts a session. The token is also set
/// as the `access_token` cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Trims and lower-cases an email address before it is stored or looked up.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_validation() {
        let valid_login = LoginRequest {
            login: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid_login.validate().is_ok());

        let username_login = LoginRequest {
            login: "tester".to_string(),
            password: "password123".to_string(),
        };
        assert!(username_login.validate().is_ok());

        let short_login = LoginRequest {
            login: "ab".to_string(),
            password: "password123".to_string(),
        };
        assert!(short_login.validate().is_err());

        let empty_password = LoginRequest {
            login: "tester".to_string(),
            password: String::new(),
        };
        assert!(empty_password.validate().is_err());
    }

    #[test]
    fn test_register_request_validation() {
        let valid_register = RegisterRequest {
            username: "test_user-123".to_string(),
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid_register.validate().is_ok());

        let invalid_username_register = RegisterRequest {
            username: "test user!".to_string(),
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(invalid_username_register.validate().is_err());

        let short_username_register = RegisterRequest {
            username: "tu".to_string(),
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(short_username_register.validate().is_err());

        let long_username_register = RegisterRequest {
            username: "a".repeat(21),
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(long_username_register.validate().is_err());

        let long_password_register = RegisterRequest {
            username: "tester".to_string(),
            email: "test@example.com".to_string(),
            password: "x".repeat(65),
        };
        assert!(long_password_register.validate().is_err());

        let invalid_email_register = RegisterRequest {
            username: "tester".to_string(),
            email: "testexample.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(invalid_email_register.validate().is_err());

        for reserved in ["logout", "Login", "resend-verification", "dashboard"] {
            let register = RegisterRequest {
                username: reserved.to_string(),
                email: "test@example.com".to_string(),
                password: "password123".to_string(),
            };
            assert!(register.validate().is_err(), "{:?} should be reserved", reserved);
        }
    }

    #[test]
    fn test_code_format() {
        let ok = VerifyRequest {
            user_id: 1,
            code: "012345".to_string(),
        };
        assert!(ok.validate().is_ok());

        for code in ["12345", "1234567", "12a456", ""] {
            let bad = PasswordVerifyRequest {
                email: "test@example.com".to_string(),
                code: code.to_string(),
            };
            assert!(bad.validate().is_err(), "{:?} should be rejected", code);
        }
    }

    #[test]
    fn test_camel_case_payloads() {
        let verify: VerifyRequest =
            serde_json::from_str(r#"{"userId": 4, "code": "123456"}"#).unwrap();
        assert_eq!(verify.user_id, 4);

        let change: ChangePasswordRequest =
            serde_json::from_str(r#"{"newPassword": "secret123"}"#).unwrap();
        assert_eq!(change.new_password, "secret123");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }
}
