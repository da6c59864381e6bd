use crate::{config::MIN_JWT_SECRET_LEN, error::AppError, models::User};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims encoded within an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: i64,
    pub email: String,
    pub username: String,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiration, seconds since epoch.
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// The identity attached to a request once its token has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: i64,
    pub email: String,
    pub username: String,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            username: claims.username,
        }
    }
}

/// Signs and verifies HS256 access tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    /// Fails when the secret is shorter than [`MIN_JWT_SECRET_LEN`] bytes.
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, AppError> {
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(AppError::InternalServerError(format!(
                "JWT secret must be at least {} characters",
                MIN_JWT_SECRET_LEN
            )));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generates a token for `user` that expires after the configured TTL.
    pub fn generate_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies the signature, the algorithm and the expiration of `token`.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_for_gen_verify_0123456789";

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 7,
            email: "seven@example.com".to_string(),
            username: "seven".to_string(),
            password_hash: String::new(),
            is_verified: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn service() -> TokenService {
        TokenService::new(SECRET, Duration::hours(12)).unwrap()
    }

    #[test]
    fn test_rejects_short_secret() {
        assert!(TokenService::new("short", Duration::hours(1)).is_err());
    }

    #[test]
    fn test_token_generation_and_verification() {
        let tokens = service();
        let token = tokens.generate_token(&user()).unwrap();
        let claims = tokens.verify_token(&token).unwrap();

        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "seven");
        assert_eq!(claims.exp - claims.iat, Duration::hours(12).num_seconds());
        assert!(!claims.jti.is_empty());

        let current = CurrentUser::from(claims);
        assert_eq!(current.user_id, 7);
        assert_eq!(current.email, "seven@example.com");
    }

    #[test]
    fn test_each_token_gets_a_unique_id() {
        let tokens = service();
        let first = tokens.verify_token(&tokens.generate_token(&user()).unwrap()).unwrap();
        let second = tokens.verify_token(&tokens.generate_token(&user()).unwrap()).unwrap();
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn test_token_expiration() {
        let tokens = service();
        let issued = Utc::now() - Duration::hours(3);
        let expired = tokens
            .encode_claims(&Claims {
                sub: 2,
                email: "two@example.com".to_string(),
                username: "two".to_string(),
                iat: issued.timestamp(),
                exp: (issued + Duration::hours(1)).timestamp(),
                jti: Uuid::new_v4().to_string(),
            })
            .unwrap();

        match tokens.verify_token(&expired) {
            Err(AppError::Unauthorized(msg)) => assert!(msg.contains("ExpiredSignature"), "{}", msg),
            other => panic!("Expected expired token to be rejected, got {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn test_invalid_token_signature() {
        let other = TokenService::new("a_completely_different_secret_value!", Duration::hours(1))
            .unwrap();
        let token = other.generate_token(&user()).unwrap();

        match service().verify_token(&token) {
            Err(AppError::Unauthorized(msg)) => assert!(msg.contains("InvalidSignature"), "{}", msg),
            other => panic!("Expected signature mismatch, got {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn test_rejects_other_algorithms() {
        let now = Utc::now();
        let claims = Claims {
            sub: 1,
            email: "one@example.com".to_string(),
            username: "one".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            service().verify_token(&hs512),
            Err(AppError::Unauthorized(_))
        ));
        assert!(service().verify_token("not.a.token").is_err());
    }
}
