use std::{env, fmt};

/// Minimum accepted length for the HMAC secret used to sign access tokens.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, reason } => write!(f, "{} is invalid: {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Credentials for the outgoing SMTP relay.
#[derive(Clone)]
pub struct SmtpSettings {
    pub relay: String,
    pub username: String,
    pub password: String,
    pub sender_email: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("relay", &self.relay)
            .field("username", &self.username)
            .field("sender_email", &self.sender_email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub server_port: u16,
    pub server_host: String,
    /// Origin of the web client, allowed by CORS with credentials.
    pub website_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub verification_code_ttl_secs: u64,
    /// Minimum delay before a new code may be issued for the same account and purpose.
    pub verification_resend_secs: u64,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
    /// `None` when no SMTP credentials are configured; mail then goes to the log.
    pub smtp: Option<SmtpSettings>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: format!("must be at least {} characters", MIN_JWT_SECRET_LEN),
            });
        }

        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", 12u32)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                reason: "must be between 4 and 31".into(),
            });
        }

        let token_ttl_hours = parse_or(&lookup, "TOKEN_TTL_HOURS", 12i64)?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_HOURS",
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5u32)?,
            server_port: parse_or(&lookup, "SERVER_PORT", 8080u16)?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            website_url: lookup("WEBSITE_URL")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            jwt_secret,
            token_ttl_hours,
            verification_code_ttl_secs: parse_or(&lookup, "VERIFICATION_CODE_TTL_SECS", 300u64)?,
            verification_resend_secs: parse_or(&lookup, "VERIFICATION_RESEND_SECS", 60u64)?,
            bcrypt_cost,
            cookie_secure: parse_or(&lookup, "COOKIE_SECURE", false)?,
            smtp: smtp_settings(&lookup)?,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

/// SMTP is optional, but once any credential is given all three are required.
fn smtp_settings<F>(lookup: &F) -> Result<Option<SmtpSettings>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let username = value("SMTP_USERNAME");
    let password = value("SMTP_PASSWORD");
    let sender_email = value("SMTP_SENDER_EMAIL");
    if username.is_none() && password.is_none() && sender_email.is_none() {
        return Ok(None);
    }

    Ok(Some(SmtpSettings {
        relay: value("SMTP_RELAY").unwrap_or_else(|| "smtp.gmail.com".to_string()),
        username: username.ok_or(ConfigError::Missing("SMTP_USERNAME"))?,
        password: password.ok_or(ConfigError::Missing("SMTP_PASSWORD"))?,
        sender_email: sender_email.ok_or(ConfigError::Missing("SMTP_SENDER_EMAIL"))?,
    }))
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
