use std::{sync::Arc, time::Duration};

use crate::{
    auth::TokenService, config::Config, error::AppError, mailer::Mailer, store::Store,
    verification::VerificationCodes,
};

/// Shared application state handed to every handler through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub codes: VerificationCodes,
    pub mailer: Arc<dyn Mailer>,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            store,
            tokens: TokenService::new(
                &config.jwt_secret,
                chrono::Duration::hours(config.token_ttl_hours),
            )?,
            codes: VerificationCodes::new(Duration::from_secs(config.verification_code_ttl_secs))
                .with_resend_interval(Duration::from_secs(config.verification_resend_secs)),
            mailer,
            bcrypt_cost: config.bcrypt_cost,
            cookie_secure: config.cookie_secure,
        })
    }

    /// Lifetime of one-time codes in whole minutes, for email copy.
    pub fn code_ttl_minutes(&self) -> u64 {
        (self.codes.ttl().as_secs() + 59) / 60
    }
}
