//! One-time six-digit codes for email verification and password resets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rand::{rngs::OsRng, Rng};

use crate::error::AppError;

/// Wrong guesses tolerated before a code is thrown away.
pub const MAX_ATTEMPTS: u32 = 5;
/// How often [`VerificationCodes::spawn_cleanup`] sweeps expired codes.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodePurpose {
    Registration,
    PasswordReset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    /// No code was issued, it expired, or it was already used.
    Missing,
    Mismatch { attempts_left: u32 },
    /// Too many wrong guesses; the code has been discarded.
    Exhausted,
    /// A code for the same key was issued less than the resend interval ago.
    TooSoon { retry_after: Duration },
}

impl From<CodeError> for AppError {
    fn from(error: CodeError) -> AppError {
        match error {
            CodeError::Missing => AppError::BadRequest("Invalid or expired code".into()),
            CodeError::Mismatch { .. } => AppError::BadRequest("Invalid or expired code".into()),
            CodeError::Exhausted => {
                AppError::BadRequest("Too many attempts, request a new code".into())
            }
            CodeError::TooSoon { retry_after } => AppError::TooManyRequests(format!(
                "Wait {} seconds before requesting a new code",
                retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)
            )),
        }
    }
}

#[derive(Debug)]
struct Entry {
    code: String,
    expires_at: Instant,
    attempts: u32,
}

type Key = (CodePurpose, i64);

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Key, Entry>,
    /// When each key last received a code. Outlives the entry itself so a
    /// discarded code cannot be replaced right away.
    issued_at: HashMap<Key, Instant>,
}

/// Thread-safe store of pending codes keyed by purpose and user id.
#[derive(Debug, Clone)]
pub struct VerificationCodes {
    inner: Arc<Mutex<Inner>>,
    ttl: Duration,
    resend_interval: Duration,
}

fn generate_code() -> String {
    OsRng.gen_range(100_000..1_000_000u32).to_string()
}

impl VerificationCodes {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            ttl,
            resend_interval: Duration::ZERO,
        }
    }

    /// Refuses to issue another code for the same key within `interval`.
    pub fn with_resend_interval(mut self, interval: Duration) -> Self {
        self.resend_interval = interval;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn resend_interval(&self) -> Duration {
        self.resend_interval
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Issues a fresh code, replacing any previous one for the same key.
    ///
    /// Fails with [`CodeError::TooSoon`] while the resend interval of the
    /// previous code is still running; the previous code stays valid.
    pub fn issue(&self, purpose: CodePurpose, user_id: i64) -> Result<String, CodeError> {
        let key = (purpose, user_id);
        let now = Instant::now();
        let mut inner = self.lock();

        if let Some(issued_at) = inner.issued_at.get(&key) {
            let elapsed = now.saturating_duration_since(*issued_at);
            if elapsed < self.resend_interval {
                return Err(CodeError::TooSoon {
                    retry_after: self.resend_interval - elapsed,
                });
            }
        }

        let code = generate_code();
        inner.issued_at.insert(key, now);
        inner.entries.insert(
            key,
            Entry {
                code: code.clone(),
                expires_at: now + self.ttl,
                attempts: 0,
            },
        );
        Ok(code)
    }

    /// Checks `code` and consumes it on success.
    pub fn verify(&self, purpose: CodePurpose, user_id: i64, code: &str) -> Result<(), CodeError> {
        let key = (purpose, user_id);
        let mut inner = self.lock();
        let entries = &mut inner.entries;

        let mut entry = entries.remove(&key).ok_or(CodeError::Missing)?;
        if entry.expires_at <= Instant::now() {
            return Err(CodeError::Missing);
        }
        if entry.code == code {
            return Ok(());
        }

        entry.attempts += 1;
        if entry.attempts >= MAX_ATTEMPTS {
            return Err(CodeError::Exhausted);
        }
        let attempts_left = MAX_ATTEMPTS - entry.attempts;
        entries.insert(key, entry);
        Err(CodeError::Mismatch { attempts_left })
    }

    /// Drops every code for `user_id`, e.g. when the account is deleted.
    pub fn revoke_all(&self, user_id: i64) {
        let mut inner = self.lock();
        inner.entries.retain(|(_, owner), _| *owner != user_id);
        inner.issued_at.retain(|(_, owner), _| *owner != user_id);
    }

    /// Removes expired codes and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let resend_interval = self.resend_interval;
        let mut inner = self.lock();
        inner
            .issued_at
            .retain(|_, issued_at| now.saturating_duration_since(*issued_at) < resend_interval);
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.expires_at > now);
        before - inner.entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweeps expired codes every [`CLEANUP_INTERVAL`] on the actix runtime.
    pub fn spawn_cleanup(&self) -> actix_web::rt::task::JoinHandle<()> {
        let codes = self.clone();
        actix_web::rt::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                let removed = codes.purge_expired();
                if removed > 0 {
                    log::debug!("Removed {} expired verification codes", removed);
                }
            }
        })
    }
}
