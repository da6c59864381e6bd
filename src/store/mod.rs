//! Persistence boundary.
//!
//! Handlers only talk to [`Store`]. [`PgStore`] is the production backend; [`MemoryStore`]
//! keeps everything in process and backs local runs without `DATABASE_URL` as well as the
//! integration tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::fmt;

use crate::models::{Experience, ExperienceInput, NewUser, Page, Skill, User, UserSummary};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique field (`email` or `username`) is already in use.
    Conflict(&'static str),
    /// A skill id that is not part of the catalogue.
    UnknownSkill(i64),
    Database(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::Conflict(field) => write!(f, "{} already taken", field),
            StoreError::UnknownSkill(id) => write!(f, "unknown skill {}", id),
            StoreError::Database(msg) => write!(f, "database error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db_error) = &error {
            match db_error.constraint() {
                Some("users_email_key") => return StoreError::Conflict("email"),
                Some("users_username_key") => return StoreError::Conflict("username"),
                _ => {}
            }
        }
        StoreError::Database(error.to_string())
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // Accounts

    /// Inserts an unverified account.
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;
    /// Drops a pending registration so the address can be registered again.
    async fn delete_unverified_user(&self, email: &str) -> Result<u64, StoreError>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Matches `login` against the email address or the username.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError>;
    async fn mark_user_verified(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, StoreError>;
    /// Removes the account together with its follows, experience and skills.
    async fn delete_user(&self, id: i64) -> Result<bool, StoreError>;

    // Social graph

    /// Returns `false` when the edge already existed.
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError>;
    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError>;
    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError>;
    async fn follower_count(&self, user_id: i64) -> Result<i64, StoreError>;
    async fn following_count(&self, user_id: i64) -> Result<i64, StoreError>;
    /// Users following `user_id`, most recent first.
    async fn followers(&self, user_id: i64, page: Page) -> Result<Vec<UserSummary>, StoreError>;
    /// Users `user_id` follows, most recent first.
    async fn following(&self, user_id: i64, page: Page) -> Result<Vec<UserSummary>, StoreError>;

    // Timeline

    async fn create_experience(
        &self,
        user_id: i64,
        input: &ExperienceInput,
    ) -> Result<Experience, StoreError>;
    /// `None` when the entry does not exist or belongs to someone else.
    async fn update_experience(
        &self,
        id: i64,
        user_id: i64,
        input: &ExperienceInput,
    ) -> Result<Option<Experience>, StoreError>;
    async fn delete_experience(&self, id: i64, user_id: i64) -> Result<bool, StoreError>;
    /// Entries ordered by start date, newest first.
    async fn experiences_for_user(&self, user_id: i64) -> Result<Vec<Experience>, StoreError>;

    // Skills

    /// Catalogue entries whose name contains `query`, alphabetical.
    async fn search_skills(&self, query: Option<&str>, limit: i64)
        -> Result<Vec<Skill>, StoreError>;
    async fn user_skills(&self, user_id: i64) -> Result<Vec<Skill>, StoreError>;
    /// Atomically replaces the user's skills. Fails without changes on unknown ids.
    async fn replace_user_skills(
        &self,
        user_id: i64,
        skill_ids: &[i64],
    ) -> Result<Vec<Skill>, StoreError>;
}
