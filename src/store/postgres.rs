use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use super::{Store, StoreError};
use crate::models::{
    EmploymentType, Experience, ExperienceInput, LocationType, NewUser, Page, Skill, User,
    UserSummary,
};

const USER_COLUMNS: &str =
    "id, email, username, password_hash, is_verified, created_at, updated_at";

const EXPERIENCE_COLUMNS: &str = "id, user_id, company_name, occupation, location_name, \
     location_type, employment_type, start_date, end_date, is_current, description";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and applies the bundled migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        log::info!("PostgreSQL connection established");

        sqlx::migrate!()
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to apply migrations: {}", e)))?;
        log::info!("PostgreSQL migrations applied");

        Ok(Self::new(pool))
    }
}

#[derive(FromRow)]
struct ExperienceRow {
    id: i64,
    user_id: i64,
    company_name: String,
    occupation: String,
    location_name: Option<String>,
    location_type: String,
    employment_type: String,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    is_current: bool,
    description: String,
}

impl TryFrom<ExperienceRow> for Experience {
    type Error = StoreError;

    fn try_from(row: ExperienceRow) -> Result<Self, Self::Error> {
        let location_type: LocationType = row
            .location_type
            .parse()
            .map_err(|e| StoreError::Database(format!("experience.location_type: {}", e)))?;
        let employment_type: EmploymentType = row
            .employment_type
            .parse()
            .map_err(|e| StoreError::Database(format!("experience.employment_type: {}", e)))?;

        Ok(Experience {
            id: row.id,
            user_id: row.user_id,
            company_name: row.company_name,
            occupation: row.occupation,
            location_name: row.location_name,
            location_type,
            employment_type,
            start_date: row.start_date,
            end_date: row.end_date,
            is_current: row.is_current,
            description: row.description,
        })
    }
}

fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (email, username, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.email)
            .bind(&new_user.username)
            .bind(&new_user.password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete_unverified_user(&self, email: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE email = $1 AND is_verified = FALSE")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {} FROM users WHERE email = LOWER($1) OR username = $1 LIMIT 1",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn mark_user_verified(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
                .bind(password_hash)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO follows (follower_id, followed_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
            .bind(follower_id)
            .bind(followed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn follower_count(&self, user_id: i64) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM follows WHERE followed_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn following_count(&self, user_id: i64) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn followers(&self, user_id: i64, page: Page) -> Result<Vec<UserSummary>, StoreError> {
        Ok(sqlx::query_as::<_, UserSummary>(
            "SELECT u.id, u.username FROM follows f \
             JOIN users u ON u.id = f.follower_id \
             WHERE f.followed_id = $1 \
             ORDER BY f.created_at DESC, u.id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn following(&self, user_id: i64, page: Page) -> Result<Vec<UserSummary>, StoreError> {
        Ok(sqlx::query_as::<_, UserSummary>(
            "SELECT u.id, u.username FROM follows f \
             JOIN users u ON u.id = f.followed_id \
             WHERE f.follower_id = $1 \
             ORDER BY f.created_at DESC, u.id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_experience(
        &self,
        user_id: i64,
        input: &ExperienceInput,
    ) -> Result<Experience, StoreError> {
        let sql = format!(
            "INSERT INTO experience (user_id, company_name, occupation, location_name, \
             location_type, employment_type, start_date, end_date, is_current, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            EXPERIENCE_COLUMNS
        );
        let row = sqlx::query_as::<_, ExperienceRow>(&sql)
            .bind(user_id)
            .bind(&input.company_name)
            .bind(&input.occupation)
            .bind(&input.location_name)
            .bind(input.location_type.as_str())
            .bind(input.employment_type.as_str())
            .bind(input.start_date)
            .bind(input.end_date)
            .bind(input.is_current)
            .bind(&input.description)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn update_experience(
        &self,
        id: i64,
        user_id: i64,
        input: &ExperienceInput,
    ) -> Result<Option<Experience>, StoreError> {
        let sql = format!(
            "UPDATE experience SET company_name = $3, occupation = $4, location_name = $5, \
             location_type = $6, employment_type = $7, start_date = $8, end_date = $9, \
             is_current = $10, description = $11 \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            EXPERIENCE_COLUMNS
        );
        let row = sqlx::query_as::<_, ExperienceRow>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(&input.company_name)
            .bind(&input.occupation)
            .bind(&input.location_name)
            .bind(input.location_type.as_str())
            .bind(input.employment_type.as_str())
            .bind(input.start_date)
            .bind(input.end_date)
            .bind(input.is_current)
            .bind(&input.description)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Experience::try_from).transpose()
    }

    async fn delete_experience(&self, id: i64, user_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM experience WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn experiences_for_user(&self, user_id: i64) -> Result<Vec<Experience>, StoreError> {
        let sql = format!(
            "SELECT {} FROM experience WHERE user_id = $1 ORDER BY start_date DESC, id DESC",
            EXPERIENCE_COLUMNS
        );
        sqlx::query_as::<_, ExperienceRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Experience::try_from)
            .collect()
    }

    async fn search_skills(
        &self,
        query: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Skill>, StoreError> {
        let pattern = query.map(like_pattern);
        Ok(sqlx::query_as::<_, Skill>(
            "SELECT id, name FROM skills \
             WHERE ($1::TEXT IS NULL OR name ILIKE $1) \
             ORDER BY name LIMIT $2",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn user_skills(&self, user_id: i64) -> Result<Vec<Skill>, StoreError> {
        Ok(sqlx::query_as::<_, Skill>(
            "SELECT s.id, s.name FROM skills s \
             JOIN user_skills us ON us.skill_id = s.id \
             WHERE us.user_id = $1 ORDER BY s.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn replace_user_skills(
        &self,
        user_id: i64,
        skill_ids: &[i64],
    ) -> Result<Vec<Skill>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let known: Vec<(i64,)> = sqlx::query_as("SELECT id FROM skills WHERE id = ANY($1)")
            .bind(skill_ids)
            .fetch_all(&mut *tx)
            .await?;
        if let Some(unknown) = skill_ids
            .iter()
            .find(|id| !known.iter().any(|(known_id,)| known_id == *id))
        {
            return Err(StoreError::UnknownSkill(*unknown));
        }

        sqlx::query("DELETE FROM user_skills WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if !skill_ids.is_empty() {
            sqlx::query(
                "INSERT INTO user_skills (user_id, skill_id) \
                 SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(skill_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.user_skills(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }
}
