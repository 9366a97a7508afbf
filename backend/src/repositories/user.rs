//! Credential store access.
//!
//! The session manager only talks to [`UserRepository`]; [`PgUserRepository`]
//! backs it with PostgreSQL and [`super::memory::InMemoryUserRepository`]
//! keeps everything in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::{
    models::user::{User, UserRole},
    types::UserId,
};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("a user with this email already exists")]
    DuplicateEmail,
    #[error("stored user record is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Persistence operations the session manager needs from the credential store.
///
/// Mutations return `false` when no row matched.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>>;

    /// Fails with [`RepositoryError::DuplicateEmail`] when the email is taken.
    async fn insert(&self, user: &User) -> RepositoryResult<()>;

    async fn update_password_hash(&self, id: UserId, password_hash: &str)
        -> RepositoryResult<bool>;

    /// Unconditionally replaces the stored refresh token (login).
    async fn store_refresh_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<bool>;

    /// Compare-and-swap rotation: replaces the token only while `current` is
    /// still the stored, unexpired token.
    async fn rotate_refresh_token(
        &self,
        id: UserId,
        current: &str,
        next: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool>;

    async fn clear_refresh_token(&self, id: UserId) -> RepositoryResult<bool>;

    async fn set_approved(&self, id: UserId) -> RepositoryResult<bool>;

    async fn delete(&self, id: UserId) -> RepositoryResult<bool>;

    async fn count_by_role(&self, role: UserRole) -> RepositoryResult<i64>;

    /// Organizers still waiting for approval, oldest first.
    async fn list_pending_organizers(&self) -> RepositoryResult<Vec<User>>;
}

const USER_COLUMNS: &str = "id, email, full_name, password_hash, role, is_approved, \
     refresh_token, refresh_token_expiry_time, created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    email: String,
    full_name: String,
    password_hash: String,
    role: String,
    is_approved: bool,
    refresh_token: Option<String>,
    refresh_token_expiry_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = row
            .id
            .parse()
            .map_err(|_| RepositoryError::Corrupt(format!("invalid user id `{}`", row.id)))?;
        let role = row
            .role
            .parse()
            .map_err(|e| RepositoryError::Corrupt(format!("{}", e)))?;
        Ok(User {
            id,
            email: row.email,
            full_name: row.full_name,
            password_hash: row.password_hash,
            role,
            is_approved: row.is_approved,
            refresh_token: row.refresh_token,
            refresh_token_expiry_time: row.refresh_token_expiry_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        value: String,
    ) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, clause);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.fetch_one_where("email = $1", email.to_string()).await
    }

    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        self.fetch_one_where("id = $1", id.to_string()).await
    }

    async fn insert(&self, user: &User) -> RepositoryResult<()> {
        let result = sqlx::query(
            "INSERT INTO users (id, email, full_name, password_hash, role, is_approved, \
             refresh_token, refresh_token_expiry_time, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_approved)
        .bind(&user.refresh_token)
        .bind(user.refresh_token_expiry_time)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(RepositoryError::DuplicateEmail)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> RepositoryResult<bool> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
                .bind(password_hash)
                .bind(Utc::now())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn store_refresh_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = $1, refresh_token_expiry_time = $2, \
             updated_at = $3 WHERE id = $4",
        )
        .bind(token)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate_refresh_token(
        &self,
        id: UserId,
        current: &str,
        next: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = $1, refresh_token_expiry_time = $2, \
             updated_at = $3 \
             WHERE id = $4 AND refresh_token = $5 AND refresh_token_expiry_time > $3",
        )
        .bind(next)
        .bind(expires_at)
        .bind(now)
        .bind(id.to_string())
        .bind(current)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_refresh_token(&self, id: UserId) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = NULL, refresh_token_expiry_time = NULL, \
             updated_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_approved(&self, id: UserId) -> RepositoryResult<bool> {
        let result =
            sqlx::query("UPDATE users SET is_approved = TRUE, updated_at = $1 WHERE id = $2")
                .bind(Utc::now())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: UserId) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_role(&self, role: UserRole) -> RepositoryResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_pending_organizers(&self) -> RepositoryResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = $1 AND is_approved = FALSE ORDER BY created_at",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(UserRole::Organizer.as_str())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }
}
