use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::traits::{StorageError, StorageResult};

/// User account as persisted.
///
/// Not `Serialize`; clients only ever see [`UserView`], which has no password
/// or refresh-token field.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub watch_history: Vec<Uuid>,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sanitized user view returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub watch_history: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
            cover_image: user.cover_image.clone(),
            watch_history: user.watch_history.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Trim and lowercase a username or email; `None` if nothing is left
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// User creation request. `password_hash` must already be hashed.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub password_hash: String,
}

/// Partial update; `None` leaves the stored value as is.
#[derive(Debug, Default, Clone)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub password_hash: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.avatar.is_none()
            && self.cover_image.is_none()
            && self.password_hash.is_none()
    }
}

/// User store trait
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a new user. Fails with `DuplicateUser` if username or email is taken.
    async fn create_user(&self, user: NewUser) -> StorageResult<User>;

    /// Get user by ID
    async fn get_user(&self, id: Uuid) -> StorageResult<User>;

    /// Find the first user whose username or email matches exactly.
    /// Identifiers are expected to be normalized by the caller.
    async fn find_by_identifier(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StorageResult<Option<User>>;

    /// Apply a partial update and return the updated user
    async fn update_fields(&self, id: Uuid, patch: UserPatch) -> StorageResult<User>;

    /// Overwrite the refresh token slot (`None` clears it)
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StorageResult<()>;

    /// Replace the stored refresh token only if it still equals `expected`.
    /// Returns false when another writer got there first.
    async fn compare_and_swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new: &str,
    ) -> StorageResult<bool>;
}

/// PostgreSQL implementation of UserStore
pub struct PostgresUserStore {
    pool: PgPool,
}

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, watch_history, \
     password_hash, refresh_token, created_at, updated_at";

fn row_to_user(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        avatar: row.get("avatar"),
        cover_image: row.get("cover_image"),
        watch_history: row.get("watch_history"),
        password_hash: row.get("password_hash"),
        refresh_token: row.get("refresh_token"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn map_unique_violation(e: sqlx::Error, what: &str) -> StorageError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return StorageError::DuplicateUser(what.to_string());
        }
    }
    StorageError::Database(e)
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for users
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                username VARCHAR(255) UNIQUE NOT NULL,
                email VARCHAR(255) UNIQUE NOT NULL,
                full_name VARCHAR(255) NOT NULL,
                avatar TEXT NOT NULL,
                cover_image TEXT NOT NULL DEFAULT '',
                watch_history UUID[] NOT NULL DEFAULT '{}',
                password_hash VARCHAR(255) NOT NULL,
                refresh_token TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_users_full_name ON users(full_name)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        let query = format!(
            r#"
            INSERT INTO users (id, username, email, full_name, avatar, cover_image, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.full_name)
            .bind(&user.avatar)
            .bind(&user.cover_image)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &user.username))?;

        Ok(row_to_user(&row))
    }

    async fn get_user(&self, id: Uuid) -> StorageResult<User> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::UserNotFound(id))?;

        Ok(row_to_user(&row))
    }

    async fn find_by_identifier(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StorageResult<Option<User>> {
        if username.is_none() && email.is_none() {
            return Ok(None);
        }

        let query = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE ($1::text IS NOT NULL AND username = $1)
               OR ($2::text IS NOT NULL AND email = $2)
            ORDER BY created_at ASC
            LIMIT 1
            "#
        );

        let row = sqlx::query(&query)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_user))
    }

    async fn update_fields(&self, id: Uuid, patch: UserPatch) -> StorageResult<User> {
        if patch.is_empty() {
            return self.get_user(id).await;
        }

        let query = format!(
            r#"
            UPDATE users SET
                full_name = COALESCE($2, full_name),
                email = COALESCE($3, email),
                avatar = COALESCE($4, avatar),
                cover_image = COALESCE($5, cover_image),
                password_hash = COALESCE($6, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        let conflict_hint = patch.email.clone().unwrap_or_default();
        let row = sqlx::query(&query)
            .bind(id)
            .bind(patch.full_name)
            .bind(patch.email)
            .bind(patch.avatar)
            .bind(patch.cover_image)
            .bind(patch.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &conflict_hint))?
            .ok_or(StorageError::UserNotFound(id))?;

        Ok(row_to_user(&row))
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET refresh_token = $2 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::UserNotFound(id));
        }

        Ok(())
    }

    async fn compare_and_swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new: &str,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET refresh_token = $3 WHERE id = $1 AND refresh_token = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
