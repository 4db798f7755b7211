use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::map_write_error;
use crate::pagination::Pagination;
use crate::users::repo_types::{User, UserRow};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn exists_by_username(&self, username: &str) -> anyhow::Result<bool>;
    async fn exists_by_email(&self, email: &str) -> anyhow::Result<bool>;
    async fn insert(&self, user: &User) -> anyhow::Result<User>;
    /// Persists every mutable column of `user`, lifecycle included.
    async fn update(&self, user: &User) -> anyhow::Result<User>;
    async fn find_all_active(&self, page: Pagination) -> anyhow::Result<Vec<User>>;
    /// Case-insensitive substring match on username, active users only.
    async fn search_by_username(&self, pattern: &str, page: Pagination) -> anyhow::Result<Vec<User>>;
}

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
    is_active, created_at, updated_at, last_login_at, deactivated_at";

/// Escapes LIKE metacharacters so user input matches literally.
pub(crate) fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {column}"))?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(row.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one("email", email).await
    }

    async fn exists_by_username(&self, username: &str) -> anyhow::Result<bool> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)"#)
                .bind(username)
                .fetch_one(&self.db)
                .await
                .context("exists user by username")?;
        Ok(exists)
    }

    async fn exists_by_email(&self, email: &str) -> anyhow::Result<bool> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)"#)
                .bind(email)
                .fetch_one(&self.db)
                .await
                .context("exists user by email")?;
        Ok(exists)
    }

    async fn insert(&self, user: &User) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name,
                               is_active, created_at, updated_at, last_login_at, deactivated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.lifecycle.is_active())
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(user.last_login_at)
            .bind(user.lifecycle.deactivated_at())
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_write_error(e, "insert user"))?;
        Ok(row.into())
    }

    async fn update(&self, user: &User) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET email = $2, password_hash = $3, first_name = $4, last_name = $5,
                   is_active = $6, updated_at = $7, last_login_at = $8, deactivated_at = $9
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.lifecycle.is_active())
            .bind(user.updated_at)
            .bind(user.last_login_at)
            .bind(user.lifecycle.deactivated_at())
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_write_error(e, "update user"))?;
        Ok(row.into())
    }

    async fn find_all_active(&self, page: Pagination) -> anyhow::Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_active ORDER BY username LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.db)
            .await
            .context("list active users")?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn search_by_username(&self, pattern: &str, page: Pagination) -> anyhow::Result<Vec<User>> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE is_active AND username ILIKE $1
             ORDER BY username
             LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(like_pattern(pattern))
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.db)
            .await
            .context("search users by username")?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
