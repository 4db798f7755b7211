use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::config::AppConfig;

pub const USERS_USERNAME_KEY: &str = "users_username_key";
pub const USERS_EMAIL_KEY: &str = "users_email_key";
pub const MOVIES_ACTIVE_TITLE_YEAR_IDX: &str = "movies_active_title_year_idx";
pub const MOVIE_RATINGS_ACTIVE_MOVIE_USER_IDX: &str = "movie_ratings_active_movie_user_idx";
pub const JWT_TOKENS_TOKEN_HASH_KEY: &str = "jwt_tokens_token_hash_key";

/// Storage rejected a write because of a unique constraint.
/// Travels inside `anyhow::Error` so services can map it to a conflict.
#[derive(Debug, Error)]
#[error("unique constraint violated: {constraint}")]
pub struct UniqueViolation {
    pub constraint: String,
}

impl UniqueViolation {
    pub fn new(constraint: impl Into<String>) -> Self {
        Self {
            constraint: constraint.into(),
        }
    }

    /// Returns the violated constraint name if `err` carries a unique violation.
    pub fn constraint_of(err: &anyhow::Error) -> Option<&str> {
        err.downcast_ref::<UniqueViolation>()
            .map(|v| v.constraint.as_str())
    }
}

/// Converts a sqlx error into anyhow, lifting unique violations into [`UniqueViolation`].
pub fn map_write_error(err: sqlx::Error, what: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            return UniqueViolation { constraint }.into();
        }
    }
    anyhow::Error::new(err).context(what)
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}
