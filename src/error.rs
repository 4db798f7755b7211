use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::db::UniqueViolation;

pub type AppResult<T> = Result<T, AppError>;

/// Field name -> message map collected while validating a command.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("movie not found: {0}")]
    MovieNotFound(Uuid),

    #[error("rating not found: {0}")]
    RatingNotFound(Uuid),

    #[error("token not found")]
    TokenNotFound,

    #[error("movie '{title}' ({year}) already exists")]
    DuplicateMovie { title: String, year: i32 },

    #[error("user {user_id} has already rated movie {movie_id}")]
    DuplicateRating { movie_id: Uuid, user_id: Uuid },

    #[error("username is already taken: {0}")]
    UsernameAlreadyExists(String),

    #[error("email is already registered: {0}")]
    EmailAlreadyExists(String),

    #[error("user {user_id} is not allowed to {operation} resource {resource_id}")]
    UnauthorizedMovieOperation {
        resource_id: Uuid,
        user_id: Uuid,
        operation: &'static str,
    },

    #[error("invalid credentials")]
    AuthenticationFailed,

    #[error("user account is inactive")]
    UserAccountInactive,

    #[error("current password is incorrect")]
    InvalidPassword,

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }

    pub fn unauthorized(resource_id: Uuid, user_id: Uuid, operation: &'static str) -> Self {
        AppError::UnauthorizedMovieOperation {
            resource_id,
            user_id,
            operation,
        }
    }

    /// Maps a storage unique violation through `on_conflict`; anything else is internal.
    pub fn from_write(err: anyhow::Error, on_conflict: impl FnOnce(&str) -> Option<AppError>) -> Self {
        let conflict = UniqueViolation::constraint_of(&err).and_then(on_conflict);
        conflict.unwrap_or(AppError::Internal(err))
    }

    /// Stable machine-readable code rendered in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::UserNotFound(_) => "USER_NOT_FOUND",
            AppError::MovieNotFound(_) => "MOVIE_NOT_FOUND",
            AppError::RatingNotFound(_) => "RATING_NOT_FOUND",
            AppError::TokenNotFound => "TOKEN_NOT_FOUND",
            AppError::DuplicateMovie { .. } => "DUPLICATE_MOVIE",
            AppError::DuplicateRating { .. } => "DUPLICATE_RATING",
            AppError::UsernameAlreadyExists(_) => "USERNAME_ALREADY_EXISTS",
            AppError::EmailAlreadyExists(_) => "EMAIL_ALREADY_EXISTS",
            AppError::UnauthorizedMovieOperation { .. } => "UNAUTHORIZED_OPERATION",
            AppError::AuthenticationFailed => "AUTHENTICATION_FAILED",
            AppError::UserAccountInactive => "USER_ACCOUNT_INACTIVE",
            AppError::InvalidPassword => "INVALID_PASSWORD",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidToken(_) => "INVALID_TOKEN",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UserNotFound(_)
            | AppError::MovieNotFound(_)
            | AppError::RatingNotFound(_)
            | AppError::TokenNotFound => StatusCode::NOT_FOUND,
            AppError::DuplicateMovie { .. }
            | AppError::DuplicateRating { .. }
            | AppError::UsernameAlreadyExists(_)
            | AppError::EmailAlreadyExists(_) => StatusCode::CONFLICT,
            AppError::UnauthorizedMovieOperation { .. } | AppError::UserAccountInactive => {
                StatusCode::FORBIDDEN
            }
            AppError::AuthenticationFailed | AppError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidPassword | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let fields = match &self {
            AppError::Validation(f) => Some(f),
            _ => None,
        };
        let body = ErrorBody {
            error: self.code(),
            message,
            fields,
        };
        (status, Json(body)).into_response()
    }
}
