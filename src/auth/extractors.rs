use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::error::AppError;
use crate::state::AppState;

/// Caller authenticated by a live, unrevoked access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub claims: Claims,
    /// Raw bearer token, kept so logout can revoke it.
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Read Authorization header
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::InvalidToken("missing Authorization header".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| AppError::InvalidToken("invalid auth scheme".into()))?;

        let claims = state.tokens.validate_with_revocation_check(token).await.map_err(|e| {
            warn!(error = %e, "rejected bearer token");
            e
        })?;
        if claims.kind != TokenKind::Access {
            return Err(AppError::InvalidToken("access token required".into()));
        }

        Ok(AuthUser {
            id: claims.sub,
            claims,
            token: token.to_string(),
        })
    }
}
