use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{JwtToken, JwtTokenRow};
use crate::db::map_write_error;

#[async_trait]
pub trait JwtTokenRepository: Send + Sync {
    async fn insert(&self, token: &JwtToken) -> anyhow::Result<()>;
    async fn find_by_hash(&self, token_hash: &str) -> anyhow::Result<Option<JwtToken>>;
    /// Returns false when no unrevoked token with that hash exists.
    async fn revoke(&self, token_hash: &str, reason: &str, at: OffsetDateTime) -> anyhow::Result<bool>;
    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<u64>;
    /// Physically deletes tokens that expired before `cutoff`.
    async fn delete_expired_before(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgJwtTokenRepository {
    db: PgPool,
}

impl PgJwtTokenRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JwtTokenRepository for PgJwtTokenRepository {
    async fn insert(&self, token: &JwtToken) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jwt_tokens (id, user_id, token_hash, token_type, issued_at, expires_at,
                                    is_revoked, revoked_at, revoked_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.kind.as_db_str())
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.is_revoked())
        .bind(token.revocation.as_ref().map(|r| r.at))
        .bind(token.revocation.as_ref().map(|r| r.reason.as_str()))
        .execute(&self.db)
        .await
        .map_err(|e| map_write_error(e, "insert jwt token"))?;
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> anyhow::Result<Option<JwtToken>> {
        let row = sqlx::query_as::<_, JwtTokenRow>(
            r#"
            SELECT id, user_id, token_hash, token_type, issued_at, expires_at,
                   is_revoked, revoked_at, revoked_reason
              FROM jwt_tokens
             WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await
        .context("find jwt token by hash")?;
        row.map(JwtToken::try_from).transpose()
    }

    async fn revoke(&self, token_hash: &str, reason: &str, at: OffsetDateTime) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jwt_tokens
               SET is_revoked = TRUE, revoked_at = $2, revoked_reason = $3
             WHERE token_hash = $1 AND NOT is_revoked
            "#,
        )
        .bind(token_hash)
        .bind(at)
        .bind(reason)
        .execute(&self.db)
        .await
        .context("revoke jwt token")?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jwt_tokens
               SET is_revoked = TRUE, revoked_at = $2, revoked_reason = $3
             WHERE user_id = $1 AND NOT is_revoked AND expires_at > $2
            "#,
        )
        .bind(user_id)
        .bind(at)
        .bind(reason)
        .execute(&self.db)
        .await
        .context("revoke user jwt tokens")?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_before(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64> {
        let result = sqlx::query(r#"DELETE FROM jwt_tokens WHERE expires_at < $1"#)
            .bind(cutoff)
            .execute(&self.db)
            .await
            .context("delete expired jwt tokens")?;
        Ok(result.rows_affected())
    }
}
