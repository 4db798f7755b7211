use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::claims::TokenKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revocation {
    pub at: OffsetDateTime,
    pub reason: String,
}

/// Issued session token record. Only the hash of the raw token is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub kind: TokenKind,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub revocation: Option<Revocation>,
}

impl JwtToken {
    pub fn is_revoked(&self) -> bool {
        self.revocation.is_some()
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

/// Row shape of the `jwt_tokens` table.
#[derive(Debug, Clone, FromRow)]
pub struct JwtTokenRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub token_type: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub is_revoked: bool,
    pub revoked_at: Option<OffsetDateTime>,
    pub revoked_reason: Option<String>,
}

impl TryFrom<JwtTokenRow> for JwtToken {
    type Error = anyhow::Error;

    fn try_from(r: JwtTokenRow) -> Result<Self, Self::Error> {
        let revocation = r.is_revoked.then(|| Revocation {
            at: r.revoked_at.unwrap_or(r.issued_at),
            reason: r.revoked_reason.unwrap_or_default(),
        });
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            token_hash: r.token_hash,
            kind: TokenKind::from_db_str(&r.token_type)?,
            issued_at: r.issued_at,
            expires_at: r.expires_at,
            revocation,
        })
    }
}
