use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::auth::repo::JwtTokenRepository;
use crate::auth::repo_types::JwtToken;
use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};

pub const REASON_LOGOUT: &str = "logout";
pub const REASON_REFRESHED: &str = "refreshed";
pub const REASON_PASSWORD_CHANGED: &str = "password_changed";
pub const REASON_ACCOUNT_DEACTIVATED: &str = "account_deactivated";

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes.max(0) as u64) * 60),
        }
    }

    pub fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }
}

/// SHA-256 of the raw token, hex-encoded. This is what gets stored.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
    pub expires_at: OffsetDateTime,
}

/// Issues, validates, rotates and revokes signed session tokens.
/// Every issued token is recorded by hash so it can be revoked before expiry.
pub struct TokenService {
    keys: JwtKeys,
    tokens: Arc<dyn JwtTokenRepository>,
}

impl TokenService {
    pub fn new(keys: JwtKeys, tokens: Arc<dyn JwtTokenRepository>) -> Self {
        Self { keys, tokens }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub fn hash(&self, token: &str) -> String {
        hash_token(token)
    }

    /// Signs a token for the user and records its hash.
    #[instrument(skip(self, username, email, extra))]
    pub async fn generate(
        &self,
        user_id: Uuid,
        username: &str,
        email: &str,
        kind: TokenKind,
        ttl: Duration,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> AppResult<IssuedToken> {
        let now = OffsetDateTime::now_utc();
        let expires_at = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            email: email.to_string(),
            iat: now.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
            iss: self.keys.issuer.clone(),
            aud: self.keys.audience.clone(),
            kind,
            jti: Uuid::new_v4(),
            extra,
        };
        let token = encode(&Header::default(), &claims, &self.keys.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("jwt encode: {e}")))?;

        self.tokens
            .insert(&JwtToken {
                id: claims.jti,
                user_id,
                token_hash: self.hash(&token),
                kind,
                issued_at: now,
                expires_at,
                revocation: None,
            })
            .await?;

        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(IssuedToken {
            token,
            claims,
            expires_at,
        })
    }

    /// Signs a token with the configured lifetime for its kind.
    pub async fn issue(
        &self,
        user_id: Uuid,
        username: &str,
        email: &str,
        kind: TokenKind,
    ) -> AppResult<IssuedToken> {
        let ttl = self.keys.ttl_for(kind);
        self.generate(user_id, username, email, kind, ttl, serde_json::Map::new())
            .await
    }

    /// Checks signature, expiry, issuer and audience. Stateless.
    pub fn validate(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.keys.decoding, &self.keys.validation()).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::InvalidToken("token expired".into()),
                _ => AppError::InvalidToken(e.to_string()),
            },
        )?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    /// Like [`validate`](Self::validate), and additionally rejects tokens that
    /// were revoked or were never recorded.
    pub async fn validate_with_revocation_check(&self, token: &str) -> AppResult<Claims> {
        let claims = self.validate(token)?;
        match self.tokens.find_by_hash(&self.hash(token)).await? {
            None => Err(AppError::InvalidToken("unknown token".into())),
            Some(record) if record.is_revoked() => {
                warn!(user_id = %claims.sub, "revoked token presented");
                Err(AppError::InvalidToken("token revoked".into()))
            }
            Some(record) if record.is_expired(OffsetDateTime::now_utc()) => {
                Err(AppError::InvalidToken("token expired".into()))
            }
            Some(_) => Ok(claims),
        }
    }

    /// Revokes `token` and issues a replacement of the same kind with `new_ttl`.
    #[instrument(skip(self, token))]
    pub async fn refresh(&self, token: &str, new_ttl: Duration) -> AppResult<IssuedToken> {
        let claims = self.validate_with_revocation_check(token).await?;
        let revoked = self
            .tokens
            .revoke(&self.hash(token), REASON_REFRESHED, OffsetDateTime::now_utc())
            .await?;
        if !revoked {
            // lost a race with another refresh/logout of the same token
            return Err(AppError::InvalidToken("token revoked".into()));
        }
        self.generate(
            claims.sub,
            &claims.username,
            &claims.email,
            claims.kind,
            new_ttl,
            claims.extra,
        )
        .await
    }

    /// Idempotent for tokens that are already revoked.
    #[instrument(skip(self, token))]
    pub async fn revoke(&self, token: &str, reason: &str) -> AppResult<()> {
        let token_hash = self.hash(token);
        let record = self
            .tokens
            .find_by_hash(&token_hash)
            .await?
            .ok_or(AppError::TokenNotFound)?;
        if record.is_revoked() {
            return Ok(());
        }
        self.tokens
            .revoke(&token_hash, reason, OffsetDateTime::now_utc())
            .await?;
        info!(user_id = %record.user_id, reason, "token revoked");
        Ok(())
    }

    pub async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> AppResult<u64> {
        let count = self
            .tokens
            .revoke_all_for_user(user_id, reason, OffsetDateTime::now_utc())
            .await?;
        info!(%user_id, reason, count, "user tokens revoked");
        Ok(count)
    }

    /// Deletes records whose expiry is older than `retention`.
    pub async fn purge_expired(&self, retention: TimeDuration) -> AppResult<u64> {
        let cutoff = OffsetDateTime::now_utc() - retention;
        let count = self.tokens.delete_expired_before(cutoff).await?;
        if count > 0 {
            info!(count, "expired tokens purged");
        }
        Ok(count)
    }
}
