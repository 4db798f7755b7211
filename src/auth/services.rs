use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::auth::claims::TokenKind;
use crate::auth::commands::AuthenticationCommand;
use crate::auth::jwt::{IssuedToken, TokenService, REASON_LOGOUT};
use crate::auth::password::PasswordEncoder;
use crate::error::{AppError, AppResult};
use crate::users::repo::UserRepository;
use crate::users::repo_types::User;
use crate::validation::normalize_email;

/// Access and refresh token pair handed out at login and refresh.
#[derive(Debug, Clone)]
pub struct Session {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
    pub user: User,
}

pub struct UserAuthenticationService {
    users: Arc<dyn UserRepository>,
    passwords: Arc<dyn PasswordEncoder>,
    tokens: Arc<TokenService>,
}

impl UserAuthenticationService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        passwords: Arc<dyn PasswordEncoder>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            users,
            passwords,
            tokens,
        }
    }

    async fn find_account(&self, cmd: &AuthenticationCommand) -> AppResult<User> {
        let found = if cmd.is_email() {
            self.users
                .find_by_email(&normalize_email(&cmd.username_or_email))
                .await?
        } else {
            self.users.find_by_username(&cmd.username_or_email).await?
        };
        found.ok_or_else(|| AppError::UserNotFound(cmd.username_or_email.clone()))
    }

    /// Inactive accounts are rejected before the password is checked.
    #[instrument(skip(self, cmd), fields(login = %cmd.username_or_email))]
    pub async fn authenticate(&self, cmd: AuthenticationCommand) -> AppResult<User> {
        let user = self.find_account(&cmd).await?;

        if !user.is_active() {
            warn!(user_id = %user.id, "login attempt on inactive account");
            return Err(AppError::UserAccountInactive);
        }
        if !self.passwords.verify(&cmd.password, &user.password_hash).await? {
            warn!(user_id = %user.id, "invalid password");
            return Err(AppError::AuthenticationFailed);
        }
        Ok(user)
    }

    /// Password check that ignores the account state. Used before reactivation.
    #[instrument(skip(self, cmd), fields(login = %cmd.username_or_email))]
    pub async fn verify_account_owner(&self, cmd: &AuthenticationCommand) -> AppResult<User> {
        let user = self.find_account(cmd).await?;
        if !self.passwords.verify(&cmd.password, &user.password_hash).await? {
            warn!(user_id = %user.id, "invalid password");
            return Err(AppError::AuthenticationFailed);
        }
        Ok(user)
    }

    /// Any failure, including hashing or storage errors, yields `false`.
    pub async fn validate_credentials(&self, username_or_email: &str, password: &str) -> bool {
        let Ok(cmd) = AuthenticationCommand::new(username_or_email, password) else {
            return false;
        };
        match self.authenticate(cmd).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "credential check failed");
                false
            }
        }
    }

    /// Applies to inactive users as well.
    pub async fn update_last_login(&self, user_id: Uuid) -> AppResult<User> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;
        let saved = self.users.update(&user.logged_in(OffsetDateTime::now_utc())).await?;
        Ok(saved)
    }

    async fn open_session(&self, user: &User) -> AppResult<(IssuedToken, IssuedToken)> {
        tokio::try_join!(
            self.tokens.issue(user.id, &user.username, &user.email, TokenKind::Access),
            self.tokens.issue(user.id, &user.username, &user.email, TokenKind::Refresh),
        )
    }

    #[instrument(skip(self, cmd))]
    pub async fn login(&self, cmd: AuthenticationCommand) -> AppResult<Session> {
        let user = self.authenticate(cmd).await?;
        let (access, refresh) = self.open_session(&user).await?;
        let user = self.update_last_login(user.id).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(Session {
            access,
            refresh,
            user,
        })
    }

    /// Rotates a refresh token: the presented token is revoked and a new pair issued.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_session(&self, refresh_token: &str) -> AppResult<Session> {
        let claims = self.tokens.validate_with_revocation_check(refresh_token).await?;
        if claims.kind != TokenKind::Refresh {
            return Err(AppError::InvalidToken("refresh token required".into()));
        }
        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::InvalidToken("unknown user".into()))?;
        if !user.is_active() {
            return Err(AppError::UserAccountInactive);
        }

        let ttl = self.tokens.keys().ttl_for(TokenKind::Refresh);
        let refresh = self.tokens.refresh(refresh_token, ttl).await?;
        let access = self
            .tokens
            .issue(user.id, &user.username, &user.email, TokenKind::Access)
            .await?;
        info!(user_id = %user.id, "session refreshed");
        Ok(Session {
            access,
            refresh,
            user,
        })
    }

    /// Revokes the caller's access token and, if given, their refresh token.
    #[instrument(skip(self, access_token, refresh_token))]
    pub async fn logout(
        &self,
        user_id: Uuid,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> AppResult<()> {
        if let Some(refresh) = refresh_token {
            let claims = self.tokens.validate(refresh)?;
            if claims.sub != user_id {
                return Err(AppError::InvalidToken("token belongs to another user".into()));
            }
        }
        self.tokens.revoke(access_token, REASON_LOGOUT).await?;
        if let Some(refresh) = refresh_token {
            self.tokens.revoke(refresh, REASON_LOGOUT).await?;
        }
        info!(%user_id, "user logged out");
        Ok(())
    }
}
