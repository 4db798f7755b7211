use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::PasswordEncoder;
use crate::db::{USERS_EMAIL_KEY, USERS_USERNAME_KEY};
use crate::error::{AppError, AppResult};
use crate::pagination::Pagination;
use crate::users::commands::{ChangePasswordCommand, RegisterUserCommand, UpdateUserProfileCommand};
use crate::users::repo::UserRepository;
use crate::users::repo_types::User;
use crate::validation::{is_blank, normalize_email};

fn user_conflict(user: &User) -> impl FnOnce(&str) -> Option<AppError> + '_ {
    move |constraint: &str| match constraint {
        USERS_USERNAME_KEY => Some(AppError::UsernameAlreadyExists(user.username.clone())),
        USERS_EMAIL_KEY => Some(AppError::EmailAlreadyExists(user.email.clone())),
        _ => None,
    }
}

pub struct RegisterUserService {
    users: Arc<dyn UserRepository>,
    passwords: Arc<dyn PasswordEncoder>,
}

impl RegisterUserService {
    pub fn new(users: Arc<dyn UserRepository>, passwords: Arc<dyn PasswordEncoder>) -> Self {
        Self { users, passwords }
    }

    async fn ensure_username_free(&self, username: &str) -> AppResult<()> {
        if self.users.exists_by_username(username).await? {
            warn!(%username, "username already taken");
            return Err(AppError::UsernameAlreadyExists(username.to_string()));
        }
        Ok(())
    }

    async fn ensure_email_free(&self, email: &str) -> AppResult<()> {
        if self.users.exists_by_email(email).await? {
            warn!(%email, "email already registered");
            return Err(AppError::EmailAlreadyExists(email.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self, cmd), fields(username = %cmd.username))]
    pub async fn register_user(&self, cmd: RegisterUserCommand) -> AppResult<User> {
        tokio::try_join!(
            self.ensure_username_free(&cmd.username),
            self.ensure_email_free(&cmd.email),
        )?;

        let password_hash = self.passwords.hash(&cmd.password).await?;
        let user = User::new(
            cmd.username,
            cmd.email,
            password_hash,
            cmd.first_name,
            cmd.last_name,
            OffsetDateTime::now_utc(),
        );
        let saved = self
            .users
            .insert(&user)
            .await
            .map_err(|e| AppError::from_write(e, user_conflict(&user)))?;

        info!(user_id = %saved.id, "user registered");
        Ok(saved)
    }

    /// False for a missing or blank username.
    pub async fn is_username_available(&self, username: Option<&str>) -> AppResult<bool> {
        match username {
            Some(u) if !is_blank(Some(u)) => Ok(!self.users.exists_by_username(u.trim()).await?),
            _ => Ok(false),
        }
    }

    /// False for a missing or blank email.
    pub async fn is_email_available(&self, email: Option<&str>) -> AppResult<bool> {
        match email {
            Some(e) if !is_blank(Some(e)) => {
                Ok(!self.users.exists_by_email(&normalize_email(e)).await?)
            }
            _ => Ok(false),
        }
    }
}

pub struct ManageUserProfileService {
    users: Arc<dyn UserRepository>,
    passwords: Arc<dyn PasswordEncoder>,
}

impl ManageUserProfileService {
    pub fn new(users: Arc<dyn UserRepository>, passwords: Arc<dyn PasswordEncoder>) -> Self {
        Self { users, passwords }
    }

    async fn load(&self, user_id: Uuid) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }

    pub async fn get_user_profile(&self, user_id: Uuid) -> AppResult<User> {
        self.load(user_id).await
    }

    #[instrument(skip(self, cmd))]
    pub async fn update_user_profile(
        &self,
        user_id: Uuid,
        cmd: UpdateUserProfileCommand,
    ) -> AppResult<User> {
        let user = self.load(user_id).await?;

        let email = match cmd.email {
            Some(email) if email != user.email => {
                if self.users.exists_by_email(&email).await? {
                    warn!(%user_id, %email, "email already registered");
                    return Err(AppError::EmailAlreadyExists(email));
                }
                Some(email)
            }
            _ => None,
        };

        let updated = user.with_profile(email, cmd.first_name, cmd.last_name, OffsetDateTime::now_utc());
        let saved = self
            .users
            .update(&updated)
            .await
            .map_err(|e| AppError::from_write(e, user_conflict(&updated)))?;
        info!(%user_id, "profile updated");
        Ok(saved)
    }

    #[instrument(skip(self, cmd))]
    pub async fn change_password(&self, user_id: Uuid, cmd: ChangePasswordCommand) -> AppResult<()> {
        let user = self.load(user_id).await?;
        if !user.is_active() {
            return Err(AppError::UserAccountInactive);
        }
        if !self.passwords.verify(&cmd.current_password, &user.password_hash).await? {
            warn!(%user_id, "current password mismatch");
            return Err(AppError::InvalidPassword);
        }
        let new_hash = self.passwords.hash(&cmd.new_password).await?;
        self.users
            .update(&user.with_password_hash(new_hash, OffsetDateTime::now_utc()))
            .await?;
        info!(%user_id, "password changed");
        Ok(())
    }

    /// No-op when the account is already inactive.
    #[instrument(skip(self))]
    pub async fn deactivate_user(&self, user_id: Uuid) -> AppResult<User> {
        let user = self.load(user_id).await?;
        if !user.is_active() {
            return Ok(user);
        }
        let saved = self.users.update(&user.deactivated(OffsetDateTime::now_utc())).await?;
        info!(%user_id, "user deactivated");
        Ok(saved)
    }

    /// No-op when the account is already active.
    #[instrument(skip(self))]
    pub async fn reactivate_user(&self, user_id: Uuid) -> AppResult<User> {
        let user = self.load(user_id).await?;
        if user.is_active() {
            return Ok(user);
        }
        let saved = self.users.update(&user.activated(OffsetDateTime::now_utc())).await?;
        info!(%user_id, "user reactivated");
        Ok(saved)
    }

    /// A blank pattern lists all active users.
    pub async fn search_users_by_username(
        &self,
        pattern: Option<&str>,
        page: Pagination,
    ) -> AppResult<Vec<User>> {
        let page = page.clamped();
        let users = match pattern {
            Some(p) if !is_blank(Some(p)) => self.users.search_by_username(p.trim(), page).await?,
            _ => self.users.find_all_active(page).await?,
        };
        Ok(users)
    }
}
