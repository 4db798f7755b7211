use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::lifecycle::Lifecycle;

/// Registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,         // trimmed, lowercase
    pub password_hash: String, // Argon2 PHC string, never exposed
    pub first_name: String,
    pub last_name: String,
    pub lifecycle: Lifecycle,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_login_at: Option<OffsetDateTime>,
}

impl User {
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        first_name: String,
        last_name: String,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            first_name,
            last_name,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn with_profile(
        mut self,
        email: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
        now: OffsetDateTime,
    ) -> Self {
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(first_name) = first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = last_name {
            self.last_name = last_name;
        }
        self.updated_at = now;
        self
    }

    pub fn with_password_hash(mut self, password_hash: String, now: OffsetDateTime) -> Self {
        self.password_hash = password_hash;
        self.updated_at = now;
        self
    }

    pub fn logged_in(mut self, now: OffsetDateTime) -> Self {
        self.last_login_at = Some(now);
        self.updated_at = now;
        self
    }

    pub fn deactivated(mut self, now: OffsetDateTime) -> Self {
        self.lifecycle = Lifecycle::Inactive { at: now, by: Some(self.id) };
        self.updated_at = now;
        self
    }

    pub fn activated(mut self, now: OffsetDateTime) -> Self {
        self.lifecycle = Lifecycle::Active;
        self.updated_at = now;
        self
    }
}

/// Row shape of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_login_at: Option<OffsetDateTime>,
    pub deactivated_at: Option<OffsetDateTime>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            lifecycle: Lifecycle::from_columns(r.is_active, r.deactivated_at, Some(r.id), r.updated_at),
            id: r.id,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            first_name: r.first_name,
            last_name: r.last_name,
            created_at: r.created_at,
            updated_at: r.updated_at,
            last_login_at: r.last_login_at,
        }
    }
}
