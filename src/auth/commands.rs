use crate::error::{AppResult, FieldErrors};
use crate::validation::MAX_PASSWORD_LEN;

/// Login input. `username_or_email` is dispatched on the presence of `@`.
#[derive(Debug, Clone)]
pub struct AuthenticationCommand {
    pub username_or_email: String,
    pub password: String,
}

impl AuthenticationCommand {
    pub fn new(username_or_email: &str, password: &str) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        let identifier = username_or_email.trim();
        if identifier.is_empty() {
            errors.add("username_or_email", "must not be blank");
        }
        if password.is_empty() {
            errors.add("password", "must not be blank");
        } else if password.len() > MAX_PASSWORD_LEN {
            errors.add("password", "is too long");
        }
        errors.into_result()?;
        Ok(Self {
            username_or_email: identifier.to_string(),
            password: password.to_string(),
        })
    }

    pub fn is_email(&self) -> bool {
        self.username_or_email.contains('@')
    }
}
