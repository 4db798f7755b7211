use crate::error::{AppResult, FieldErrors};
use crate::validation::{
    check_email, check_password, is_valid_username, required, MAX_NAME_LEN, MAX_PASSWORD_LEN,
};

/// Validated input for account registration.
#[derive(Debug, Clone)]
pub struct RegisterUserCommand {
    pub username: String,
    pub email: String, // normalized
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegisterUserCommand {
    pub fn new(
        username: &str,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> AppResult<Self> {
        let mut errors = FieldErrors::new();

        let username = required(&mut errors, "username", username, MAX_NAME_LEN);
        if let Some(u) = &username {
            if !is_valid_username(u) {
                errors.add(
                    "username",
                    "must be 3-100 characters of letters, digits, '_' or '-'",
                );
            }
        }
        let email = check_email(&mut errors, "email", email);
        check_password(&mut errors, "password", password);
        let first_name = required(&mut errors, "first_name", first_name, MAX_NAME_LEN);
        let last_name = required(&mut errors, "last_name", last_name, MAX_NAME_LEN);

        errors.into_result()?;
        Ok(Self {
            username: username.unwrap_or_default(),
            email: email.unwrap_or_default(),
            password: password.to_string(),
            first_name: first_name.unwrap_or_default(),
            last_name: last_name.unwrap_or_default(),
        })
    }
}

/// Partial profile update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserProfileCommand {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UpdateUserProfileCommand {
    pub fn new(
        email: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        let email = email.and_then(|e| check_email(&mut errors, "email", e));
        let first_name = first_name.and_then(|v| required(&mut errors, "first_name", v, MAX_NAME_LEN));
        let last_name = last_name.and_then(|v| required(&mut errors, "last_name", v, MAX_NAME_LEN));
        errors.into_result()?;
        Ok(Self {
            email,
            first_name,
            last_name,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChangePasswordCommand {
    pub current_password: String,
    pub new_password: String,
}

impl ChangePasswordCommand {
    pub fn new(current_password: &str, new_password: &str) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        if current_password.is_empty() {
            errors.add("current_password", "must not be blank");
        } else if current_password.len() > MAX_PASSWORD_LEN {
            errors.add("current_password", "is too long");
        }
        check_password(&mut errors, "new_password", new_password);
        errors.into_result()?;
        Ok(Self {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn register_command_trims_and_normalizes() {
        let cmd = RegisterUserCommand::new(" alice ", " Alice@X.com", "password1", " Alice ", "L")
            .expect("valid command");
        assert_eq!(cmd.username, "alice");
        assert_eq!(cmd.email, "alice@x.com");
        assert_eq!(cmd.first_name, "Alice");
    }

    #[test]
    fn register_command_collects_all_field_errors() {
        let err = RegisterUserCommand::new("", "bad", "short", " ", "").unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        for f in ["username", "email", "password", "first_name", "last_name"] {
            assert!(fields.get(f).is_some(), "missing error for {f}");
        }
    }

    #[test]
    fn update_profile_rejects_blank_provided_field() {
        assert!(UpdateUserProfileCommand::new(None, Some("  "), None).is_err());
        let cmd = UpdateUserProfileCommand::new(Some("NEW@x.com"), None, None).unwrap();
        assert_eq!(cmd.email.as_deref(), Some("new@x.com"));
        assert!(cmd.first_name.is_none());
    }

    #[test]
    fn change_password_requires_strong_new_password() {
        assert!(ChangePasswordCommand::new("old-password", "short").is_err());
        assert!(ChangePasswordCommand::new("", "long-enough-pw").is_err());
        assert!(ChangePasswordCommand::new("old-password", "long-enough-pw").is_ok());
    }
}
