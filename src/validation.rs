use lazy_static::lazy_static;
use regex::Regex;

use crate::error::FieldErrors;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_NAME_LEN: usize = 100;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
            .expect("email regex compiles");
    static ref USERNAME_RE: Regex =
        Regex::new(r"^[A-Za-z0-9_-]{3,100}$").expect("username regex compiles");
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email) && !email.contains("..") && !email.starts_with('.')
}

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Trims `value`; records an error and returns `None` when it is blank or too long.
pub fn required(
    errors: &mut FieldErrors,
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, "must not be blank");
        return None;
    }
    if trimmed.chars().count() > max_len {
        errors.add(field, format!("must be at most {max_len} characters"));
        return None;
    }
    Some(trimmed.to_string())
}

pub fn check_password(errors: &mut FieldErrors, field: &'static str, password: &str) {
    if password.trim().is_empty() {
        errors.add(field, "must not be blank");
    } else if password.len() < MIN_PASSWORD_LEN {
        errors.add(field, format!("must be at least {MIN_PASSWORD_LEN} characters"));
    } else if password.len() > MAX_PASSWORD_LEN {
        errors.add(field, format!("must be at most {MAX_PASSWORD_LEN} characters"));
    }
}

pub fn check_email(errors: &mut FieldErrors, field: &'static str, email: &str) -> Option<String> {
    let normalized = normalize_email(email);
    if normalized.is_empty() {
        errors.add(field, "must not be blank");
        None
    } else if !is_valid_email(&normalized) {
        errors.add(field, "must be a valid email address");
        None
    } else {
        Some(normalized)
    }
}
