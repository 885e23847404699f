//! Form-input validation shared by the services.
//!
//! Every function trims its input and returns the normalized value, so
//! callers store exactly what was validated.

use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

pub const TEAM_NAME_MAX: usize = 100;
pub const MESSAGE_MAX: usize = 1000;
pub const STUDENT_NAME_MAX: usize = 100;
pub const EMAIL_MAX: usize = 255;
pub const URL_MAX: usize = 2048;
pub const ROLE_MAX: usize = 50;
pub const SCORE_MIN: i32 = 0;
pub const SCORE_MAX: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl crate::error::ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        "E_VALIDATION"
    }

    fn status(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::UNPROCESSABLE_ENTITY
    }
}

/// Required free text bounded by `max` characters.
pub fn required_text(field: &'static str, label: &str, raw: &str, max: usize) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::new(field, format!("{label} is required")));
    }
    if value.chars().count() > max {
        return Err(ValidationError::new(field, format!("{label} must be less than {max} characters")));
    }
    Ok(value.to_owned())
}

/// Optional free text: blank becomes `None`.
pub fn optional_text(
    field: &'static str,
    label: &str,
    raw: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => required_text(field, label, value, max).map(Some),
        None => Ok(None),
    }
}

pub fn team_name(raw: &str) -> Result<String, ValidationError> {
    let value = required_text("team_name", "Team name", raw, TEAM_NAME_MAX)?;
    let allowed = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.');
    if !allowed {
        return Err(ValidationError::new(
            "team_name",
            "Team name can only contain letters, numbers, spaces, hyphens, underscores, and periods",
        ));
    }
    Ok(value)
}

/// Request message. Required on both request forms.
pub fn message(raw: Option<&str>) -> Result<String, ValidationError> {
    required_text("message", "Message", raw.unwrap_or_default(), MESSAGE_MAX)
}

pub fn student_name(raw: &str) -> Result<String, ValidationError> {
    required_text("name", "Name", raw, STUDENT_NAME_MAX)
}

pub fn role(raw: &str) -> Result<String, ValidationError> {
    required_text("role", "Role", raw, ROLE_MAX)
}

/// Syntactic e-mail check; returns the lower-cased address.
pub fn email(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized.chars().count() > EMAIL_MAX {
        return Err(ValidationError::new(field, format!("Email must be less than {EMAIL_MAX} characters")));
    }
    let invalid = || ValidationError::new(field, "Invalid email address");
    if normalized.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = normalized.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels_ok = domain.contains('.') && domain.split('.').all(|label| !label.is_empty());
    if !labels_ok {
        return Err(invalid());
    }
    Ok(normalized)
}

pub fn optional_email(field: &'static str, raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => email(field, value).map(Some),
        None => Ok(None),
    }
}

/// University e-mail: a valid address ending in `@<domain>`.
pub fn university_email(raw: &str, domain: &str) -> Result<String, ValidationError> {
    let normalized = email("university_email", raw)?;
    let suffix = format!("@{domain}");
    if !normalized.ends_with(&suffix) {
        return Err(ValidationError::new(
            "university_email",
            format!("University email must end with {suffix}"),
        ));
    }
    Ok(normalized)
}

pub fn optional_url(field: &'static str, raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let has_scheme = value.starts_with("https://") || value.starts_with("http://");
    let has_host = value
        .split_once("://")
        .is_some_and(|(_, rest)| !rest.is_empty() && !rest.starts_with('/'));
    if !has_scheme || !has_host || value.len() > URL_MAX || value.chars().any(char::is_whitespace) {
        return Err(ValidationError::new(field, "Invalid URL"));
    }
    Ok(Some(value.to_owned()))
}

pub fn score(field: &'static str, value: i32) -> Result<i32, ValidationError> {
    if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
        return Err(ValidationError::new(field, format!("{field} must be between {SCORE_MIN} and {SCORE_MAX}")));
    }
    Ok(value)
}

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Calendar date in `YYYY-MM-DD` form.
pub fn date(field: &'static str, raw: &str) -> Result<Date, ValidationError> {
    Date::parse(raw.trim(), DATE_FORMAT).map_err(|_| ValidationError::new(field, "Date must be in YYYY-MM-DD format"))
}

pub fn optional_date(field: &'static str, raw: Option<&str>) -> Result<Option<Date>, ValidationError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => date(field, value).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
