//! Server configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads `.env` through `dotenvy`, then builds one `AppConfig` that is
//! shared through `AppState`. Everything except `DATABASE_URL` has a default.

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_TEAM_MEMBERS: usize = 5;
pub const DEFAULT_UNIVERSITY_EMAIL_DOMAIN: &str = "univ-tiaret.dz";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Admin account created or refreshed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// Capacity of a team, leader included.
    pub max_team_members: usize,
    /// Domain that university e-mails must belong to (without `@`).
    pub university_email_domain: String,
    pub session_ttl_hours: i64,
    /// Explicit `COOKIE_SECURE` override. `None` means plain-HTTP friendly.
    pub cookie_secure: Option<bool>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `MAX_TEAM_MEMBERS`: default 5, must be at least 2
    /// - `UNIVERSITY_EMAIL_DOMAIN`: default `univ-tiaret.dz`
    /// - `SESSION_TTL_HOURS`: default 24
    /// - `COOKIE_SECURE`: boolean
    /// - `ADMIN_EMAIL` + `ADMIN_PASSWORD`: bootstrap admin account
    ///
    /// # Errors
    ///
    /// Returns an error when `DATABASE_URL` is missing or a value is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let port = env_parse_strict("PORT", DEFAULT_PORT)?;

        let max_team_members = env_parse_strict("MAX_TEAM_MEMBERS", DEFAULT_MAX_TEAM_MEMBERS)?;
        if max_team_members < 2 {
            return Err(ConfigError::Invalid { key: "MAX_TEAM_MEMBERS", value: max_team_members.to_string() });
        }

        let university_email_domain = parse_domain(std::env::var("UNIVERSITY_EMAIL_DOMAIN").ok().as_deref())?;
        let session_ttl_hours = env_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS).max(1);

        let bootstrap_admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { email: email.trim().to_ascii_lowercase(), password })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            port,
            max_team_members,
            university_email_domain,
            session_ttl_hours,
            cookie_secure: env_bool("COOKIE_SECURE"),
            bootstrap_admin,
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Like [`env_parse`], but a present-and-malformed value is an error.
fn env_parse_strict<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

fn parse_domain(raw: Option<&str>) -> Result<String, ConfigError> {
    let domain = raw
        .unwrap_or(DEFAULT_UNIVERSITY_EMAIL_DOMAIN)
        .trim()
        .trim_start_matches('@')
        .to_ascii_lowercase();
    if domain.is_empty() || !domain.contains('.') || domain.contains('@') {
        return Err(ConfigError::Invalid { key: "UNIVERSITY_EMAIL_DOMAIN", value: domain });
    }
    Ok(domain)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
