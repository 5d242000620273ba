//! Credential and session settings, supplied at startup

use crate::GateError;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;

/// Shortest accepted signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 16;

/// The single username/password pair allowed to log in
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Plain equality against both fields
    #[must_use]
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session lifetime and cookie settings
#[derive(Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC key for session cookies
    pub secret: String,

    /// How long a session stays valid after login (default: 12h)
    #[serde(default = "default_ttl", deserialize_with = "deserialize_duration")]
    pub ttl: Duration,

    /// How often expired sessions are dropped from the store (default: 1m)
    #[serde(
        default = "default_sweep_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub sweep_interval: Duration,

    /// Cookie name (default: sluice_session)
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Add the `Secure` attribute to the cookie
    #[serde(default)]
    pub secure: bool,
}

fn default_ttl() -> Duration {
    Duration::from_secs(12 * 60 * 60)
}
fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_cookie_name() -> String {
    "sluice_session".to_string()
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_duration::parse(&text)
        .map_err(|e| serde::de::Error::custom(format!("invalid duration '{text}': {e}")))
}

impl SessionConfig {
    /// Defaults for everything except the secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ttl: default_ttl(),
            sweep_interval: default_sweep_interval(),
            cookie_name: default_cookie_name(),
            secure: false,
        }
    }

    pub fn validate(&self) -> Result<(), GateError> {
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(GateError::Configuration(format!(
                "session secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.ttl.is_zero() {
            return Err(GateError::Configuration(
                "session ttl must be greater than 0".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(GateError::Configuration(
                "session sweep_interval must be greater than 0".to_string(),
            ));
        }
        let valid_name = !self.cookie_name.is_empty()
            && self
                .cookie_name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid_name {
            return Err(GateError::Configuration(format!(
                "invalid cookie name '{}'",
                self.cookie_name
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .field("sweep_interval", &self.sweep_interval)
            .field("cookie_name", &self.cookie_name)
            .field("secure", &self.secure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults_from_yaml() {
        let config: SessionConfig =
            serde_yaml_ng::from_str("secret: 0123456789abcdef0123").expect("parse");
        assert_eq!(config.ttl, Duration::from_secs(43200));
        assert_eq!(config.cookie_name, "sluice_session");
        assert!(!config.secure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_config_parses_durations() {
        let config: SessionConfig = serde_yaml_ng::from_str(
            "secret: 0123456789abcdef0123\nttl: 30m\nsweep_interval: 10s",
        )
        .expect("parse");
        assert_eq!(config.ttl, Duration::from_secs(1800));
        assert_eq!(config.sweep_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = SessionConfig::with_secret("short");
        assert!(matches!(
            config.validate(),
            Err(GateError::Configuration(_))
        ));
    }

    #[test]
    fn test_bad_cookie_name_rejected() {
        let mut config = SessionConfig::with_secret("0123456789abcdef0123");
        config.cookie_name = "bad name;".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("admin", "hunter2");
        let text = format!("{creds:?}");
        assert!(text.contains("admin"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_credentials_match_exactly() {
        let creds = Credentials::new("admin", "password");
        assert!(creds.matches("admin", "password"));
        assert!(!creds.matches("admin", "wrong"));
        assert!(!creds.matches("Admin", "password"));
        assert!(!creds.matches("admin", "password "));
    }
}
