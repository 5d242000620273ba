//! Error types for the session gate

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Username or password did not match the configured pair
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No cookie, a forged cookie, or a session that has expired
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Configuration error: {0}")]
    Configuration(String),
}
