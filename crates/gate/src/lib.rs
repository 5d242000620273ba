//! Session gate for the upload form
//!
//! A single configured user logs in with a username and password. A
//! successful login creates an entry in an in-process [`SessionStore`] and
//! hands the browser a signed cookie naming that entry. Protected pages
//! call [`Gate::require_session`] with the request's `Cookie` header.
//!
//! # Cookie format
//!
//! `<session id>.<hex HMAC-SHA256 of session id>`
//!
//! The session id is an opaque UUIDv7. The signature only proves the id
//! was minted by this process's secret; the store still decides whether
//! the session is alive. Restarting the process drops every session.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use gate::{Credentials, Gate, SessionConfig};
//!
//! let gate = Gate::new(
//!     Credentials::new("admin", "password"),
//!     SessionConfig::with_secret("a secret of at least sixteen bytes"),
//! )?;
//! let issued = gate.login("admin", "password").await?;
//! let session = gate
//!     .require_session(Some(&format!("sluice_session={}", issued.cookie_value)))
//!     .await?;
//! assert_eq!(session.username, "admin");
//! # Ok(())
//! # }
//! ```

mod config;
mod cookie;
mod error;
mod gate;
mod session;

pub use config::{Credentials, SessionConfig, MIN_SECRET_LEN};
pub use cookie::{CookieSigner, find_cookie};
pub use error::GateError;
pub use gate::{Gate, IssuedSession};
pub use session::{Session, SessionStore};

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;
