use crate::cookie::{CookieSigner, find_cookie};
use crate::{Credentials, GateError, Result, Session, SessionConfig, SessionStore};
use diagnostics::{debug, info, warn};

/// What a successful login hands back to the browser
#[derive(Clone, Debug)]
pub struct IssuedSession {
    pub session: Session,
    /// Signed value stored in the cookie
    pub cookie_value: String,
    /// Complete `Set-Cookie` header value
    pub set_cookie: String,
}

/// Credential check plus session bookkeeping for one process
pub struct Gate {
    credentials: Credentials,
    config: SessionConfig,
    signer: CookieSigner,
    store: SessionStore,
}

impl Gate {
    /// Fails when the session settings do not validate
    pub fn new(credentials: Credentials, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let signer = CookieSigner::new(config.secret.as_bytes())?;
        let store = SessionStore::new(config.ttl);
        Ok(Self {
            credentials,
            config,
            signer,
            store,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Compare against the configured credential pair
    pub fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        if self.credentials.matches(username, password) {
            Ok(())
        } else {
            Err(GateError::InvalidCredentials)
        }
    }

    /// Authenticate and, on success, open a session
    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession> {
        if let Err(e) = self.authenticate(username, password) {
            warn!("Rejected login for {username}", username);
            return Err(e);
        }

        let session = self.store.create(username).await;
        let cookie_value = self.signer.sign(&session.id);
        let set_cookie = self.set_cookie_header(&cookie_value, self.config.ttl.as_secs());

        info!("Opened session for {username}", username);
        Ok(IssuedSession {
            session,
            cookie_value,
            set_cookie,
        })
    }

    /// Resolve the session named by a request's `Cookie` header
    pub async fn require_session(&self, cookie_header: Option<&str>) -> Result<Session> {
        let value = cookie_header
            .and_then(|header| find_cookie(header, &self.config.cookie_name))
            .ok_or(GateError::Unauthenticated)?;

        let Some(session_id) = self.signer.verify(value) else {
            debug!("Session cookie failed signature check");
            return Err(GateError::Unauthenticated);
        };

        self.store
            .get(session_id)
            .await
            .ok_or(GateError::Unauthenticated)
    }

    /// Drop the session named by the cookie header, if any, and return a
    /// `Set-Cookie` value that clears the cookie
    pub async fn logout(&self, cookie_header: Option<&str>) -> String {
        let session_id = cookie_header
            .and_then(|header| find_cookie(header, &self.config.cookie_name))
            .and_then(|value| self.signer.verify(value));

        if let Some(session_id) = session_id {
            if let Some(session) = self.store.remove(session_id).await {
                let username = session.username;
                info!("Closed session for {username}", username);
            }
        }

        self.set_cookie_header("", 0)
    }

    /// Drop expired sessions
    pub async fn sweep(&self) -> usize {
        let removed = self.store.sweep_expired().await;
        if removed > 0 {
            debug!("Swept {removed} expired sessions", removed);
        }
        removed
    }

    fn set_cookie_header(&self, value: &str, max_age: u64) -> String {
        let mut header = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.config.cookie_name, value, max_age
        );
        if self.config.secure {
            header.push_str("; Secure");
        }
        header
    }
}
