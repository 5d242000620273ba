//! In-process session store with a fixed time-to-live

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// A logged-in user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Sessions keyed by opaque id
///
/// Created at process start and handed to request handlers by reference.
/// Expired entries are invisible to [`SessionStore::get`] and are dropped by
/// [`SessionStore::sweep_expired`].
pub struct SessionStore {
    ttl: chrono::Duration,
    entries: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, username: &str) -> Session {
        self.create_at(username, Utc::now()).await
    }

    async fn create_at(&self, username: &str, now: DateTime<Utc>) -> Session {
        let session = Session {
            id: uuid7::uuid7().to_string(),
            username: username.to_string(),
            created_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.entries
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        session
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.get_at(id, Utc::now()).await
    }

    async fn get_at(&self, id: &str, now: DateTime<Utc>) -> Option<Session> {
        self.entries
            .read()
            .await
            .get(id)
            .filter(|session| session.is_live(now))
            .cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Session> {
        self.entries.write().await.remove(id)
    }

    /// Drop expired sessions, returning how many were removed
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now()).await
    }

    async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, session| session.is_live(now));
        before - entries.len()
    }

    /// Number of stored sessions, expired or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
