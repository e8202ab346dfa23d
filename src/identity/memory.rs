//! In-memory [`UserStore`] used by the handler and manager tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::User;
use super::store::{InsertOutcome, NewSession, UserStore};

struct StoredSession {
    user_id: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
pub(crate) struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    sessions: Mutex<HashMap<Vec<u8>, StoredSession>>,
}

impl MemoryUserStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn user_count(&self) -> usize {
        self.users.lock().await.len()
    }

    pub(crate) async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub(crate) async fn users(&self) -> Vec<User> {
        self.users.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_user(&self, user: &User) -> Result<InsertOutcome> {
        let mut users = self.users.lock().await;
        if users
            .values()
            .any(|existing| existing.normalized_user_name == user.normalized_user_name)
        {
            return Ok(InsertOutcome::Conflict);
        }
        users.insert(user.id, user.clone());
        Ok(InsertOutcome::Created)
    }

    async fn find_by_user_name(&self, normalized_user_name: &str) -> Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|user| user.normalized_user_name == normalized_user_name)
            .cloned())
    }

    async fn insert_session(&self, session: &NewSession) -> Result<InsertOutcome> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.session_hash) {
            return Ok(InsertOutcome::Conflict);
        }
        let ttl = Duration::from_secs(u64::try_from(session.ttl_seconds).unwrap_or(0));
        sessions.insert(
            session.session_hash.clone(),
            StoredSession {
                user_id: session.user_id,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(InsertOutcome::Created)
    }

    async fn lookup_session(&self, session_hash: &[u8]) -> Result<Option<User>> {
        let user_id = {
            let sessions = self.sessions.lock().await;
            match sessions.get(session_hash) {
                Some(session) if session.expires_at > Instant::now() => session.user_id,
                _ => return Ok(None),
            }
        };
        Ok(self.users.lock().await.get(&user_id).cloned())
    }

    async fn delete_session(&self, session_hash: &[u8]) -> Result<()> {
        self.sessions.lock().await.remove(session_hash);
        Ok(())
    }

    async fn delete_expired_sessions(&self) -> Result<u64> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        let now = Instant::now();
        sessions.retain(|_, session| session.expires_at > now);
        Ok(u64::try_from(before - sessions.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(hash: &[u8], ttl_seconds: i64) -> NewSession {
        NewSession {
            session_hash: hash.to_vec(),
            user_id: Uuid::new_v4(),
            persistent: false,
            ttl_seconds,
        }
    }

    #[tokio::test]
    async fn delete_expired_sessions_keeps_live_ones() -> Result<()> {
        let store = MemoryUserStore::new();
        store.insert_session(&session(b"expired", 0)).await?;
        store.insert_session(&session(b"live", 3600)).await?;

        assert_eq!(store.delete_expired_sessions().await?, 1);
        assert_eq!(store.session_count().await, 1);
        assert_eq!(store.delete_expired_sessions().await?, 0);
        Ok(())
    }
}
