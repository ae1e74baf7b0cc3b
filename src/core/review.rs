//! Review sessions
//!
//! Operators stage a batch selection in a session, review it, then dispatch.
//! Sessions are write-once and expire after the configured TTL.

use crate::adapters::database::{SessionStore, StoredSession};
use crate::domain::{Result, SyncError};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub struct ReviewSessions {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl ReviewSessions {
    pub fn new(store: Arc<dyn SessionStore>, ttl_minutes: i64) -> Self {
        Self {
            store,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Store a batch selection and return the new session id
    ///
    /// Expired sessions are purged first.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] unless `batches` is a non-empty array.
    pub async fn create_session(&self, batches: &Value) -> Result<String> {
        self.create_session_at(batches, Utc::now()).await
    }

    async fn create_session_at(&self, batches: &Value, now: DateTime<Utc>) -> Result<String> {
        if !batches.as_array().is_some_and(|a| !a.is_empty()) {
            return Err(SyncError::Validation(
                "Request body must be a non-empty array of batch data objects".to_string(),
            ));
        }

        let purged = self.store.purge_expired().await?;
        if purged > 0 {
            tracing::debug!(purged, "Purged expired review sessions");
        }

        let session_id = Uuid::new_v4().to_string();
        self.store
            .insert(&session_id, batches, now + self.ttl)
            .await?;

        tracing::info!(
            session_id = %session_id,
            batches = batches.as_array().map_or(0, Vec::len),
            "Created review session"
        );
        Ok(session_id)
    }

    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when the session is unknown or expired.
    pub async fn get_session(&self, session_id: &str) -> Result<StoredSession> {
        self.store
            .fetch_active(session_id)
            .await?
            .ok_or_else(|| SyncError::NotFound("Session not found or expired".to_string()))
    }

    /// Delete a session; deleting an unknown or already removed session
    /// succeeds
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        if self.store.delete(session_id).await? {
            tracing::info!(session_id = %session_id, "Deleted review session");
        } else {
            tracing::debug!(session_id = %session_id, "No review session to delete");
        }
        Ok(())
    }

    /// Delete expired sessions, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let purged = self.store.purge_expired().await?;
        tracing::info!(purged, "Purged expired review sessions");
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        sessions: Mutex<Vec<StoredSession>>,
    }

    #[async_trait]
    impl SessionStore for MemoryStore {
        async fn purge_expired(&self) -> Result<u64> {
            let mut sessions = self.sessions.lock().unwrap();
            let before = sessions.len();
            let now = Utc::now();
            sessions.retain(|s| s.expires_at > now);
            Ok((before - sessions.len()) as u64)
        }

        async fn insert(&self, id: &str, data: &Value, expires_at: DateTime<Utc>) -> Result<()> {
            self.sessions.lock().unwrap().push(StoredSession {
                session_id: id.to_string(),
                batch_data: data.clone(),
                created_at: Utc::now(),
                expires_at,
            });
            Ok(())
        }

        async fn fetch_active(&self, id: &str) -> Result<Option<StoredSession>> {
            let now = Utc::now();
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.session_id == id && s.expires_at > now)
                .cloned())
        }

        async fn delete(&self, id: &str) -> Result<bool> {
            let mut sessions = self.sessions.lock().unwrap();
            let before = sessions.len();
            sessions.retain(|s| s.session_id != id);
            Ok(sessions.len() < before)
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let sessions = ReviewSessions::new(Arc::new(MemoryStore::default()), 60);
        let batches = json!([{"batch_id": "b1"}]);

        let id = sessions.create_session(&batches).await.unwrap();
        assert!(Uuid::parse_str(&id).is_ok());

        let stored = sessions.get_session(&id).await.unwrap();
        assert_eq!(stored.batch_data, batches);
        assert!(stored.expires_at > Utc::now() + Duration::minutes(59));

        sessions.delete_session(&id).await.unwrap();
        assert!(sessions.get_session(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = Arc::new(MemoryStore::default());
        let sessions = ReviewSessions::new(store.clone(), 60);
        let id = sessions.create_session(&json!([{"batch_id": "b1"}])).await.unwrap();

        sessions.delete_session(&id).await.unwrap();
        sessions.delete_session(&id).await.unwrap();
        sessions.delete_session("never-created").await.unwrap();
        assert!(store.sessions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_empty_or_non_array_bodies() {
        let sessions = ReviewSessions::new(Arc::new(MemoryStore::default()), 60);
        for body in [json!([]), json!({"batch_id": "b1"}), json!(null)] {
            let err = sessions.create_session(&body).await.unwrap_err();
            assert!(matches!(err, SyncError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_expired_session_is_not_found_and_purged() {
        let store = Arc::new(MemoryStore::default());
        let sessions = ReviewSessions::new(store.clone(), 60);

        let old = sessions
            .create_session_at(&json!([1]), Utc::now() - Duration::hours(2))
            .await
            .unwrap();
        let err = sessions.get_session(&old).await.unwrap_err();
        assert_eq!(err.to_string(), "Session not found or expired");

        sessions.create_session(&json!([2])).await.unwrap();
        assert_eq!(store.sessions.lock().unwrap().len(), 1);
        assert_eq!(sessions.purge_expired().await.unwrap(), 0);
    }
}
