//! Session store — get/put/delete by id over an in-process map, with a
//! TTL-based eviction sweep and an explicit teardown path.
//!
//! Each session owns exactly one `InterviewState` behind a `tokio::sync::
//! Mutex`; the engine serializes all stage execution for a session through
//! that lock. Sessions are otherwise independent and run concurrently.

use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::interview::state::InterviewState;
use crate::retrieval::QuestionRetriever;

/// Where the orchestrator is within a session's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    /// Created; the plan has not been produced yet.
    Planner,
    /// A question is pending; the next legal operation is `submit_answer`.
    WaitingForAnswer,
    Completed,
}

impl SessionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStep::Planner => "created",
            SessionStep::WaitingForAnswer => "waiting_for_answer",
            SessionStep::Completed => "completed",
        }
    }
}

/// The lock-guarded mutable half of a session.
pub struct SessionInner {
    pub state: InterviewState,
    pub step: SessionStep,
}

/// One interview session. The retriever is fixed at creation: either the
/// shared default index or a private one built from a knowledge override.
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub retriever: Arc<dyn QuestionRetriever>,
    pub inner: Mutex<SessionInner>,
    last_activity: StdMutex<DateTime<Utc>>,
}

impl Session {
    pub fn new(state: InterviewState, retriever: Arc<dyn QuestionRetriever>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            retriever,
            inner: Mutex::new(SessionInner {
                state,
                step: SessionStep::Planner,
            }),
            last_activity: StdMutex::new(now),
        }
    }

    /// Refreshes the idle clock. Called on every API touch.
    pub fn touch(&self) {
        *self.last_activity.lock().unwrap() = Utc::now();
    }

    fn idle_since(&self) -> DateTime<Utc> {
        *self.last_activity.lock().unwrap()
    }
}

/// In-process session registry with idle-TTL eviction.
pub struct SessionStore {
    sessions: DashMap<Uuid, Arc<Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn put(&self, session: Arc<Session>) {
        // Lazy sweep on every insert; a periodic task covers quiet stores.
        self.evict_expired();
        self.sessions.insert(session.id, session);
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|s| s.clone())
    }

    /// Explicit teardown. Returns false when the session does not exist.
    pub fn delete(&self, id: &Uuid) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Removes every session idle longer than the TTL. Returns the count.
    pub fn evict_expired(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let expired: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_since() <= cutoff)
            .map(|entry| *entry.key())
            .collect();

        for id in &expired {
            self.sessions.remove(id);
        }
        if !expired.is_empty() {
            info!("Evicted {} idle interview sessions", expired.len());
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::InMemoryQuestionIndex;

    fn session() -> Arc<Session> {
        Arc::new(Session::new(
            InterviewState::new("r".into(), "jd".into(), "role".into()),
            Arc::new(InMemoryQuestionIndex::new()),
        ))
    }

    #[test]
    fn test_put_get_delete_roundtrip() {
        let store = SessionStore::new(120);
        let s = session();
        let id = s.id;
        store.put(s);

        assert!(store.get(&id).is_some());
        assert!(store.delete(&id));
        assert!(store.get(&id).is_none());
        assert!(!store.delete(&id));
    }

    #[test]
    fn test_get_unknown_id_is_none() {
        let store = SessionStore::new(120);
        assert!(store.get(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_zero_ttl_evicts_everything() {
        let store = SessionStore::new(0);
        let s1 = session();
        let s2 = session();
        store.sessions.insert(s1.id, s1);
        store.sessions.insert(s2.id, s2);
        assert_eq!(store.evict_expired(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_generous_ttl_keeps_sessions() {
        let store = SessionStore::new(120);
        let s = session();
        let id = s.id;
        store.put(s);
        assert_eq!(store.evict_expired(), 0);
        assert!(store.get(&id).is_some());
    }

    #[tokio::test]
    async fn test_sessions_start_at_planner_step() {
        let s = session();
        assert_eq!(s.inner.lock().await.step, SessionStep::Planner);
        assert_eq!(SessionStep::Planner.as_str(), "created");
    }
}
