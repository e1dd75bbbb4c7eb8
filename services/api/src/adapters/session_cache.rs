//! services/api/src/adapters/session_cache.rs
//!
//! A bounded chat session store. Sessions are evicted once the cache is full or
//! after sitting idle; an evicted session is rebuilt from persisted history.

use async_trait::async_trait;
use moka::sync::Cache;
use roadmap_core::domain::ChatSession;
use roadmap_core::ports::ChatSessionStore;
use std::time::Duration;

#[derive(Clone)]
pub struct MokaChatSessionStore {
    cache: Cache<String, ChatSession>,
}

impl MokaChatSessionStore {
    pub fn new(max_capacity: u64, time_to_idle: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_idle(time_to_idle)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl ChatSessionStore for MokaChatSessionStore {
    async fn get(&self, session_id: &str) -> Option<ChatSession> {
        self.cache.get(session_id)
    }

    async fn put(&self, session: ChatSession) {
        self.cache.insert(session.id.clone(), session);
    }

    async fn evict(&self, session_id: &str) {
        self.cache.invalidate(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadmap_core::domain::{ChatRole, ChatTurn};
    use uuid::Uuid;

    #[tokio::test]
    async fn stores_and_evicts_sessions() {
        let store = MokaChatSessionStore::new(10, Duration::from_secs(60));
        let mut session = ChatSession::new("s-1", Uuid::new_v4());
        session.turns.push_back(ChatTurn::new(ChatRole::User, "hello"));

        store.put(session).await;
        let cached = store.get("s-1").await.unwrap();
        assert_eq!(cached.turns.len(), 1);

        store.evict("s-1").await;
        assert!(store.get("s-1").await.is_none());
    }

    #[tokio::test]
    async fn put_replaces_the_previous_session() {
        let store = MokaChatSessionStore::new(10, Duration::from_secs(60));
        let journey_id = Uuid::new_v4();
        store.put(ChatSession::new("s-2", journey_id)).await;

        let mut updated = ChatSession::new("s-2", journey_id);
        updated.turns.push_back(ChatTurn::new(ChatRole::Model, "hi"));
        store.put(updated).await;

        assert_eq!(store.get("s-2").await.unwrap().turns.len(), 1);
    }
}
