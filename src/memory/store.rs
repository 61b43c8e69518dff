//! Conversation store
//!
//! In-memory only. Two requests on the same conversation id race on append
//! order; callers that need strict ordering must serialize those requests
//! themselves. Each `append` adds a whole turn under one write lock, so a
//! turn's two entries are never interleaved with another turn's.

use super::session::{ConversationEntry, ConversationSession, Turn};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationSession>>;
    async fn append(&self, conversation_id: &str, turn: Turn) -> Result<()>;

    /// Last `count` entries, oldest first; empty for unknown ids
    async fn recent(&self, conversation_id: &str, count: usize) -> Result<Vec<ConversationEntry>> {
        Ok(self
            .get(conversation_id)
            .await?
            .map(|session| session.recent_entries(count))
            .unwrap_or_default())
    }
}

pub struct InMemoryConversationStore {
    sessions: Arc<RwLock<HashMap<String, ConversationSession>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(conversation_id).cloned())
    }

    async fn append(&self, conversation_id: &str, turn: Turn) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(conversation_id.to_string())
            .or_insert_with(|| ConversationSession::new(conversation_id));
        session.push(turn);

        debug!(
            conversation_id,
            entries = session.entry_count(),
            "Turn appended"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::EntryRole;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_unknown_conversation_is_empty() {
        let store = InMemoryConversationStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(store.recent("missing", 6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_keeps_turn_order() {
        let store = InMemoryConversationStore::new();
        assert_ok!(
            store
                .append("conv-1", Turn::completed("first", "first reply"))
                .await
        );
        assert_ok!(store.append("conv-1", Turn::failed("second", "error reply")).await);

        let session = store.get("conv-1").await.unwrap().unwrap();
        let roles: Vec<EntryRole> = session.entries().map(|e| e.role).collect();
        assert_eq!(
            roles,
            vec![EntryRole::User, EntryRole::Assistant, EntryRole::User, EntryRole::Error]
        );
    }

    #[tokio::test]
    async fn test_concurrent_appends_on_distinct_ids() {
        let store = Arc::new(InMemoryConversationStore::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let id = format!("conv-{}", i % 2);
                    store
                        .append(&id, Turn::completed(format!("q{}", i), format!("a{}", i)))
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for id in ["conv-0", "conv-1"] {
            let session = store.get(id).await.unwrap().unwrap();
            assert_eq!(session.entry_count(), 8);
            // pairs stay intact even when arrival order varies
            for turn in session.turns() {
                assert_eq!(turn.user().content[1..], turn.reply().content[1..]);
            }
        }
    }
}
