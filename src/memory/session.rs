//! Conversation history types
//!
//! A session is an append-only list of turns. Each turn is exactly one user
//! entry followed by exactly one assistant (or error) entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of an entry in the history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    User,
    Assistant,
    /// Stands in for the assistant entry when the turn failed outright
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub entry_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: EntryRole,
    pub content: String,
}

impl ConversationEntry {
    fn new(role: EntryRole, content: String) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    user: ConversationEntry,
    reply: ConversationEntry,
}

impl Turn {
    pub fn completed(user_message: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            user: ConversationEntry::new(EntryRole::User, user_message.into()),
            reply: ConversationEntry::new(EntryRole::Assistant, reply.into()),
        }
    }

    pub fn failed(user_message: impl Into<String>, error_text: impl Into<String>) -> Self {
        Self {
            user: ConversationEntry::new(EntryRole::User, user_message.into()),
            reply: ConversationEntry::new(EntryRole::Error, error_text.into()),
        }
    }

    pub fn user(&self) -> &ConversationEntry {
        &self.user
    }

    pub fn reply(&self) -> &ConversationEntry {
        &self.reply
    }

    pub fn entries(&self) -> [&ConversationEntry; 2] {
        [&self.user, &self.reply]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    turns: Vec<Turn>,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            turns: Vec::new(),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.updated_at = Utc::now();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &ConversationEntry> {
        self.turns.iter().flat_map(|t| t.entries())
    }

    pub fn entry_count(&self) -> usize {
        self.turns.len() * 2
    }

    /// The last `count` entries, oldest first
    pub fn recent_entries(&self, count: usize) -> Vec<ConversationEntry> {
        let mut recent: Vec<ConversationEntry> =
            self.entries().rev().take(count).cloned().collect();
        recent.reverse();
        recent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_is_user_then_reply() {
        let turn = Turn::completed("Show my policies", "You have 2 active policies.");
        let [user, reply] = turn.entries();
        assert_eq!(user.role, EntryRole::User);
        assert_eq!(reply.role, EntryRole::Assistant);
        assert_eq!(user.content, "Show my policies");

        let failed = Turn::failed("Show my policies", "Something went wrong");
        assert_eq!(failed.reply().role, EntryRole::Error);
    }

    #[test]
    fn test_recent_entries_keeps_chronological_order() {
        let mut session = ConversationSession::new("conv-1");
        for i in 0..3 {
            session.push(Turn::completed(format!("Question {}", i), format!("Answer {}", i)));
        }

        assert_eq!(session.entry_count(), 6);

        let recent = session.recent_entries(3);
        let contents: Vec<&str> = recent.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["Answer 1", "Question 2", "Answer 2"]);

        assert_eq!(session.recent_entries(50).len(), 6);
    }
}
