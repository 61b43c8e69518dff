//! Conversation memory
//!
//! Turn history per conversation id, behind a store abstraction so a real
//! datastore can replace the in-memory map without touching orchestration.

pub mod session;
pub mod store;

pub use session::{ConversationEntry, ConversationSession, EntryRole, Turn};
pub use store::{ConversationStore, InMemoryConversationStore};
