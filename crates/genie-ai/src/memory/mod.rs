//! Per-session conversation memory.
//!
//! Each session owns one [`ConversationWindow`], a bounded ordered log of
//! messages. Windows live behind their own lock, so sessions never block
//! each other.

mod store;
mod window;


pub use store::ConversationMemoryStore;
pub use window::{ConversationWindow, PushOutcome};

use genie_common::SessionKey;

/// Default number of retained messages per session.
pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("session not initialized: {0}")]
    UninitializedSession(SessionKey),
}
