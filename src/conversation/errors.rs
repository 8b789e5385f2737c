//! Conversation store error types
//!
//! Error codes:
//! - OPG_CONVERSATION_POISONED: a thread panicked while holding the store lock

use std::sync::PoisonError;

use thiserror::Error;

/// Result type for conversation store operations
pub type ConversationResult<T> = Result<T, ConversationError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Conversation store lock poisoned")]
    Poisoned,
}

impl ConversationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Poisoned => "OPG_CONVERSATION_POISONED",
        }
    }
}

impl<T> From<PoisonError<T>> for ConversationError {
    fn from(_: PoisonError<T>) -> Self {
        Self::Poisoned
    }
}
