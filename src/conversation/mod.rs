//! Conversation Store (slot-filling)
//!
//! A write plan missing required fields is parked under its
//! conversation id. Each later turn merges new values in; once nothing
//! is missing the operation waits for confirmation, then runs through
//! the write executor. Successful execution clears the entry, failures
//! keep it so the user can retry.

mod errors;
mod infer;
mod pending;
mod store;

pub use errors::{ConversationError, ConversationResult};
pub use infer::{infer_fields, infer_for};
pub use pending::{PendingOperation, PendingPayload};
pub use store::{ConversationStore, InMemoryConversationStore};
