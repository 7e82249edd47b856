//! Conversation engine for the experience concierge.
//!
//! Classifies inbound messages, retrieves grounded catalog items, asks the
//! LLM to phrase a reply, verifies that reply against the catalog and keeps
//! each client's session profile up to date.

pub mod composer;
pub mod error;
pub mod hub;
pub mod intent;
pub mod llm;
pub mod prompt;
pub mod verify;

pub use composer::{ComposerSettings, ResponseComposer, CLEARED_MESSAGE};
pub use error::ChatError;
pub use hub::{ConversationHub, MAX_MESSAGE_LENGTH};
pub use intent::classify;
pub use llm::{GeminiClient, LlmClient, LlmError};
pub use prompt::PromptBuilder;
pub use verify::{extract_json, verify_reply, VerifiedReply};

#[cfg(test)]
pub(crate) mod testing;
