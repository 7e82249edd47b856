//! Error types for the conversation engine.

use concierge_catalog::CatalogError;
use concierge_core::ConciergeError;

use crate::llm::LlmError;

/// Errors from the conversation engine.
///
/// Only the validation variants reach a caller of
/// [`ConversationHub::handle_chat`](crate::ConversationHub::handle_chat);
/// the rest are logged and turned into textual fallbacks by the composer.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("catalog unavailable: {0}")]
    RetrievalUnavailable(String),
    #[error("LLM call timed out after {0}s")]
    GenerationTimeout(u64),
    #[error("LLM call failed: {0}")]
    GenerationFailure(String),
    #[error("stored profile unreadable: {0}")]
    PersistenceCorrupt(String),
    #[error("reply item failed verification: {0}")]
    ValidationMismatch(String),
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Whether the error is the client's fault rather than a degraded
    /// dependency.
    pub fn is_validation(&self) -> bool {
        matches!(self, ChatError::EmptyMessage | ChatError::MessageTooLong(_))
    }
}

impl From<CatalogError> for ChatError {
    fn from(err: CatalogError) -> Self {
        ChatError::RetrievalUnavailable(err.to_string())
    }
}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        ChatError::GenerationFailure(err.to_string())
    }
}

impl From<ConciergeError> for ChatError {
    fn from(err: ConciergeError) -> Self {
        match err {
            ConciergeError::Serialization(msg) => ChatError::PersistenceCorrupt(msg),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(2000).to_string(),
            "message exceeds maximum length of 2000 characters"
        );
        assert_eq!(
            ChatError::GenerationTimeout(30).to_string(),
            "LLM call timed out after 30s"
        );
        assert_eq!(
            ChatError::ValidationMismatch("id 99".to_string()).to_string(),
            "reply item failed verification: id 99"
        );
    }

    #[test]
    fn test_is_validation() {
        assert!(ChatError::EmptyMessage.is_validation());
        assert!(ChatError::MessageTooLong(1).is_validation());
        assert!(!ChatError::GenerationTimeout(1).is_validation());
        assert!(!ChatError::RetrievalUnavailable("x".into()).is_validation());
    }

    #[test]
    fn test_from_catalog_error() {
        let err: ChatError = CatalogError::Unavailable("index offline".to_string()).into();
        assert!(matches!(err, ChatError::RetrievalUnavailable(_)));
        assert!(err.to_string().contains("index offline"));
    }

    #[test]
    fn test_from_llm_error() {
        let err: ChatError = LlmError::EmptyResponse.into();
        assert!(matches!(err, ChatError::GenerationFailure(_)));
    }

    #[test]
    fn test_from_concierge_error() {
        let err: ChatError = ConciergeError::Storage("disk full".to_string()).into();
        assert!(matches!(err, ChatError::Storage(_)));
        assert!(err.to_string().contains("disk full"));

        let err: ChatError = ConciergeError::Serialization("expected value".to_string()).into();
        assert!(matches!(err, ChatError::PersistenceCorrupt(_)));
        assert_eq!(err.to_string(), "stored profile unreadable: expected value");
    }
}
