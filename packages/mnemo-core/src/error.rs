//! Protocol-level error types shared between the dispatcher and its
//! handlers. Backend- and LLM-specific errors live in `mnemo-server`
//! alongside the types that produce them.

use thiserror::Error;

/// Errors surfaced while turning a raw wire frame into a typed
/// [`crate::protocol::ClientMessage`] (§7, protocol/validation errors).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

impl ProtocolError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        ProtocolError::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ProtocolError::UnknownType("bogus".into());
        assert!(err.to_string().contains("bogus"));
    }
}
