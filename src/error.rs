//! A2A Protocol error types.
//!
//! Expected protocol failures travel as **codes** on the event bus (see
//! [`ErrorCode`] and [`ErrorNotice`]), never as panics: callers of the
//! session API receive typed results and booleans, and subscribers receive
//! `error` events carrying the taxonomy below. [`A2AError`] is the
//! library-level error for operations that can genuinely fail (parsing,
//! configuration, I/O at the binary boundary).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A2A Protocol errors.
#[derive(Error, Debug)]
pub enum A2AError {
    /// Inbound payload does not conform to any known message schema.
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Message addressed by/to an agent inconsistent with the bound peer.
    #[error("Agent mismatch: {0}")]
    AgentMismatch(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Transport adapter error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A registered message handler returned an error.
    #[error("Handler error: {0}")]
    Handler(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for A2A operations
pub type Result<T> = std::result::Result<T, A2AError>;

impl From<toml::de::Error> for A2AError {
    fn from(err: toml::de::Error) -> Self {
        A2AError::Config(err.to_string())
    }
}

/// Protocol error taxonomy carried by `error` bus events and negotiation
/// rejections.
///
/// `AgentNotFound` and `AgentUnavailable` are surfaced by the discovery
/// collaborator rather than generated by the engine, but share this type so
/// every subscriber decodes one taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Agent id inconsistent with the session's bound peer.
    InvalidAgent,
    /// Capability (or message-type) intersection is empty.
    NoMatchingCapabilities,
    /// Inbound payload failed schema validation.
    MessageValidationFailed,
    /// Transport reported a failed connection attempt.
    ConnectionFailed,
    /// Transport reported a connection timeout.
    ConnectionTimeout,
    /// Discovery could not resolve the agent.
    AgentNotFound,
    /// Discovery resolved the agent but it is unreachable.
    AgentUnavailable,
    /// A registered message handler failed while processing.
    ProcessingError,
}

impl ErrorCode {
    /// Wire-format code string (SCREAMING_SNAKE_CASE).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAgent => "INVALID_AGENT",
            Self::NoMatchingCapabilities => "NO_MATCHING_CAPABILITIES",
            Self::MessageValidationFailed => "MESSAGE_VALIDATION_FAILED",
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::ConnectionTimeout => "CONNECTION_TIMEOUT",
            Self::AgentNotFound => "AGENT_NOT_FOUND",
            Self::AgentUnavailable => "AGENT_UNAVAILABLE",
            Self::ProcessingError => "PROCESSING_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of an `error` bus event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    /// Taxonomy code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Local agent the error pertains to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Extra context (offending payload, peer id, etc.).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorNotice {
    /// Create a notice with just a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            agent_id: None,
            details: None,
        }
    }

    /// Attach the local agent id.
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Attach structured context.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_format() {
        let json = serde_json::to_string(&ErrorCode::NoMatchingCapabilities).unwrap();
        assert_eq!(json, "\"NO_MATCHING_CAPABILITIES\"");

        let code: ErrorCode = serde_json::from_str("\"INVALID_AGENT\"").unwrap();
        assert_eq!(code, ErrorCode::InvalidAgent);
    }

    #[test]
    fn test_error_code_as_str_matches_serde() {
        for code in [
            ErrorCode::InvalidAgent,
            ErrorCode::NoMatchingCapabilities,
            ErrorCode::MessageValidationFailed,
            ErrorCode::ConnectionFailed,
            ErrorCode::ConnectionTimeout,
            ErrorCode::AgentNotFound,
            ErrorCode::AgentUnavailable,
            ErrorCode::ProcessingError,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_error_notice_builder() {
        let notice = ErrorNotice::new(ErrorCode::ConnectionFailed, "peer unreachable")
            .with_agent("agent-1")
            .with_details(serde_json::json!({"attempt": 1}));

        assert_eq!(notice.code, ErrorCode::ConnectionFailed);
        assert_eq!(notice.agent_id.as_deref(), Some("agent-1"));
        assert!(notice.details.is_some());
    }
}
