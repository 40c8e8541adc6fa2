//! Agent capabilities for protocol negotiation.
//!
//! Capabilities and message types are advertised when a remote peer
//! requests negotiation; the engine computes the intersection with the
//! locally supported sets and accepts or rejects the session. The
//! intersection functions are pure and stateless, callable concurrently
//! from any number of sessions.

use serde::{Deserialize, Serialize};

use super::message::MessageType;
use crate::error::ErrorCode;

/// Closed set of features an agent can declare support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Basic message exchange
    Messaging,
    /// Streamed payloads
    Streaming,
    /// Binary file transfer
    FileTransfer,
    /// Event subscription fan-out
    EventSubscription,
    /// Peer discovery participation
    AgentDiscovery,
    /// Remote task execution
    TaskExecution,
}

impl Capability {
    /// Wire-format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Messaging => "messaging",
            Self::Streaming => "streaming",
            Self::FileTransfer => "file_transfer",
            Self::EventSubscription => "event_subscription",
            Self::AgentDiscovery => "agent_discovery",
            Self::TaskExecution => "task_execution",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Locally supported capabilities and message types, in preference order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySet {
    /// Supported capabilities
    pub capabilities: Vec<Capability>,
    /// Supported message types
    pub message_types: Vec<MessageType>,
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self {
            capabilities: vec![
                Capability::Messaging,
                Capability::EventSubscription,
                Capability::AgentDiscovery,
            ],
            message_types: vec![
                MessageType::Text,
                MessageType::Json,
                MessageType::Binary,
                MessageType::Control,
            ],
        }
    }
}

impl CapabilitySet {
    /// Create with specific capabilities and the default message types.
    pub fn new(capabilities: Vec<Capability>) -> Self {
        Self {
            capabilities,
            ..Default::default()
        }
    }

    /// Replace the supported capabilities.
    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Replace the supported message types.
    pub fn with_message_types(mut self, message_types: Vec<MessageType>) -> Self {
        self.message_types = message_types;
        self
    }

    /// Check if a capability is supported.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Check if a message type is supported.
    pub fn supports_message_type(&self, message_type: MessageType) -> bool {
        self.message_types.contains(&message_type)
    }

    /// Intersection of supported and requested capabilities, in local
    /// preference order.
    pub fn intersect_capabilities(&self, requested: &[Capability]) -> Vec<Capability> {
        self.capabilities
            .iter()
            .filter(|c| requested.contains(c))
            .copied()
            .collect()
    }

    /// Intersection of supported and requested message types, in local
    /// preference order.
    pub fn intersect_message_types(&self, requested: &[MessageType]) -> Vec<MessageType> {
        self.message_types
            .iter()
            .filter(|t| requested.contains(t))
            .copied()
            .collect()
    }

    /// Negotiate against a remote request.
    ///
    /// Acceptance is transactional: either both intersections are
    /// non-empty and the negotiated sets are returned, or the whole
    /// negotiation is refused. An empty message-type intersection rejects
    /// even when capabilities overlap, symmetric with capability
    /// rejection.
    pub fn negotiate(
        &self,
        request: &NegotiationRequest,
    ) -> std::result::Result<NegotiatedSet, NegotiationFailure> {
        let capabilities = self.intersect_capabilities(&request.capabilities);
        if capabilities.is_empty() {
            return Err(NegotiationFailure::NoMatchingCapabilities);
        }

        let message_types = self.intersect_message_types(&request.message_types);
        if message_types.is_empty() {
            return Err(NegotiationFailure::NoMatchingMessageTypes);
        }

        Ok(NegotiatedSet {
            capabilities,
            message_types,
        })
    }
}

/// Result of a successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedSet {
    /// Agreed capabilities
    pub capabilities: Vec<Capability>,
    /// Agreed message types
    pub message_types: Vec<MessageType>,
}

/// Why a negotiation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationFailure {
    /// No mutually supported capability
    NoMatchingCapabilities,
    /// Capabilities overlap but no mutually supported message type
    NoMatchingMessageTypes,
}

impl NegotiationFailure {
    /// Taxonomy code for the rejection. Both failure modes share
    /// `NO_MATCHING_CAPABILITIES` on the wire; the message distinguishes
    /// them.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::NoMatchingCapabilities
    }

    /// Human-readable rejection reason.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoMatchingCapabilities => "no mutually supported capabilities",
            Self::NoMatchingMessageTypes => "no mutually supported message types",
        }
    }
}

/// Capability negotiation request from a remote peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationRequest {
    /// The requesting agent's id (must match the session's bound peer)
    pub agent_id: String,
    /// Requested capabilities
    pub capabilities: Vec<Capability>,
    /// Requested message types; peers that omit the field request all
    #[serde(default = "all_message_types")]
    pub message_types: Vec<MessageType>,
}

impl NegotiationRequest {
    /// Create a request for the given capabilities and all message types.
    pub fn new(agent_id: &str, capabilities: Vec<Capability>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            capabilities,
            message_types: all_message_types(),
        }
    }

    /// Restrict the requested message types.
    pub fn with_message_types(mut self, message_types: Vec<MessageType>) -> Self {
        self.message_types = message_types;
        self
    }
}

/// Capability negotiation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationResponse {
    /// Whether the negotiation was accepted
    pub accepted: bool,
    /// Accepted capabilities (empty on rejection)
    pub capabilities: Vec<Capability>,
    /// Accepted message types (empty on rejection)
    pub supported_message_types: Vec<MessageType>,
    /// Session id, present only on acceptance (correlates control acks)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Rejection reason, present only on refusal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<NegotiationError>,
}

impl NegotiationResponse {
    /// Build an acceptance carrying the negotiated sets and session id.
    pub fn accepted(negotiated: NegotiatedSet, session_id: &str) -> Self {
        Self {
            accepted: true,
            capabilities: negotiated.capabilities,
            supported_message_types: negotiated.message_types,
            session_id: Some(session_id.to_string()),
            error: None,
        }
    }

    /// Build a rejection with the given code and message.
    pub fn rejected(code: ErrorCode, message: &str) -> Self {
        Self {
            accepted: false,
            capabilities: Vec::new(),
            supported_message_types: Vec::new(),
            session_id: None,
            error: Some(NegotiationError {
                code,
                message: message.to_string(),
            }),
        }
    }
}

/// Rejection details inside a [`NegotiationResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationError {
    /// Rejection reason code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
}

fn all_message_types() -> Vec<MessageType> {
    vec![
        MessageType::Text,
        MessageType::Json,
        MessageType::Binary,
        MessageType::Control,
    ]
}
