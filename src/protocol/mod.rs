//! A2A Protocol negotiation and session management.
//!
//! Implements the A2A session protocol for agent-to-agent communication
//! with capability negotiation, typed message exchange, conversation
//! tracking, and session lifecycle management.
//!
//! # Protocol Overview
//!
//! Each session tracks one local agent's relationship to one remote peer.
//! Discovery and connection events arrive over the event bus; once a peer
//! is connected the pair negotiates capabilities before exchanging
//! application messages.
//!
//! ## Message Flow
//!
//! ```text
//! Local                              Remote
//!    |                                 |
//!    |<------ agent discovered        |   (discovery collaborator)
//!    |<------ connection result       |   (transport)
//!    |                                 |
//!    |------- negotiate(caps) ------->|   Intersect capability sets
//!    |<------ accept / reject --------|
//!    |                                 |
//!    |====== text/json/binary =======>|   Application exchange
//!    |<===== text/json/binary ========|
//!    |                                 |
//!    |------- control/ping ---------->|   Keep-alive
//!    |<------ control/ack ------------|
//!    |                                 |
//!    |------- control/disconnect ---->|   Teardown
//!    |<------ control/ack ------------|
//! ```
//!
//! ## State Machine
//!
//! Sessions transition through these states:
//!
//! | State          | Description                        | Valid Transitions          |
//! |----------------|------------------------------------|----------------------------|
//! | `Discovering`  | Waiting for discovery              | → Connecting, Negotiating  |
//! | `Connecting`   | Connection attempt in flight       | → Negotiating, Error       |
//! | `Negotiating`  | Capability negotiation pending     | → Ready, Error             |
//! | `Ready`        | Exchanging application messages    | → Disconnected             |
//! | `Error`        | Unrecoverable failure              | (terminal)                 |
//! | `Disconnected` | Torn down                          | (terminal)                 |
//!
//! An unrecoverable validation or agent-identity mismatch moves any
//! non-terminal state to `Error`. Nothing leaves `Error` or
//! `Disconnected`; a fresh session is required for a new attempt.
//!
//! ## Error Codes
//!
//! | Code                        | Meaning                                  |
//! |-----------------------------|------------------------------------------|
//! | `INVALID_AGENT`             | Agent id contradicts the bound peer      |
//! | `NO_MATCHING_CAPABILITIES`  | Empty capability/type intersection       |
//! | `MESSAGE_VALIDATION_FAILED` | Payload matches no message schema        |
//! | `CONNECTION_FAILED`         | Transport could not reach the peer       |
//! | `CONNECTION_TIMEOUT`        | Transport gave up waiting                |
//! | `AGENT_NOT_FOUND`           | Discovery cannot resolve the agent       |
//! | `AGENT_UNAVAILABLE`         | Agent resolved but unreachable           |
//! | `PROCESSING_ERROR`          | A registered message handler failed      |
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a::bus::{BusEvent, EventBus};
//! use a2a::protocol::{CapabilitySet, NegotiationRequest, Session};
//!
//! let bus = Arc::new(EventBus::new());
//! let session = Session::new("agent-local", CapabilitySet::default(), Arc::clone(&bus));
//! let session = Session::attach(session).await;
//!
//! // Drive the lifecycle through public events only
//! bus.publish(BusEvent::AgentDiscovered { agent_id: "agent-remote".into() }).await;
//! bus.publish(BusEvent::ConnectionResult { agent_id: "agent-remote".into(), success: true }).await;
//!
//! let response = session
//!     .lock()
//!     .await
//!     .negotiate(&NegotiationRequest::new("agent-remote", vec![/* ... */]))
//!     .await;
//! assert!(response.accepted);
//! ```

mod capabilities;
mod conversation;
mod message;
mod session;

pub use capabilities::{
    Capability, CapabilitySet, NegotiatedSet, NegotiationError, NegotiationFailure,
    NegotiationRequest, NegotiationResponse,
};
pub use conversation::ConversationRegistry;
pub use message::{
    A2AMessage, BinaryContent, ControlAction, ControlContent, MessageContent, MessageType,
};
pub use session::{MessageHandler, Session, SessionState, SessionStats};

/// Protocol version
pub const PROTOCOL_VERSION: &str = "1.0";
