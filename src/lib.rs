//! # A2A Protocol - Agent-to-Agent Session Engine
//!
//! Session protocol engine for a platform coordinating autonomous software
//! agents: per-agent-pair lifecycle management, capability negotiation,
//! typed message exchange, and conversation tracking, driven entirely by
//! asynchronous events over a persistent (transport-agnostic) connection.
//!
//! ## Features
//!
//! - **Session lifecycle**: discovery → connection → negotiation → ready →
//!   teardown, with strict legal-transition rules and terminal states
//! - **Capability negotiation**: pure intersection of supported/requested
//!   capability and message-type sets with accept/reject semantics
//! - **Typed envelopes**: tagged `text`/`json`/`binary`/`control` messages,
//!   validated before they reach the state machine
//! - **Event bus**: in-process pub/sub decoupling the engine from the
//!   transport, discovery, and audit collaborators
//! - **Pluggable handlers**: one application handler per message type,
//!   faults isolated at the dispatch boundary
//!
//! ## Architecture
//!
//! ```text
//! discovery ──┐                         ┌── audit / pipelines
//!             ▼                         ▼
//!        ┌─────────────────────────────────┐
//!        │            Event Bus            │
//!        └──┬──────────────▲───────────┬───┘
//!           │ discovered / │ outgoing, │ inbound
//!           │ conn result  │ errors    │ payloads
//!           ▼              │           ▼
//!        ┌─────────────────┴───────────────┐
//!        │     Session (state machine)     │
//!        └─────────────────────────────────┘
//!                          ▲
//!                          │ subscribes to `message outgoing`,
//!                          │ publishes `inbound message`
//!                  transport adapter
//! ```
//!
//! ## State Machine
//!
//! ```text
//!                agent discovered
//!  [Discovering] ───────────────────> [Connecting]
//!        │                                 │
//!        │ control/connect                 │ connection result
//!        │ (remote-initiated)              │
//!        v                                 v
//!  [Negotiating] <─────────────────────────┘ (success; failure → [Error])
//!        │
//!        │ negotiate: accepted            negotiate: rejected
//!        v                                 v
//!     [Ready] ─────────────────────> [Disconnected]        [Error]
//!              disconnect() or
//!              control/disconnect
//! ```
//!
//! `Error` and `Disconnected` are terminal; a fresh session is required
//! for a new attempt.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a::bus::{BusEvent, EventBus};
//! use a2a::protocol::{A2AMessage, CapabilitySet, NegotiationRequest, Session};
//!
//! let bus = Arc::new(EventBus::new());
//! let session = Session::attach(Session::new(
//!     "agent-local",
//!     CapabilitySet::default(),
//!     Arc::clone(&bus),
//! ))
//! .await;
//!
//! // Discovery and transport drive the lifecycle over the bus
//! bus.publish(BusEvent::AgentDiscovered { agent_id: "agent-remote".into() }).await;
//! bus.publish(BusEvent::ConnectionResult { agent_id: "agent-remote".into(), success: true }).await;
//!
//! // Negotiate and exchange
//! let mut guard = session.lock().await;
//! let response = guard
//!     .negotiate(&NegotiationRequest::new("agent-remote", guard.capabilities().to_vec()))
//!     .await;
//! assert!(response.accepted);
//!
//! let conversation = guard.create_conversation("agent-remote")?;
//! guard
//!     .send_message(A2AMessage::text("agent-local", "agent-remote", &conversation, "hello"))
//!     .await;
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Session state machine, negotiation, message envelopes
//! - [`bus`]: In-process event bus
//! - [`transport`]: Transport trait, loopback adapter, session registry
//! - [`config`]: Configuration management
//! - [`error`]: Error types and the protocol error taxonomy

pub mod bus;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use bus::{BusEvent, EventBus, EventSubscriber, Topic};
pub use config::Config;
pub use error::{A2AError, ErrorCode, ErrorNotice, Result};
pub use protocol::{
    A2AMessage, Capability, CapabilitySet, MessageHandler, MessageType, NegotiationRequest,
    NegotiationResponse, Session, SessionState,
};
pub use transport::{LoopbackTransport, SessionRegistry, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A2A Protocol version
pub const PROTOCOL_VERSION: &str = protocol::PROTOCOL_VERSION;
