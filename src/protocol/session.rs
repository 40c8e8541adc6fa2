//! Session management for the A2A protocol.
//!
//! Handles the lifecycle of one local agent's relationship to one remote
//! peer: discovery, connection, capability negotiation, message exchange,
//! and teardown. All transitions are driven by bus events or direct calls
//! on the owning task; a session attached to the bus is wrapped in its own
//! mutex and receives events sequentially.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::capabilities::{Capability, CapabilitySet, NegotiationRequest, NegotiationResponse};
use super::conversation::ConversationRegistry;
use super::message::{A2AMessage, ControlAction, ControlContent, MessageType};
use crate::bus::{BusEvent, EventBus, EventSubscriber, Topic};
use crate::config::SessionConfig;
use crate::error::{ErrorCode, ErrorNotice, Result};

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial state, waiting for discovery to locate a peer
    Discovering,
    /// Connection attempt in flight
    Connecting,
    /// Connected, capability negotiation pending
    Negotiating,
    /// Negotiated, exchanging messages
    Ready,
    /// Unrecoverable failure (terminal)
    Error,
    /// Session torn down (terminal)
    Disconnected,
}

impl SessionState {
    /// Terminal states admit no further transitions; a fresh session must
    /// be created for a new attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error | Self::Disconnected)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Discovering => "discovering",
            Self::Connecting => "connecting",
            Self::Negotiating => "negotiating",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
        };
        write!(f, "{name}")
    }
}

/// Per-message-type application handler.
///
/// Invoked synchronously (awaited) after the conversation is registered
/// and before the generic `message incoming` event is published. Errors
/// are caught at the dispatch boundary and re-surfaced to the peer and
/// the bus; they never tear the session down.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one validated inbound message.
    async fn handle(&self, message: &A2AMessage) -> Result<()>;
}

/// A2A protocol session.
///
/// One instance per authenticated local agent identity. Owned exclusively
/// by its driving task; all mutation goes through `&mut self`.
pub struct Session {
    /// Session ID, generated once at construction
    session_id: String,
    /// Local agent identity this session belongs to
    agent_id: String,
    /// Current lifecycle state
    state: SessionState,
    /// Peer discovered but not yet connected
    pending_peer: Option<String>,
    /// Bound remote peer, set when a connection attempt succeeds
    remote_agent_id: Option<String>,
    /// Locally supported capabilities and message types
    local_caps: CapabilitySet,
    /// Negotiated capabilities, empty until negotiation succeeds
    capabilities: Vec<Capability>,
    /// Negotiated message types, empty until negotiation succeeds
    message_types: Vec<MessageType>,
    /// Conversations seen by this session
    conversations: ConversationRegistry,
    /// Registered per-type message handlers
    handlers: HashMap<MessageType, Arc<dyn MessageHandler>>,
    /// Outbound event channel
    bus: Arc<EventBus>,
    /// Timeout configuration
    config: SessionConfig,
    /// Creation timestamp
    created_at: Instant,
    /// Last activity timestamp
    last_activity: Instant,
    /// Messages sent
    messages_sent: u64,
    /// Messages received
    messages_received: u64,
}

impl Session {
    /// Create a new session for a local agent identity.
    pub fn new(agent_id: &str, local_caps: CapabilitySet, bus: Arc<EventBus>) -> Self {
        Self::with_config(agent_id, local_caps, bus, SessionConfig::default())
    }

    /// Create a new session with explicit timeout configuration.
    pub fn with_config(
        agent_id: &str,
        local_caps: CapabilitySet,
        bus: Arc<EventBus>,
        config: SessionConfig,
    ) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            state: SessionState::Discovering,
            pending_peer: None,
            remote_agent_id: None,
            local_caps,
            capabilities: Vec::new(),
            message_types: Vec::new(),
            conversations: ConversationRegistry::new(),
            handlers: HashMap::new(),
            bus,
            config,
            created_at: Instant::now(),
            last_activity: Instant::now(),
            messages_sent: 0,
            messages_received: 0,
        }
    }

    /// Wrap a session in its own mutex and subscribe it to the topics it
    /// consumes (`agent discovered`, `connection result`, raw inbound
    /// messages). The returned handle is the only way to reach the
    /// session afterwards.
    pub async fn attach(session: Session) -> Arc<Mutex<Session>> {
        let bus = Arc::clone(&session.bus);
        let handle = Arc::new(Mutex::new(session));
        let subscriber = Arc::new(SessionSubscriber {
            session: Arc::clone(&handle),
        });
        bus.subscribe_many(
            &[
                Topic::AgentDiscovered,
                Topic::ConnectionResult,
                Topic::InboundMessage,
            ],
            subscriber,
        )
        .await;
        handle
    }

    /// Get session ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the local agent id
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get the bound remote peer, if a connection attempt has succeeded
    pub fn remote_agent_id(&self) -> Option<&str> {
        self.remote_agent_id.as_deref()
    }

    /// Negotiated capabilities (empty until negotiation succeeds)
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Negotiated message types (empty until negotiation succeeds)
    pub fn message_types(&self) -> &[MessageType] {
        &self.message_types
    }

    /// Snapshot of conversations known to this session
    pub fn active_conversations(&self) -> Vec<String> {
        self.conversations.snapshot()
    }

    /// Check if the session is ready for application messages
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Check if the session has exceeded its phase timeout.
    ///
    /// The engine never fires a timer itself; a caller-level supervisor
    /// polls this and invokes [`Session::disconnect`] on expiry.
    pub fn is_expired(&self) -> bool {
        let timeout = match self.state {
            SessionState::Connecting | SessionState::Negotiating => {
                self.config.handshake_timeout()
            }
            _ => self.config.idle_timeout(),
        };
        self.last_activity.elapsed() > timeout
    }

    /// Register a handler for a message type. At most one handler per
    /// type; a later registration replaces the earlier one.
    pub fn register_message_handler(
        &mut self,
        message_type: MessageType,
        handler: Arc<dyn MessageHandler>,
    ) {
        self.handlers.insert(message_type, handler);
    }

    /// Reserve a fresh conversation id without sending a message.
    pub fn create_conversation(&mut self, remote_agent_id: &str) -> Result<String> {
        if let Some(remote) = &self.remote_agent_id {
            if remote != remote_agent_id {
                return Err(crate::error::A2AError::AgentMismatch(format!(
                    "session is bound to {remote}, not {remote_agent_id}"
                )));
            }
        }
        let conversation_id = uuid::Uuid::new_v4().to_string();
        self.conversations.register(&conversation_id);
        Ok(conversation_id)
    }

    /// Dispatch a consumed bus event to the session.
    pub async fn handle_event(&mut self, event: &BusEvent) {
        match event {
            BusEvent::AgentDiscovered { agent_id } => self.handle_agent_discovered(agent_id),
            BusEvent::ConnectionResult { agent_id, success } => {
                self.handle_connection_result(agent_id, *success).await;
            }
            BusEvent::InboundMessage { payload } => {
                self.handle_incoming(payload.clone()).await;
            }
            _ => {}
        }
    }

    /// Negotiate capabilities with the bound remote peer.
    ///
    /// Rejects with `INVALID_AGENT` (no state change) when the request
    /// does not come from the bound peer, and with
    /// `NO_MATCHING_CAPABILITIES` (state moves to `Error`) when either
    /// intersection is empty. On acceptance the session moves to `Ready`
    /// and the response echoes the session id for control-ack
    /// correlation.
    pub async fn negotiate(&mut self, request: &NegotiationRequest) -> NegotiationResponse {
        if self.state.is_terminal() {
            // Terminal sessions never negotiate; a fresh session is required.
            return NegotiationResponse::rejected(
                ErrorCode::InvalidAgent,
                "session is terminated",
            );
        }

        let bound = match &self.remote_agent_id {
            Some(remote) if *remote == request.agent_id => remote.clone(),
            _ => {
                tracing::warn!(
                    session = %self.session_id,
                    requested = %request.agent_id,
                    "negotiation from agent that is not the bound peer"
                );
                let notice = ErrorNotice::new(
                    ErrorCode::InvalidAgent,
                    format!("{} is not the connected peer", request.agent_id),
                )
                .with_agent(&self.agent_id);
                self.bus.publish(BusEvent::Error(notice)).await;
                return NegotiationResponse::rejected(
                    ErrorCode::InvalidAgent,
                    "agent does not match the connected peer",
                );
            }
        };

        self.touch();

        match self.local_caps.negotiate(request) {
            Ok(negotiated) => {
                self.capabilities = negotiated.capabilities.clone();
                self.message_types = negotiated.message_types.clone();
                if self.state != SessionState::Ready {
                    self.transition(SessionState::Ready);
                }
                tracing::info!(
                    session = %self.session_id,
                    peer = %bound,
                    capabilities = ?self.capabilities,
                    "capability negotiation accepted"
                );
                NegotiationResponse::accepted(negotiated, &self.session_id)
            }
            Err(failure) => {
                self.transition(SessionState::Error);
                let notice = ErrorNotice::new(failure.code(), failure.message())
                    .with_agent(&self.agent_id);
                self.bus.publish(BusEvent::Error(notice)).await;
                NegotiationResponse::rejected(failure.code(), failure.message())
            }
        }
    }

    /// Send a message to the peer by publishing it on the outbound
    /// channel.
    ///
    /// Application messages require the `Ready` state; control messages
    /// (handshake, keep-alive, teardown) are also valid while
    /// `Connecting`/`Negotiating`. Returns `false` instead of erroring
    /// when the send is refused.
    pub async fn send_message(&mut self, message: A2AMessage) -> bool {
        let is_control = message.message_type() == MessageType::Control;
        let allowed = match self.state {
            SessionState::Ready => true,
            SessionState::Connecting | SessionState::Negotiating => is_control,
            _ => false,
        };
        if !allowed {
            tracing::warn!(
                session = %self.session_id,
                state = %self.state,
                message_type = %message.message_type(),
                "send refused in current state"
            );
            return false;
        }

        if message.from_agent != self.agent_id {
            tracing::warn!(
                session = %self.session_id,
                from = %message.from_agent,
                "outbound message does not carry the session's agent id"
            );
            return false;
        }

        self.conversations.register(&message.conversation_id);
        self.publish_outgoing(message).await;
        true
    }

    /// Validate a raw inbound payload and dispatch it.
    ///
    /// Validation failures publish `MESSAGE_VALIDATION_FAILED` and leave
    /// state untouched; an agent-identity mismatch is unrecoverable and
    /// moves the session to `Error`. Control messages go to the control
    /// dispatcher; anything else registers the conversation, runs the
    /// registered handler (if any), and is re-published as
    /// `message incoming` for external consumers.
    pub async fn handle_incoming(&mut self, payload: Value) {
        if self.state.is_terminal() {
            tracing::trace!(session = %self.session_id, state = %self.state, "dropping inbound in terminal state");
            return;
        }

        let message = match A2AMessage::from_value(payload.clone()) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(session = %self.session_id, error = %e, "inbound message failed validation");
                let notice =
                    ErrorNotice::new(ErrorCode::MessageValidationFailed, e.to_string())
                        .with_agent(&self.agent_id)
                        .with_details(payload);
                self.bus.publish(BusEvent::Error(notice)).await;
                return;
            }
        };

        if !self.verify_addressing(&message).await {
            return;
        }

        self.messages_received += 1;
        self.touch();

        if let Some(control) = message.get_control() {
            let control = control.clone();
            self.handle_control(&message, &control).await;
            return;
        }

        self.conversations.register(&message.conversation_id);

        if let Some(handler) = self.handlers.get(&message.message_type()).cloned() {
            if let Err(e) = handler.handle(&message).await {
                tracing::error!(
                    session = %self.session_id,
                    message_type = %message.message_type(),
                    error = %e,
                    "message handler failed"
                );
                self.notify_processing_error(&message, &e.to_string()).await;
            }
        }

        self.bus.publish(BusEvent::MessageIncoming(message)).await;
    }

    /// Tear the session down.
    ///
    /// From any non-terminal state: sends `control/disconnect` to the
    /// peer (when one is bound), transitions to `Disconnected`, and
    /// publishes one `agent disconnected` event. Calling again from a
    /// terminal state is a no-op.
    pub async fn disconnect(&mut self, reason: Option<&str>) {
        if self.state.is_terminal() {
            return;
        }

        if let Some(remote) = self.remote_agent_id.clone() {
            let mut data = HashMap::new();
            if let Some(reason) = reason {
                data.insert("reason".to_string(), Value::String(reason.to_string()));
            }
            let message = A2AMessage::control(
                &self.agent_id,
                &remote,
                &uuid::Uuid::new_v4().to_string(),
                ControlAction::Disconnect,
                (!data.is_empty()).then_some(data),
            );
            self.publish_outgoing(message).await;
        }

        self.finish_disconnect(reason.map(String::from)).await;
    }

    /// Get session statistics
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.session_id.clone(),
            state: self.state,
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
            conversations: self.conversations.len(),
            uptime_secs: self.created_at.elapsed().as_secs(),
        }
    }

    fn handle_agent_discovered(&mut self, agent_id: &str) {
        if self.state != SessionState::Discovering {
            tracing::trace!(session = %self.session_id, state = %self.state, "ignoring discovery event");
            return;
        }
        tracing::debug!(session = %self.session_id, peer = %agent_id, "peer discovered");
        self.pending_peer = Some(agent_id.to_string());
        self.touch();
        self.transition(SessionState::Connecting);
    }

    async fn handle_connection_result(&mut self, agent_id: &str, success: bool) {
        if self.state != SessionState::Connecting {
            tracing::trace!(session = %self.session_id, state = %self.state, "ignoring connection result");
            return;
        }
        // Results for other peers belong to other sessions on the bus.
        if let Some(pending) = &self.pending_peer {
            if pending != agent_id {
                tracing::trace!(session = %self.session_id, peer = %agent_id, "connection result for a different peer");
                return;
            }
        }

        self.touch();

        if success {
            self.remote_agent_id = Some(agent_id.to_string());
            self.transition(SessionState::Negotiating);
            tracing::info!(session = %self.session_id, peer = %agent_id, "connected to peer");
            self.bus
                .publish(BusEvent::AgentConnected {
                    agent_id: self.agent_id.clone(),
                    remote_agent_id: agent_id.to_string(),
                })
                .await;
        } else {
            self.transition(SessionState::Error);
            let notice = ErrorNotice::new(
                ErrorCode::ConnectionFailed,
                format!("connection to {agent_id} failed"),
            )
            .with_agent(&self.agent_id);
            self.bus.publish(BusEvent::Error(notice)).await;
        }
    }

    async fn handle_control(&mut self, message: &A2AMessage, control: &ControlContent) {
        match control.action {
            ControlAction::Connect => {
                // Remote-initiated connection: bind the peer if none is
                // bound yet, acknowledge, and move to negotiation.
                let newly_bound = self.remote_agent_id.is_none();
                if newly_bound {
                    self.remote_agent_id = Some(message.from_agent.clone());
                    self.pending_peer = None;
                }
                self.send_ack(message).await;
                match self.state {
                    SessionState::Discovering | SessionState::Connecting => {
                        self.transition(SessionState::Negotiating);
                    }
                    _ => {}
                }
                if newly_bound {
                    tracing::info!(session = %self.session_id, peer = %message.from_agent, "remote-initiated connection");
                    self.bus
                        .publish(BusEvent::AgentConnected {
                            agent_id: self.agent_id.clone(),
                            remote_agent_id: message.from_agent.clone(),
                        })
                        .await;
                }
            }
            ControlAction::Ping => {
                self.send_ack(message).await;
            }
            ControlAction::Disconnect => {
                self.send_ack(message).await;
                let reason = control
                    .data
                    .as_ref()
                    .and_then(|data| data.get("reason"))
                    .and_then(Value::as_str)
                    .map(String::from);
                tracing::info!(session = %self.session_id, ?reason, "peer disconnected");
                self.finish_disconnect(reason).await;
            }
            ControlAction::Ack => {
                // Informational; reserved for future correlation use.
                tracing::debug!(
                    session = %self.session_id,
                    correlation = ?message.correlation_id,
                    "control ack received"
                );
            }
        }
    }

    /// Reject messages whose addressing contradicts the session identity.
    /// Returns `false` when the message must not be processed further.
    async fn verify_addressing(&mut self, message: &A2AMessage) -> bool {
        let mismatch = if message.to_agent != self.agent_id {
            Some(format!(
                "message addressed to {}, session belongs to {}",
                message.to_agent, self.agent_id
            ))
        } else {
            match &self.remote_agent_id {
                Some(remote) if *remote != message.from_agent => Some(format!(
                    "message from {}, session is bound to {remote}",
                    message.from_agent
                )),
                _ => None,
            }
        };

        match mismatch {
            None => true,
            Some(description) => {
                tracing::warn!(session = %self.session_id, %description, "agent mismatch on inbound message");
                self.transition(SessionState::Error);
                let notice = ErrorNotice::new(ErrorCode::InvalidAgent, description)
                    .with_agent(&self.agent_id);
                self.bus.publish(BusEvent::Error(notice)).await;
                false
            }
        }
    }

    async fn send_ack(&mut self, message: &A2AMessage) {
        let ack = A2AMessage::ack(
            &self.agent_id,
            &message.from_agent,
            &message.conversation_id,
            &message.id,
        );
        self.publish_outgoing(ack).await;
    }

    /// Report a handler failure to the peer and the bus without touching
    /// lifecycle state.
    async fn notify_processing_error(&mut self, message: &A2AMessage, detail: &str) {
        let mut content = serde_json::Map::new();
        content.insert(
            "error".to_string(),
            serde_json::json!({
                "code": ErrorCode::ProcessingError.as_str(),
                "message": detail,
            }),
        );
        let reply = A2AMessage::json(
            &self.agent_id,
            &message.from_agent,
            &message.conversation_id,
            content,
        )
        .with_correlation(&message.id);
        self.publish_outgoing(reply).await;

        let notice = ErrorNotice::new(ErrorCode::ProcessingError, detail)
            .with_agent(&self.agent_id)
            .with_details(serde_json::json!({"messageId": message.id}));
        self.bus.publish(BusEvent::Error(notice)).await;
    }

    async fn finish_disconnect(&mut self, reason: Option<String>) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.transition(SessionState::Disconnected);
        self.bus
            .publish(BusEvent::AgentDisconnected {
                agent_id: self.agent_id.clone(),
                remote_agent_id: self.remote_agent_id.clone(),
                reason,
            })
            .await;
    }

    async fn publish_outgoing(&mut self, message: A2AMessage) {
        self.messages_sent += 1;
        self.touch();
        self.bus.publish(BusEvent::MessageOutgoing(message)).await;
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            session = %self.session_id,
            from = %self.state,
            to = %next,
            "session state transition"
        );
        self.state = next;
    }

    /// Update last activity timestamp
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Bus adapter delivering consumed topics into the session under its lock.
struct SessionSubscriber {
    session: Arc<Mutex<Session>>,
}

#[async_trait]
impl EventSubscriber for SessionSubscriber {
    async fn on_event(&self, event: &BusEvent) {
        let mut session = self.session.lock().await;
        session.handle_event(event).await;
    }
}

/// Session statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Session ID
    pub session_id: String,
    /// Current state
    pub state: SessionState,
    /// Messages sent
    pub messages_sent: u64,
    /// Messages received
    pub messages_received: u64,
    /// Conversations tracked
    pub conversations: usize,
    /// Session uptime in seconds
    pub uptime_secs: u64,
}
