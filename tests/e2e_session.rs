//! End-to-end session lifecycle tests.
//!
//! These tests drive the state machine exclusively through public bus
//! events and API calls, asserting on the events it publishes back —
//! no reaching into session internals.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use a2a::bus::{BusEvent, EventBus, EventSubscriber, Topic};
use a2a::error::{ErrorCode, ErrorNotice};
use a2a::protocol::{
    A2AMessage, Capability, CapabilitySet, ControlAction, MessageContent, MessageHandler,
    MessageType, NegotiationRequest, Session, SessionState,
};

/// Records every event published on the topics the engine produces.
struct Collector {
    events: Mutex<Vec<BusEvent>>,
}

#[async_trait]
impl EventSubscriber for Collector {
    async fn on_event(&self, event: &BusEvent) {
        self.events.lock().await.push(event.clone());
    }
}

impl Collector {
    async fn attach(bus: &EventBus) -> Arc<Self> {
        let collector = Arc::new(Self {
            events: Mutex::new(Vec::new()),
        });
        bus.subscribe_many(
            &[
                Topic::MessageOutgoing,
                Topic::MessageIncoming,
                Topic::AgentConnected,
                Topic::AgentDisconnected,
                Topic::Error,
            ],
            collector.clone(),
        )
        .await;
        collector
    }

    async fn outgoing(&self) -> Vec<A2AMessage> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                BusEvent::MessageOutgoing(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    async fn incoming(&self) -> Vec<A2AMessage> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                BusEvent::MessageIncoming(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    async fn errors(&self) -> Vec<ErrorNotice> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                BusEvent::Error(notice) => Some(notice.clone()),
                _ => None,
            })
            .collect()
    }

    async fn disconnect_events(&self) -> Vec<(Option<String>, Option<String>)> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                BusEvent::AgentDisconnected {
                    remote_agent_id,
                    reason,
                    ..
                } => Some((remote_agent_id.clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }

    /// Outbound `control/ack` messages.
    async fn acks(&self) -> Vec<A2AMessage> {
        self.outgoing()
            .await
            .into_iter()
            .filter(|message| {
                message
                    .get_control()
                    .is_some_and(|control| control.action == ControlAction::Ack)
            })
            .collect()
    }
}

const LOCAL: &str = "agent-local";
const REMOTE: &str = "agent-remote";

async fn setup() -> (Arc<EventBus>, Arc<Mutex<Session>>, Arc<Collector>) {
    setup_with_caps(CapabilitySet::default()).await
}

async fn setup_with_caps(
    caps: CapabilitySet,
) -> (Arc<EventBus>, Arc<Mutex<Session>>, Arc<Collector>) {
    let bus = Arc::new(EventBus::new());
    let collector = Collector::attach(&bus).await;
    let session = Session::attach(Session::new(LOCAL, caps, Arc::clone(&bus))).await;
    (bus, session, collector)
}

/// Drive discovery and a successful connection through the bus.
async fn connect(bus: &EventBus) {
    bus.publish(BusEvent::AgentDiscovered {
        agent_id: REMOTE.to_string(),
    })
    .await;
    bus.publish(BusEvent::ConnectionResult {
        agent_id: REMOTE.to_string(),
        success: true,
    })
    .await;
}

async fn negotiate_ready(session: &Mutex<Session>) {
    let response = session
        .lock()
        .await
        .negotiate(&NegotiationRequest::new(REMOTE, vec![Capability::Messaging]))
        .await;
    assert!(response.accepted);
}

/// Raw inbound payload for a message authored by the remote peer.
fn inbound(message: &A2AMessage) -> BusEvent {
    BusEvent::InboundMessage {
        payload: message.to_value().unwrap(),
    }
}

#[tokio::test]
async fn test_full_lifecycle_happy_path() {
    let (bus, session, collector) = setup().await;

    assert_eq!(session.lock().await.state(), SessionState::Discovering);

    bus.publish(BusEvent::AgentDiscovered {
        agent_id: REMOTE.to_string(),
    })
    .await;
    assert_eq!(session.lock().await.state(), SessionState::Connecting);

    bus.publish(BusEvent::ConnectionResult {
        agent_id: REMOTE.to_string(),
        success: true,
    })
    .await;
    {
        let guard = session.lock().await;
        assert_eq!(guard.state(), SessionState::Negotiating);
        assert_eq!(guard.remote_agent_id(), Some(REMOTE));
        assert!(guard.capabilities().is_empty());
    }

    negotiate_ready(&session).await;
    {
        let guard = session.lock().await;
        assert_eq!(guard.state(), SessionState::Ready);
        assert_eq!(guard.capabilities(), &[Capability::Messaging]);
    }

    let sent = session
        .lock()
        .await
        .send_message(A2AMessage::text(LOCAL, REMOTE, "conv-1", "hello"))
        .await;
    assert!(sent);
    assert_eq!(collector.outgoing().await.len(), 1);

    session.lock().await.disconnect(Some("shutting down")).await;
    assert_eq!(session.lock().await.state(), SessionState::Disconnected);

    let disconnects = collector.disconnect_events().await;
    assert_eq!(disconnects.len(), 1);
    assert_eq!(
        disconnects[0],
        (Some(REMOTE.to_string()), Some("shutting down".to_string()))
    );
}

#[tokio::test]
async fn test_connection_failure_reaches_error() {
    let (bus, session, collector) = setup().await;

    bus.publish(BusEvent::AgentDiscovered {
        agent_id: REMOTE.to_string(),
    })
    .await;
    bus.publish(BusEvent::ConnectionResult {
        agent_id: REMOTE.to_string(),
        success: false,
    })
    .await;

    assert_eq!(session.lock().await.state(), SessionState::Error);
    let errors = collector.errors().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::ConnectionFailed);
}

#[tokio::test]
async fn test_no_event_leaves_terminal_states() {
    let (bus, session, collector) = setup().await;

    connect(&bus).await;
    negotiate_ready(&session).await;
    session.lock().await.disconnect(None).await;
    assert_eq!(session.lock().await.state(), SessionState::Disconnected);

    let outgoing_before = collector.outgoing().await.len();

    // A new discovery, a connection result, and an inbound ping all bounce.
    bus.publish(BusEvent::AgentDiscovered {
        agent_id: "agent-third".to_string(),
    })
    .await;
    bus.publish(BusEvent::ConnectionResult {
        agent_id: "agent-third".to_string(),
        success: true,
    })
    .await;
    let ping = A2AMessage::control(REMOTE, LOCAL, "conv-ping", ControlAction::Ping, None);
    bus.publish(inbound(&ping)).await;

    assert_eq!(session.lock().await.state(), SessionState::Disconnected);
    assert_eq!(collector.outgoing().await.len(), outgoing_before);
}

#[tokio::test]
async fn test_no_matching_capabilities_rejection() {
    let caps = CapabilitySet::new(vec![Capability::Messaging, Capability::AgentDiscovery]);
    let (bus, session, collector) = setup_with_caps(caps).await;
    connect(&bus).await;

    let response = session
        .lock()
        .await
        .negotiate(&NegotiationRequest::new(REMOTE, vec![Capability::TaskExecution]))
        .await;

    assert!(!response.accepted);
    assert!(response.capabilities.is_empty());
    assert_eq!(
        response.error.unwrap().code,
        ErrorCode::NoMatchingCapabilities
    );
    assert_eq!(session.lock().await.state(), SessionState::Error);

    let errors = collector.errors().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::NoMatchingCapabilities);
}

#[tokio::test]
async fn test_invalid_agent_rejection_keeps_state() {
    let (bus, session, _collector) = setup().await;
    connect(&bus).await;

    let response = session
        .lock()
        .await
        .negotiate(&NegotiationRequest::new(
            "agent-wrong",
            vec![Capability::Messaging],
        ))
        .await;

    assert!(!response.accepted);
    assert_eq!(response.error.unwrap().code, ErrorCode::InvalidAgent);
    assert!(response.session_id.is_none());
    assert_eq!(session.lock().await.state(), SessionState::Negotiating);
}

#[tokio::test]
async fn test_negotiation_idempotent_on_same_inputs() {
    let (bus, session, _collector) = setup().await;
    connect(&bus).await;

    let request = NegotiationRequest::new(REMOTE, vec![Capability::Messaging]);
    let first = session.lock().await.negotiate(&request).await;
    let second = session.lock().await.negotiate(&request).await;

    assert!(first.accepted && second.accepted);
    assert_eq!(first.capabilities, second.capabilities);
    assert_eq!(
        first.supported_message_types,
        second.supported_message_types
    );
    assert_eq!(first.session_id, second.session_id);
}

/// Content survives send → wire → mirrored peer byte-for-byte.
#[tokio::test]
async fn test_text_and_json_round_trip() {
    let (bus_a, session_a, collector_a) = setup().await;
    connect(&bus_a).await;
    negotiate_ready(&session_a).await;

    // Mirrored peer session: agent-remote bound to agent-local.
    let bus_b = Arc::new(EventBus::new());
    let collector_b = Collector::attach(&bus_b).await;
    let session_b =
        Session::attach(Session::new(REMOTE, CapabilitySet::default(), Arc::clone(&bus_b))).await;
    bus_b
        .publish(BusEvent::AgentDiscovered {
            agent_id: LOCAL.to_string(),
        })
        .await;
    bus_b
        .publish(BusEvent::ConnectionResult {
            agent_id: LOCAL.to_string(),
            success: true,
        })
        .await;
    let response = session_b
        .lock()
        .await
        .negotiate(&NegotiationRequest::new(LOCAL, vec![Capability::Messaging]))
        .await;
    assert!(response.accepted);

    let text = A2AMessage::text(LOCAL, REMOTE, "conv-rt", "feedback: ótimo produto ✓");
    let json_content = json!({"rating": 5, "tags": ["fast", "reliable"], "nested": {"a": 1}});
    let json_message = A2AMessage::json(
        LOCAL,
        REMOTE,
        "conv-rt",
        json_content.as_object().unwrap().clone(),
    );

    for original in [text, json_message] {
        assert!(session_a.lock().await.send_message(original.clone()).await);

        // The transport would carry the serialized outgoing payload.
        let wire = collector_a.outgoing().await.last().unwrap().to_value().unwrap();
        bus_b.publish(BusEvent::InboundMessage { payload: wire }).await;

        let delivered = collector_b.incoming().await;
        let received = delivered.last().unwrap();
        assert_eq!(received.content, original.content);
        assert_eq!(received.id, original.id);
    }
}

#[tokio::test]
async fn test_conversation_tracked_exactly_once() {
    let (bus, session, _collector) = setup().await;
    connect(&bus).await;
    negotiate_ready(&session).await;

    // Outbound registration
    session
        .lock()
        .await
        .send_message(A2AMessage::text(LOCAL, REMOTE, "conv-x", "one"))
        .await;
    session
        .lock()
        .await
        .send_message(A2AMessage::text(LOCAL, REMOTE, "conv-x", "two"))
        .await;

    let conversations = session.lock().await.active_conversations();
    assert_eq!(
        conversations.iter().filter(|c| c.as_str() == "conv-x").count(),
        1
    );

    // Inbound registration of a fresh conversation
    let inbound_message = A2AMessage::text(REMOTE, LOCAL, "conv-y", "hi");
    bus.publish(inbound(&inbound_message)).await;
    bus.publish(inbound(&inbound_message)).await;

    let conversations = session.lock().await.active_conversations();
    assert_eq!(
        conversations.iter().filter(|c| c.as_str() == "conv-y").count(),
        1
    );
    assert_eq!(conversations.len(), 2);
}

#[tokio::test]
async fn test_disconnect_symmetry_local() {
    let (bus, session, collector) = setup().await;
    connect(&bus).await;
    negotiate_ready(&session).await;

    session.lock().await.disconnect(Some("done")).await;
    session.lock().await.disconnect(Some("again")).await; // no-op

    assert_eq!(collector.disconnect_events().await.len(), 1);

    // Exactly one outbound control/disconnect went to the peer.
    let disconnect_messages: Vec<_> = collector
        .outgoing()
        .await
        .into_iter()
        .filter(|m| {
            m.get_control()
                .is_some_and(|c| c.action == ControlAction::Disconnect)
        })
        .collect();
    assert_eq!(disconnect_messages.len(), 1);
}

#[tokio::test]
async fn test_disconnect_symmetry_remote() {
    let (bus, session, collector) = setup().await;
    connect(&bus).await;
    negotiate_ready(&session).await;

    let mut data = std::collections::HashMap::new();
    data.insert("reason".to_string(), json!("peer shutting down"));
    let disconnect = A2AMessage::control(
        REMOTE,
        LOCAL,
        "conv-bye",
        ControlAction::Disconnect,
        Some(data),
    );
    bus.publish(inbound(&disconnect)).await;

    assert_eq!(session.lock().await.state(), SessionState::Disconnected);

    let disconnects = collector.disconnect_events().await;
    assert_eq!(disconnects.len(), 1);
    assert_eq!(
        disconnects[0],
        (
            Some(REMOTE.to_string()),
            Some("peer shutting down".to_string())
        )
    );

    // The teardown was acknowledged.
    let acks = collector.acks().await;
    assert_eq!(acks.len(), 1);
    assert_eq!(
        acks[0].get_control().unwrap().data.as_ref().unwrap()["forMessage"],
        json!(disconnect.id)
    );
}

#[tokio::test]
async fn test_ping_yields_exactly_one_ack() {
    let (bus, session, collector) = setup().await;
    connect(&bus).await;
    negotiate_ready(&session).await;

    let ping = A2AMessage::control(REMOTE, LOCAL, "conv-ping", ControlAction::Ping, None);
    bus.publish(inbound(&ping)).await;

    assert_eq!(session.lock().await.state(), SessionState::Ready);

    let acks = collector.acks().await;
    assert_eq!(acks.len(), 1);
    let control = acks[0].get_control().unwrap();
    assert_eq!(control.data.as_ref().unwrap()["forMessage"], json!(ping.id));
    assert_eq!(acks[0].to_agent, REMOTE);
}

#[tokio::test]
async fn test_remote_initiated_connect() {
    let (bus, session, collector) = setup().await;

    let connect_msg = A2AMessage::control(REMOTE, LOCAL, "conv-c", ControlAction::Connect, None);
    bus.publish(inbound(&connect_msg)).await;

    {
        let guard = session.lock().await;
        assert_eq!(guard.state(), SessionState::Negotiating);
        assert_eq!(guard.remote_agent_id(), Some(REMOTE));
    }

    let acks = collector.acks().await;
    assert_eq!(acks.len(), 1);
    assert_eq!(
        acks[0].get_control().unwrap().data.as_ref().unwrap()["forMessage"],
        json!(connect_msg.id)
    );
}

#[tokio::test]
async fn test_validation_failure_leaves_state_untouched() {
    let (bus, session, collector) = setup().await;
    connect(&bus).await;
    negotiate_ready(&session).await;

    bus.publish(BusEvent::InboundMessage {
        payload: json!({"type": "text", "content": 42}),
    })
    .await;

    assert_eq!(session.lock().await.state(), SessionState::Ready);

    let errors = collector.errors().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::MessageValidationFailed);
    assert!(collector.incoming().await.is_empty());
}

#[tokio::test]
async fn test_inbound_agent_mismatch_is_unrecoverable() {
    let (bus, session, collector) = setup().await;
    connect(&bus).await;
    negotiate_ready(&session).await;

    let forged = A2AMessage::text("agent-imposter", LOCAL, "conv-z", "let me in");
    bus.publish(inbound(&forged)).await;

    assert_eq!(session.lock().await.state(), SessionState::Error);
    let errors = collector.errors().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::InvalidAgent);
    assert!(collector.incoming().await.is_empty());
}

struct RecordingHandler {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: &A2AMessage) -> a2a::Result<()> {
        if let MessageContent::Text(text) = &message.content {
            self.seen.lock().await.push(text.clone());
        }
        Ok(())
    }
}

struct FailingHandler;

#[async_trait]
impl MessageHandler for FailingHandler {
    async fn handle(&self, _message: &A2AMessage) -> a2a::Result<()> {
        Err(a2a::A2AError::Handler("enrichment backend down".to_string()))
    }
}

#[tokio::test]
async fn test_handler_runs_before_incoming_event() {
    let (bus, session, collector) = setup().await;
    connect(&bus).await;
    negotiate_ready(&session).await;

    let handler = Arc::new(RecordingHandler {
        seen: Mutex::new(Vec::new()),
    });
    session
        .lock()
        .await
        .register_message_handler(MessageType::Text, handler.clone());

    let message = A2AMessage::text(REMOTE, LOCAL, "conv-h", "new feedback");
    bus.publish(inbound(&message)).await;

    assert_eq!(*handler.seen.lock().await, vec!["new feedback".to_string()]);
    // The generic incoming event is still published after the handler.
    assert_eq!(collector.incoming().await.len(), 1);
}

#[tokio::test]
async fn test_handler_replacement_keeps_latest() {
    let (bus, session, _collector) = setup().await;
    connect(&bus).await;
    negotiate_ready(&session).await;

    let first = Arc::new(RecordingHandler {
        seen: Mutex::new(Vec::new()),
    });
    let second = Arc::new(RecordingHandler {
        seen: Mutex::new(Vec::new()),
    });
    {
        let mut guard = session.lock().await;
        guard.register_message_handler(MessageType::Text, first.clone());
        guard.register_message_handler(MessageType::Text, second.clone());
    }

    let message = A2AMessage::text(REMOTE, LOCAL, "conv-h", "hello");
    bus.publish(inbound(&message)).await;

    assert!(first.seen.lock().await.is_empty());
    assert_eq!(second.seen.lock().await.len(), 1);
}

#[tokio::test]
async fn test_handler_failure_is_contained() {
    let (bus, session, collector) = setup().await;
    connect(&bus).await;
    negotiate_ready(&session).await;

    session
        .lock()
        .await
        .register_message_handler(MessageType::Text, Arc::new(FailingHandler));

    let message = A2AMessage::text(REMOTE, LOCAL, "conv-f", "poison");
    bus.publish(inbound(&message)).await;

    // Lifecycle state is untouched and the message still reaches consumers.
    assert_eq!(session.lock().await.state(), SessionState::Ready);
    assert_eq!(collector.incoming().await.len(), 1);

    // The peer got a correlated processing_error notification.
    let outgoing = collector.outgoing().await;
    let notification = outgoing
        .iter()
        .find(|m| m.message_type() == MessageType::Json)
        .expect("processing_error notification");
    assert_eq!(notification.correlation_id.as_deref(), Some(message.id.as_str()));
    match &notification.content {
        MessageContent::Json(content) => {
            assert_eq!(content["error"]["code"], json!("PROCESSING_ERROR"));
        }
        other => panic!("expected json content, got {other:?}"),
    }

    // And the bus carried the error notice.
    let errors = collector.errors().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::ProcessingError);
}

#[tokio::test]
async fn test_send_refused_outside_ready_states() {
    let (bus, session, collector) = setup().await;

    // Discovering: nothing may be sent, not even control.
    let early = A2AMessage::control(LOCAL, REMOTE, "conv-e", ControlAction::Ping, None);
    assert!(!session.lock().await.send_message(early).await);

    connect(&bus).await;

    // Negotiating: application messages refused, control allowed.
    let app = A2AMessage::text(LOCAL, REMOTE, "conv-e", "too early");
    assert!(!session.lock().await.send_message(app).await);

    let ping = A2AMessage::control(LOCAL, REMOTE, "conv-e", ControlAction::Ping, None);
    assert!(session.lock().await.send_message(ping).await);

    assert_eq!(collector.outgoing().await.len(), 1);
}
