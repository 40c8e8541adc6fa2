//! In-process event bus for protocol plumbing.
//!
//! Decouples the session state machine from the transport adapter,
//! discovery, and downstream consumers (audit, pipelines). Subscribers
//! register per [`Topic`]; [`EventBus::publish`] fans an event out to
//! every subscriber of its topic **sequentially**, awaiting each before
//! returning. That gives publish-order = delivery-order per topic, and no
//! ordering guarantee across topics published concurrently by different
//! sessions — handlers must not assume a global total order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::ErrorNotice;
use crate::protocol::A2AMessage;

/// Bus topics. One per event variant; subscriptions are per topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Discovery located a peer agent
    AgentDiscovered,
    /// Transport finished a connection attempt
    ConnectionResult,
    /// Raw inbound payload from the transport, not yet validated
    InboundMessage,
    /// Validated message leaving the engine, for the transport to deliver
    MessageOutgoing,
    /// Validated message that entered the engine, for external consumers
    MessageIncoming,
    /// A session bound its remote peer
    AgentConnected,
    /// A session tore down
    AgentDisconnected,
    /// Protocol error notice
    Error,
}

/// Events carried by the bus.
///
/// A closed tagged union per topic: payloads are decoded at the
/// subscriber boundary, keeping the engine's internals strongly typed.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// Discovery located a peer agent.
    AgentDiscovered {
        /// The discovered agent
        agent_id: String,
    },
    /// Transport finished a connection attempt.
    ConnectionResult {
        /// The peer the attempt targeted
        agent_id: String,
        /// Whether the connection was established
        success: bool,
    },
    /// Raw inbound payload routed to the owning session for validation.
    InboundMessage {
        /// Already-deserialized JSON object from the wire
        payload: serde_json::Value,
    },
    /// Validated outbound message for the transport to serialize and send.
    MessageOutgoing(A2AMessage),
    /// Validated inbound message for external consumers.
    MessageIncoming(A2AMessage),
    /// A session connected to its remote peer.
    AgentConnected {
        /// Local agent id
        agent_id: String,
        /// Bound remote peer id
        remote_agent_id: String,
    },
    /// A session disconnected.
    AgentDisconnected {
        /// Local agent id
        agent_id: String,
        /// Remote peer id, when one was bound
        remote_agent_id: Option<String>,
        /// Reason supplied by whichever side initiated teardown
        reason: Option<String>,
    },
    /// Protocol error notice.
    Error(ErrorNotice),
}

impl BusEvent {
    /// The topic this event is published on.
    pub fn topic(&self) -> Topic {
        match self {
            Self::AgentDiscovered { .. } => Topic::AgentDiscovered,
            Self::ConnectionResult { .. } => Topic::ConnectionResult,
            Self::InboundMessage { .. } => Topic::InboundMessage,
            Self::MessageOutgoing(_) => Topic::MessageOutgoing,
            Self::MessageIncoming(_) => Topic::MessageIncoming,
            Self::AgentConnected { .. } => Topic::AgentConnected,
            Self::AgentDisconnected { .. } => Topic::AgentDisconnected,
            Self::Error(_) => Topic::Error,
        }
    }
}

/// A bus subscriber.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Handle one delivered event.
    async fn on_event(&self, event: &BusEvent);
}

/// Topic-based publish/subscribe bus.
pub struct EventBus {
    subscribers: RwLock<HashMap<Topic, Vec<Arc<dyn EventSubscriber>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a single topic.
    pub async fn subscribe(&self, topic: Topic, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers
            .write()
            .await
            .entry(topic)
            .or_default()
            .push(subscriber);
    }

    /// Subscribe one subscriber to several topics.
    pub async fn subscribe_many(&self, topics: &[Topic], subscriber: Arc<dyn EventSubscriber>) {
        let mut subscribers = self.subscribers.write().await;
        for topic in topics {
            subscribers
                .entry(*topic)
                .or_default()
                .push(Arc::clone(&subscriber));
        }
    }

    /// Publish an event to all subscribers of its topic, awaiting each in
    /// registration order. Returns the number of subscribers reached.
    ///
    /// The subscriber list is snapshotted before delivery so handlers may
    /// publish further events (or subscribe) without deadlocking.
    pub async fn publish(&self, event: BusEvent) -> usize {
        let topic = event.topic();
        let targets: Vec<Arc<dyn EventSubscriber>> = {
            let subscribers = self.subscribers.read().await;
            subscribers.get(&topic).cloned().unwrap_or_default()
        };

        if targets.is_empty() {
            tracing::trace!(?topic, "no subscribers for event");
            return 0;
        }

        for subscriber in &targets {
            subscriber.on_event(&event).await;
        }
        targets.len()
    }

    /// Number of subscribers registered for a topic.
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers
            .read()
            .await
            .get(&topic)
            .map_or(0, Vec::len)
    }
}
