//! In-process loopback transport.
//!
//! Pairs two buses so that every `message outgoing` published on one side
//! arrives as a raw `inbound message` on the other. Delivery goes through
//! buffered channels and a pump task, so a send completes without waiting
//! for the peer to process — the same asynchrony a socket would give.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::Transport;
use crate::bus::{BusEvent, EventBus, EventSubscriber, Topic};
use crate::error::{A2AError, Result};

/// Transport pairing two in-process buses.
pub struct LoopbackTransport {
    a_to_b: Mutex<Option<Pump>>,
    b_to_a: Mutex<Option<Pump>>,
}

struct Pump {
    rx: mpsc::UnboundedReceiver<Value>,
    target: Arc<EventBus>,
    label: &'static str,
}

/// Forwards serialized outbound messages into a channel without blocking
/// the publishing session.
struct OutboundForwarder {
    tx: mpsc::UnboundedSender<Value>,
    label: &'static str,
}

#[async_trait]
impl EventSubscriber for OutboundForwarder {
    async fn on_event(&self, event: &BusEvent) {
        if let BusEvent::MessageOutgoing(message) = event {
            match message.to_value() {
                Ok(payload) => {
                    if self.tx.send(payload).is_err() {
                        tracing::warn!(direction = self.label, "loopback peer gone, dropping message");
                    }
                }
                Err(e) => {
                    tracing::error!(direction = self.label, error = %e, "failed to serialize outbound message");
                }
            }
        }
    }
}

impl LoopbackTransport {
    /// Wire two buses together. Subscribes a forwarder to each side's
    /// `message outgoing` topic; nothing moves until [`Transport::run`]
    /// is awaited (typically on a spawned task).
    pub async fn pair(bus_a: Arc<EventBus>, bus_b: Arc<EventBus>) -> Self {
        let (tx_ab, rx_ab) = mpsc::unbounded_channel();
        let (tx_ba, rx_ba) = mpsc::unbounded_channel();

        bus_a
            .subscribe(
                Topic::MessageOutgoing,
                Arc::new(OutboundForwarder {
                    tx: tx_ab,
                    label: "a->b",
                }),
            )
            .await;
        bus_b
            .subscribe(
                Topic::MessageOutgoing,
                Arc::new(OutboundForwarder {
                    tx: tx_ba,
                    label: "b->a",
                }),
            )
            .await;

        Self {
            a_to_b: Mutex::new(Some(Pump {
                rx: rx_ab,
                target: bus_b,
                label: "a->b",
            })),
            b_to_a: Mutex::new(Some(Pump {
                rx: rx_ba,
                target: bus_a,
                label: "b->a",
            })),
        }
    }

    fn take_pumps(&self) -> Result<(Pump, Pump)> {
        let poisoned = |_| A2AError::Transport("loopback pump lock poisoned".to_string());
        let a_to_b = self.a_to_b.lock().map_err(poisoned)?.take();
        let b_to_a = self.b_to_a.lock().map_err(poisoned)?.take();
        match (a_to_b, b_to_a) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(A2AError::Transport(
                "loopback transport is already running".to_string(),
            )),
        }
    }
}

impl Transport for LoopbackTransport {
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let (a_to_b, b_to_a) = self.take_pumps()?;
            tracing::info!("loopback transport running");

            let pump = |mut pump: Pump| async move {
                while let Some(payload) = pump.rx.recv().await {
                    tracing::trace!(direction = pump.label, "delivering payload");
                    pump.target
                        .publish(BusEvent::InboundMessage { payload })
                        .await;
                }
            };

            futures::future::join(pump(a_to_b), pump(b_to_a)).await;
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}
