//! Transport layer abstraction for the A2A protocol.
//!
//! The engine never touches sockets, framing, or authentication tokens.
//! A transport adapter subscribes to `message outgoing` on a session's
//! bus, serializes envelopes for the wire, and publishes raw inbound
//! payloads back as `inbound message` events. Sessions are registered
//! with a [`SessionRegistry`] owned by the adapter, not by the engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Session (engine)             │
//! │         (Transport-Agnostic)            │
//! └──────────────────┬──────────────────────┘
//!                    │  event bus
//!          ┌────────┴─────────┐
//!          ▼                  ▼
//! ┌──────────────────┐ ┌──────────────────┐
//! │ socket adapter   │ │ LoopbackTransport│
//! │ (external crate) │ │  (in-process)    │
//! └──────────────────┘ └──────────────────┘
//! ```

mod loopback;
mod registry;

pub use loopback::LoopbackTransport;
pub use registry::SessionRegistry;

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

/// Transport trait for pluggable delivery backends.
///
/// Implementations move serialized payloads between peers while the
/// engine remains transport-agnostic.
pub trait Transport: Send + Sync {
    /// Pump payloads between peers until the transport's channels close.
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;
}
