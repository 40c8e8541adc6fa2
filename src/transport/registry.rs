//! Session registry owned by the transport adapter.
//!
//! Replaces a process-wide agent-to-handler map with an explicit object
//! carrying create/lookup/remove lifecycle. The protocol engine itself
//! knows nothing about it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::bus::EventBus;
use crate::config::SessionConfig;
use crate::protocol::{CapabilitySet, Session};

/// Tracks attached sessions by local agent id.
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<Session>>>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a session for an agent, attach it to its bus, and register
    /// it. An existing session for the same agent id is replaced.
    pub async fn create(
        &self,
        agent_id: &str,
        capabilities: CapabilitySet,
        bus: Arc<EventBus>,
    ) -> Arc<Mutex<Session>> {
        self.create_with_config(agent_id, capabilities, bus, SessionConfig::default())
            .await
    }

    /// Create a session with explicit timeout configuration.
    pub async fn create_with_config(
        &self,
        agent_id: &str,
        capabilities: CapabilitySet,
        bus: Arc<EventBus>,
        config: SessionConfig,
    ) -> Arc<Mutex<Session>> {
        let session =
            Session::attach(Session::with_config(agent_id, capabilities, bus, config)).await;
        self.sessions
            .write()
            .await
            .insert(agent_id.to_string(), Arc::clone(&session));
        session
    }

    /// Look up the session attached for an agent.
    pub async fn lookup(&self, agent_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(agent_id).cloned()
    }

    /// Remove and return the session for an agent.
    pub async fn remove(&self, agent_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.write().await.remove(agent_id)
    }

    /// Number of registered sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// All registered agent ids.
    pub async fn list_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Drop sessions that are terminal or past their phase timeout.
    /// Returns the number removed.
    pub async fn cleanup(&self) -> usize {
        let candidates: Vec<(String, Arc<Mutex<Session>>)> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .map(|(id, session)| (id.clone(), Arc::clone(session)))
                .collect()
        };

        let mut stale = Vec::new();
        for (agent_id, session) in candidates {
            let session = session.lock().await;
            if session.state().is_terminal() || session.is_expired() {
                stale.push(agent_id);
            }
        }

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        for agent_id in &stale {
            sessions.remove(agent_id);
        }
        before - sessions.len()
    }
}
