//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`A2A_*`)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{A2AError, Result};
use crate::protocol::{Capability, CapabilitySet, MessageType};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Local agent identity configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Session timeout configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Supported capabilities and message types
    #[serde(default)]
    pub capabilities: CapabilityConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| A2AError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| A2AError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(agent_id) = std::env::var("A2A_AGENT_ID") {
            config.agent.agent_id = Some(agent_id);
        }
        if let Ok(agent_type) = std::env::var("A2A_AGENT_TYPE") {
            config.agent.agent_type = agent_type;
        }

        if let Ok(val) = std::env::var("A2A_HANDSHAKE_TIMEOUT_SECS") {
            if let Ok(val) = val.parse() {
                config.session.handshake_timeout_secs = val;
            }
        }
        if let Ok(val) = std::env::var("A2A_IDLE_TIMEOUT_SECS") {
            if let Ok(val) = val.parse() {
                config.session.idle_timeout_secs = val;
            }
        }

        config
    }

    /// Merge with another config (other takes precedence)
    pub fn merge(self, other: Self) -> Self {
        let agent_defaults = AgentConfig::default();
        let session_defaults = SessionConfig::default();

        Self {
            agent: AgentConfig {
                agent_id: other.agent.agent_id.or(self.agent.agent_id),
                agent_type: if other.agent.agent_type != agent_defaults.agent_type {
                    other.agent.agent_type
                } else {
                    self.agent.agent_type
                },
            },
            session: SessionConfig {
                handshake_timeout_secs: if other.session.handshake_timeout_secs
                    != session_defaults.handshake_timeout_secs
                {
                    other.session.handshake_timeout_secs
                } else {
                    self.session.handshake_timeout_secs
                },
                idle_timeout_secs: if other.session.idle_timeout_secs
                    != session_defaults.idle_timeout_secs
                {
                    other.session.idle_timeout_secs
                } else {
                    self.session.idle_timeout_secs
                },
            },
            capabilities: other.capabilities,
        }
    }

    /// Default config file location (`<config dir>/a2a/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("a2a").join("config.toml"))
    }
}

/// Local agent identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Fixed agent id; generated per process when unset
    pub agent_id: Option<String>,

    /// Agent type label (company, customer, insight, ...)
    pub agent_type: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: None,
            agent_type: "generic".to_string(),
        }
    }
}

/// Session timeout configuration.
///
/// The engine only exposes expiry state; enforcement belongs to a
/// caller-level supervisor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum seconds to sit in `connecting`/`negotiating`
    pub handshake_timeout_secs: u64,

    /// Maximum idle seconds once `ready`
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 30,
            idle_timeout_secs: 300, // 5 minutes
        }
    }
}

impl SessionConfig {
    /// Handshake phase timeout
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Idle timeout
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Supported capability and message-type configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// Supported capabilities, preference-ordered
    pub capabilities: Vec<Capability>,

    /// Supported message types, preference-ordered
    pub message_types: Vec<MessageType>,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        let set = CapabilitySet::default();
        Self {
            capabilities: set.capabilities,
            message_types: set.message_types,
        }
    }
}

impl CapabilityConfig {
    /// Build the capability set the session negotiates with.
    pub fn to_set(&self) -> CapabilitySet {
        CapabilitySet {
            capabilities: self.capabilities.clone(),
            message_types: self.message_types.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.handshake_timeout_secs, 30);
        assert_eq!(config.session.idle_timeout_secs, 300);
        assert_eq!(config.agent.agent_type, "generic");
        assert!(config.capabilities.capabilities.contains(&Capability::Messaging));
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [agent]
            agent_id = "insight-7"
            agent_type = "insight"

            [session]
            handshake_timeout_secs = 10
            idle_timeout_secs = 120

            [capabilities]
            capabilities = ["messaging", "task_execution"]
            message_types = ["text", "json", "control"]
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.agent.agent_id.as_deref(), Some("insight-7"));
        assert_eq!(config.session.handshake_timeout_secs, 10);
        assert_eq!(
            config.capabilities.capabilities,
            vec![Capability::Messaging, Capability::TaskExecution]
        );
        assert_eq!(config.capabilities.message_types.len(), 3);
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[session]\nhandshake_timeout_secs = 7\nidle_timeout_secs = 60\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.session.handshake_timeout_secs, 7);
        assert_eq!(config.session.idle_timeout_secs, 60);

        assert!(Config::from_file(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = Config {
            agent: AgentConfig {
                agent_id: Some("base-agent".to_string()),
                agent_type: "company".to_string(),
            },
            ..Default::default()
        };

        let overlay = Config {
            session: SessionConfig {
                handshake_timeout_secs: 5,
                idle_timeout_secs: 300,
            },
            ..Default::default()
        };

        let merged = base.merge(overlay);
        assert_eq!(merged.agent.agent_id.as_deref(), Some("base-agent"));
        assert_eq!(merged.agent.agent_type, "company");
        assert_eq!(merged.session.handshake_timeout_secs, 5);
        assert_eq!(merged.session.idle_timeout_secs, 300);
    }

    #[test]
    fn test_capability_config_to_set() {
        let config = CapabilityConfig {
            capabilities: vec![Capability::Streaming],
            message_types: vec![MessageType::Binary],
        };

        let set = config.to_set();
        assert!(set.supports(Capability::Streaming));
        assert!(!set.supports(Capability::Messaging));
        assert!(set.supports_message_type(MessageType::Binary));
    }
}
