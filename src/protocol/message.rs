//! Protocol messages for A2A communication.
//!
//! Defines the tagged message envelope exchanged between agents and the
//! validation applied to raw transport payloads before they reach the
//! session state machine. Field names follow the JSON wire format
//! (`conversationId`, `fromAgent`, ...), which predates this crate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{A2AError, Result};

/// Message type discriminants.
///
/// Doubles as the negotiable message-type set: agents advertise which of
/// these they are willing to exchange during capability negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain string content
    Text,
    /// Structured JSON object content
    Json,
    /// Opaque bytes plus a content-type label
    Binary,
    /// Protocol-internal handshake/teardown content
    Control,
}

impl MessageType {
    /// Wire-format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Binary => "binary",
            Self::Control => "control",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Control message sub-actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// Remote-initiated connection request
    Connect,
    /// Session teardown
    Disconnect,
    /// Keep-alive probe
    Ping,
    /// Acknowledgment of a prior control message
    Ack,
}

/// Binary message content: opaque bytes with a content-type label.
///
/// The engine's control logic never inspects the bytes; they must
/// round-trip unmodified. Base64 on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryContent {
    /// Payload bytes (base64-encoded in JSON)
    #[serde(with = "base64_bytes")]
    pub data: bytes::Bytes,
    /// MIME content type label
    pub content_type: String,
}

/// Control message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlContent {
    /// The control action
    pub action: ControlAction,
    /// Optional structured payload (e.g. `forMessage`, disconnect `reason`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, Value>>,
}

/// Message content union, discriminated by `type` on the wire.
///
/// `Json` deserializes into a `serde_json::Map`, which rejects non-object
/// content at the schema level; the same goes for `Control::data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum MessageContent {
    /// Plain string payload
    Text(String),
    /// Structured JSON object payload
    Json(serde_json::Map<String, Value>),
    /// Opaque binary payload
    Binary(BinaryContent),
    /// Protocol control payload
    Control(ControlContent),
}

impl MessageContent {
    /// Discriminant of this content.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Text(_) => MessageType::Text,
            Self::Json(_) => MessageType::Json,
            Self::Binary(_) => MessageType::Binary,
            Self::Control(_) => MessageType::Control,
        }
    }
}

/// A2A message envelope.
///
/// All variants share the envelope fields; `type` and `content` are
/// flattened from [`MessageContent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct A2AMessage {
    /// Message id, generated by the sender
    pub id: String,
    /// Conversation this message belongs to, chosen by the initiating sender
    pub conversation_id: String,
    /// Sending agent id
    pub from_agent: String,
    /// Receiving agent id
    pub to_agent: String,
    /// ISO-8601 send timestamp
    pub timestamp: DateTime<Utc>,
    /// Correlates this message to an earlier one (replies, acks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Free-form sender metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
    /// Typed content (`type` + `content` on the wire)
    #[serde(flatten)]
    pub content: MessageContent,
}

impl A2AMessage {
    /// Create an envelope around the given content with fresh id and timestamp.
    pub fn new(
        from_agent: &str,
        to_agent: &str,
        conversation_id: &str,
        content: MessageContent,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            from_agent: from_agent.to_string(),
            to_agent: to_agent.to_string(),
            timestamp: Utc::now(),
            correlation_id: None,
            metadata: None,
            content,
        }
    }

    /// Create a text message.
    pub fn text(from_agent: &str, to_agent: &str, conversation_id: &str, text: &str) -> Self {
        Self::new(
            from_agent,
            to_agent,
            conversation_id,
            MessageContent::Text(text.to_string()),
        )
    }

    /// Create a json message.
    pub fn json(
        from_agent: &str,
        to_agent: &str,
        conversation_id: &str,
        content: serde_json::Map<String, Value>,
    ) -> Self {
        Self::new(
            from_agent,
            to_agent,
            conversation_id,
            MessageContent::Json(content),
        )
    }

    /// Create a binary message.
    pub fn binary(
        from_agent: &str,
        to_agent: &str,
        conversation_id: &str,
        data: bytes::Bytes,
        content_type: &str,
    ) -> Self {
        Self::new(
            from_agent,
            to_agent,
            conversation_id,
            MessageContent::Binary(BinaryContent {
                data,
                content_type: content_type.to_string(),
            }),
        )
    }

    /// Create a control message.
    pub fn control(
        from_agent: &str,
        to_agent: &str,
        conversation_id: &str,
        action: ControlAction,
        data: Option<HashMap<String, Value>>,
    ) -> Self {
        Self::new(
            from_agent,
            to_agent,
            conversation_id,
            MessageContent::Control(ControlContent { action, data }),
        )
    }

    /// Create a `control/ack` for a prior message, carrying
    /// `data.forMessage = <acked message id>`.
    pub fn ack(
        from_agent: &str,
        to_agent: &str,
        conversation_id: &str,
        for_message: &str,
    ) -> Self {
        let mut data = HashMap::new();
        data.insert("forMessage".to_string(), Value::String(for_message.to_string()));
        Self::control(
            from_agent,
            to_agent,
            conversation_id,
            ControlAction::Ack,
            Some(data),
        )
        .with_correlation(for_message)
    }

    /// Set the correlation id.
    pub fn with_correlation(mut self, correlation_id: &str) -> Self {
        self.correlation_id = Some(correlation_id.to_string());
        self
    }

    /// Set the metadata map.
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Discriminant of this message's content.
    pub fn message_type(&self) -> MessageType {
        self.content.message_type()
    }

    /// Control content accessor.
    pub fn get_control(&self) -> Option<&ControlContent> {
        match &self.content {
            MessageContent::Control(control) => Some(control),
            _ => None,
        }
    }

    /// Validate and decode a raw transport payload.
    ///
    /// Schema checks (unknown `type`, non-string text, non-object json
    /// content, unknown control action, non-object control data) are
    /// enforced by the typed deserialization; semantic checks by
    /// [`A2AMessage::validate`]. A message that fails here never reaches
    /// the state machine.
    pub fn from_value(value: Value) -> Result<Self> {
        let message: A2AMessage = serde_json::from_value(value)
            .map_err(|e| A2AError::InvalidMessage(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    /// Semantic envelope checks beyond the serde schema.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(A2AError::InvalidMessage("empty message id".to_string()));
        }
        if self.conversation_id.is_empty() {
            return Err(A2AError::InvalidMessage(
                "empty conversation id".to_string(),
            ));
        }
        if self.from_agent.is_empty() {
            return Err(A2AError::InvalidMessage("empty fromAgent".to_string()));
        }
        if self.to_agent.is_empty() {
            return Err(A2AError::InvalidMessage("empty toAgent".to_string()));
        }
        Ok(())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| A2AError::InvalidMessage(e.to_string()))?;
        Self::from_value(value)
    }
}

/// Base64 (de)serialization for binary payload bytes.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &bytes::Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<bytes::Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(bytes::Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_message_wire_format() {
        let msg = A2AMessage::text("agent-a", "agent-b", "conv-1", "hello");
        let value = msg.to_value().unwrap();

        assert_eq!(value["type"], "text");
        assert_eq!(value["content"], "hello");
        assert_eq!(value["conversationId"], "conv-1");
        assert_eq!(value["fromAgent"], "agent-a");
        assert_eq!(value["toAgent"], "agent-b");
        assert!(value["timestamp"].is_string());
        assert!(value.get("correlationId").is_none());
    }

    #[test]
    fn test_json_message_roundtrip() {
        let content = json!({"score": 4, "comment": "solid"});
        let msg = A2AMessage::json(
            "agent-a",
            "agent-b",
            "conv-1",
            content.as_object().unwrap().clone(),
        );

        let parsed = A2AMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed.message_type(), MessageType::Json);
        assert_eq!(parsed.content, msg.content);
    }

    #[test]
    fn test_binary_roundtrip_unmodified() {
        let payload = bytes::Bytes::from_static(&[0x00, 0xff, 0x10, 0x7f]);
        let msg = A2AMessage::binary("agent-a", "agent-b", "conv-1", payload.clone(), "application/octet-stream");

        let parsed = A2AMessage::from_json(&msg.to_json().unwrap()).unwrap();
        match parsed.content {
            MessageContent::Binary(binary) => {
                assert_eq!(binary.data, payload);
                assert_eq!(binary.content_type, "application/octet-stream");
            }
            other => panic!("expected binary content, got {other:?}"),
        }
    }

    #[test]
    fn test_ack_carries_for_message() {
        let ping = A2AMessage::control("agent-a", "agent-b", "conv-1", ControlAction::Ping, None);
        let ack = A2AMessage::ack("agent-b", "agent-a", "conv-1", &ping.id);

        let control = ack.get_control().unwrap();
        assert_eq!(control.action, ControlAction::Ack);
        assert_eq!(
            control.data.as_ref().unwrap()["forMessage"],
            Value::String(ping.id.clone())
        );
        assert_eq!(ack.correlation_id.as_deref(), Some(ping.id.as_str()));
    }

    #[test]
    fn test_rejects_unknown_type() {
        let raw = json!({
            "id": "m1",
            "conversationId": "c1",
            "fromAgent": "a",
            "toAgent": "b",
            "timestamp": "2026-01-01T00:00:00Z",
            "type": "video",
            "content": "nope"
        });
        assert!(A2AMessage::from_value(raw).is_err());
    }

    #[test]
    fn test_rejects_non_object_json_content() {
        let raw = json!({
            "id": "m1",
            "conversationId": "c1",
            "fromAgent": "a",
            "toAgent": "b",
            "timestamp": "2026-01-01T00:00:00Z",
            "type": "json",
            "content": [1, 2, 3]
        });
        assert!(A2AMessage::from_value(raw).is_err());
    }

    #[test]
    fn test_rejects_unknown_control_action() {
        let raw = json!({
            "id": "m1",
            "conversationId": "c1",
            "fromAgent": "a",
            "toAgent": "b",
            "timestamp": "2026-01-01T00:00:00Z",
            "type": "control",
            "content": {"action": "restart"}
        });
        assert!(A2AMessage::from_value(raw).is_err());
    }

    #[test]
    fn test_rejects_empty_envelope_fields() {
        let raw = json!({
            "id": "m1",
            "conversationId": "c1",
            "fromAgent": "",
            "toAgent": "b",
            "timestamp": "2026-01-01T00:00:00Z",
            "type": "text",
            "content": "hi"
        });
        let err = A2AMessage::from_value(raw).unwrap_err();
        assert!(err.to_string().contains("fromAgent"));
    }

    #[test]
    fn test_control_data_must_be_object() {
        let raw = json!({
            "id": "m1",
            "conversationId": "c1",
            "fromAgent": "a",
            "toAgent": "b",
            "timestamp": "2026-01-01T00:00:00Z",
            "type": "control",
            "content": {"action": "ping", "data": "not-a-map"}
        });
        assert!(A2AMessage::from_value(raw).is_err());
    }

    #[test]
    fn test_message_type_display() {
        assert_eq!(MessageType::Text.to_string(), "text");
        assert_eq!(MessageType::Control.to_string(), "control");
    }
}
