//! # Session Envelope
//!
//! One JSON frame over the bidirectional session. Every frame belongs to a
//! logical channel; channel `"system"` carries control traffic.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Reserved channel for control envelopes.
pub const SYSTEM_CHANNEL: &str = "system";

/// Client-local pseudo-channel carrying connection state changes.
///
/// Never sent to the backend.
pub const CONNECTION_CHANNEL: &str = "connection";

/// Envelope `type` tags with protocol meaning.
pub mod message_type {
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const SUBSCRIPTION_ACK: &str = "subscription_ack";
    pub const CONNECTION_ACK: &str = "connection_ack";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const CONNECTION_STATE: &str = "connection_state";
    pub const RAW_MESSAGE: &str = "raw_message";
}

/// Returns true for channels that are never subscribed on the backend.
pub fn is_reserved_channel(channel: &str) -> bool {
    channel == SYSTEM_CHANNEL || channel == CONNECTION_CHANNEL
}

/// A message exchanged with the backend.
///
/// Incoming frames may omit everything except `type`; missing fields fall back
/// to defaults (`channel` defaults to `"system"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub client_id: String,
}

fn default_channel() -> String {
    SYSTEM_CHANNEL.to_string()
}

impl Envelope {
    /// Build an envelope with a fresh id and the current timestamp.
    pub fn new(
        message_type: impl Into<String>,
        channel: impl Into<String>,
        data: Value,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_type: message_type.into(),
            channel: channel.into(),
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
            client_id: client_id.into(),
        }
    }

    /// `{type:"subscribe", channel:"system", data:{channel}}`
    pub fn subscribe(channel: &str, client_id: &str) -> Self {
        Self::new(
            message_type::SUBSCRIBE,
            SYSTEM_CHANNEL,
            json!({ "channel": channel }),
            client_id,
        )
    }

    /// `{type:"unsubscribe", channel:"system", data:{channel}}`
    pub fn unsubscribe(channel: &str, client_id: &str) -> Self {
        Self::new(
            message_type::UNSUBSCRIBE,
            SYSTEM_CHANNEL,
            json!({ "channel": channel }),
            client_id,
        )
    }

    /// Keepalive request.
    pub fn heartbeat_ping(client_id: &str) -> Self {
        Self::new(
            message_type::HEARTBEAT,
            SYSTEM_CHANNEL,
            json!({ "ping": true }),
            client_id,
        )
    }

    /// Keepalive answer.
    pub fn heartbeat_pong(client_id: &str) -> Self {
        Self::new(
            message_type::HEARTBEAT,
            SYSTEM_CHANNEL,
            json!({ "pong": true }),
            client_id,
        )
    }

    /// Synthetic envelope wrapping a frame that could not be parsed.
    pub fn raw_message(raw: &str, error: &str, client_id: &str) -> Self {
        Self::new(
            message_type::RAW_MESSAGE,
            SYSTEM_CHANNEL,
            json!({ "raw": raw, "error": error }),
            client_id,
        )
    }

    pub fn is_heartbeat_ping(&self) -> bool {
        self.message_type == message_type::HEARTBEAT
            && self.data.get("ping").and_then(Value::as_bool) == Some(true)
    }

    pub fn is_heartbeat_pong(&self) -> bool {
        self.message_type == message_type::HEARTBEAT
            && self.data.get("pong").and_then(Value::as_bool) == Some(true)
    }

    /// Channel named by a `subscription_ack`, if this is one.
    pub fn acknowledged_channel(&self) -> Option<&str> {
        if self.message_type != message_type::SUBSCRIPTION_ACK {
            return None;
        }
        self.data.get("subscribed_channel").and_then(Value::as_str)
    }

    /// Channel named by a `subscribe`/`unsubscribe` control envelope.
    pub fn control_channel(&self) -> Option<&str> {
        match self.message_type.as_str() {
            message_type::SUBSCRIBE | message_type::UNSUBSCRIBE => {
                self.data.get("channel").and_then(Value::as_str)
            }
            _ => None,
        }
    }

    /// Parse one text frame.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize to one text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_frame_defaults_to_system_channel() {
        let env = Envelope::from_json(r#"{"type":"connection_ack"}"#).unwrap();
        assert_eq!(env.message_type, message_type::CONNECTION_ACK);
        assert_eq!(env.channel, SYSTEM_CHANNEL);
        assert_eq!(env.data, Value::Null);
        assert!(env.id.is_empty());
    }

    #[test]
    fn test_frame_without_type_is_rejected() {
        assert!(Envelope::from_json(r#"{"channel":"discovery"}"#).is_err());
        assert!(Envelope::from_json("not json").is_err());
    }

    #[test]
    fn test_type_field_is_renamed_on_the_wire() {
        let env = Envelope::subscribe("discovery", "client-1");
        let text = env.to_json().unwrap();
        let raw: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["type"], "subscribe");
        assert_eq!(raw["channel"], "system");
        assert_eq!(raw["data"]["channel"], "discovery");
        assert_eq!(raw["client_id"], "client-1");
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = Envelope::heartbeat_ping("c");
        let b = Envelope::heartbeat_ping("c");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_heartbeat_predicates() {
        let ping = Envelope::from_json(
            r#"{"type":"heartbeat","channel":"system","data":{"ping":true}}"#,
        )
        .unwrap();
        assert!(ping.is_heartbeat_ping());
        assert!(!ping.is_heartbeat_pong());
        assert!(Envelope::heartbeat_pong("c").is_heartbeat_pong());
    }

    #[test]
    fn test_acknowledged_channel() {
        let ack = Envelope::from_json(
            r#"{"type":"subscription_ack","data":{"subscribed_channel":"discovery"}}"#,
        )
        .unwrap();
        assert_eq!(ack.acknowledged_channel(), Some("discovery"));
        assert_eq!(Envelope::heartbeat_ping("c").acknowledged_channel(), None);
    }

    #[test]
    fn test_reserved_channels() {
        assert!(is_reserved_channel("system"));
        assert!(is_reserved_channel("connection"));
        assert!(!is_reserved_channel("discovery"));
    }
}
