//! EventSub websocket message codec.
//!
//! Every inbound text frame has the shape
//! `{"metadata": {...}, "payload": {...}}`. [`decode`] turns a frame into an
//! [`Envelope`], which is either a plain session message (welcome, keepalive,
//! reconnect) or a subscription message (notification, revocation).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::stream::events::TopicEvent;

/// Codec failures. Decoding performs no I/O, so this is the only error kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

/// Classified `metadata.message_type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    Notification,
    SessionWelcome,
    SessionKeepalive,
    SessionReconnect,
    Revocation,
    /// A message type this client does not know about.
    Other(String),
}

impl MessageType {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "notification" => Self::Notification,
            "session_welcome" => Self::SessionWelcome,
            "session_keepalive" => Self::SessionKeepalive,
            "session_reconnect" => Self::SessionReconnect,
            "revocation" => Self::Revocation,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Notification => "notification",
            Self::SessionWelcome => "session_welcome",
            Self::SessionKeepalive => "session_keepalive",
            Self::SessionReconnect => "session_reconnect",
            Self::Revocation => "revocation",
            Self::Other(other) => other,
        }
    }

    /// Whether frames of this type carry a `payload.subscription` block.
    pub fn carries_subscription(&self) -> bool {
        matches!(self, Self::Notification | Self::Revocation)
    }

    /// Whether frames of this type prove the connection is alive.
    pub fn resets_keepalive(&self) -> bool {
        matches!(self, Self::Notification | Self::SessionKeepalive)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every message kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub message_id: String,
    pub message_type: MessageType,
    pub message_timestamp: String,
}

/// `payload.session` of welcome and reconnect messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub keepalive_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub reconnect_url: Option<String>,
    #[serde(default)]
    pub connected_at: Option<String>,
}

/// `payload.subscription` of notification and revocation messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub subscription_type: String,
    #[serde(default)]
    pub version: Option<String>,
    pub status: String,
    #[serde(default)]
    pub condition: Option<Value>,
}

/// Session-level message without subscription fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PlainEnvelope {
    metadata: Metadata,
    session: Option<SessionInfo>,
}

impl PlainEnvelope {
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Session block carried by welcome and reconnect messages.
    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }
}

/// Notification or revocation tied to a topic subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionEnvelope {
    metadata: Metadata,
    subscription_version: Option<String>,
    subscription: SubscriptionInfo,
    event_data: Option<Value>,
}

impl SubscriptionEnvelope {
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Topic wire type, e.g. `channel.chat.message`.
    pub fn subscription_type(&self) -> &str {
        &self.subscription.subscription_type
    }

    pub fn subscription_version(&self) -> Option<&str> {
        self.subscription_version
            .as_deref()
            .or(self.subscription.version.as_deref())
    }

    pub fn subscription_status(&self) -> &str {
        &self.subscription.status
    }

    pub fn subscription(&self) -> &SubscriptionInfo {
        &self.subscription
    }

    /// Raw `payload.event` object. Revocations carry none.
    pub fn event_data(&self) -> Option<&Value> {
        self.event_data.as_ref()
    }

    /// Decodes `payload.event` into a typed topic event.
    pub fn event(&self) -> Result<TopicEvent, CodecError> {
        let data = self.event_data.as_ref().ok_or_else(|| {
            CodecError::MalformedFrame(format!(
                "{} message has no event payload",
                self.metadata.message_type
            ))
        })?;
        TopicEvent::decode(self.subscription_type(), data)
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Plain(PlainEnvelope),
    Subscription(SubscriptionEnvelope),
}

impl Envelope {
    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::Plain(plain) => &plain.metadata,
            Self::Subscription(sub) => &sub.metadata,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.metadata().message_id
    }

    pub fn message_type(&self) -> &MessageType {
        &self.metadata().message_type
    }

    pub fn message_timestamp(&self) -> &str {
        &self.metadata().message_timestamp
    }

    /// Session block, present only on plain welcome/reconnect messages.
    pub fn session(&self) -> Option<&SessionInfo> {
        match self {
            Self::Plain(plain) => plain.session(),
            Self::Subscription(_) => None,
        }
    }

    /// Subscription view, present only on notification/revocation messages.
    pub fn as_subscription(&self) -> Option<&SubscriptionEnvelope> {
        match self {
            Self::Plain(_) => None,
            Self::Subscription(sub) => Some(sub),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    metadata: RawMetadata,
    payload: RawPayload,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    message_id: String,
    message_type: String,
    message_timestamp: String,
    #[serde(default)]
    subscription_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(default)]
    session: Option<SessionInfo>,
    #[serde(default)]
    subscription: Option<SubscriptionInfo>,
    #[serde(default)]
    event: Option<Value>,
}

/// Decodes one websocket text frame.
pub fn decode(frame: &str) -> Result<Envelope, CodecError> {
    let raw: RawFrame =
        serde_json::from_str(frame).map_err(|err| CodecError::MalformedFrame(err.to_string()))?;

    let metadata = Metadata {
        message_type: MessageType::from_wire(&raw.metadata.message_type),
        message_id: raw.metadata.message_id,
        message_timestamp: raw.metadata.message_timestamp,
    };

    if !metadata.message_type.carries_subscription() {
        return Ok(Envelope::Plain(PlainEnvelope {
            metadata,
            session: raw.payload.session,
        }));
    }

    let subscription = raw.payload.subscription.ok_or_else(|| {
        CodecError::MalformedFrame(format!(
            "{} message is missing payload.subscription",
            metadata.message_type
        ))
    })?;

    Ok(Envelope::Subscription(SubscriptionEnvelope {
        metadata,
        subscription_version: raw.metadata.subscription_version,
        subscription,
        event_data: raw.payload.event,
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn frame(metadata: Value, payload: Value) -> String {
        json!({ "metadata": metadata, "payload": payload }).to_string()
    }

    #[test]
    fn welcome_exposes_session_and_no_subscription() {
        let text = frame(
            json!({
                "message_id": "96a3f3b5",
                "message_type": "session_welcome",
                "message_timestamp": "2023-07-19T14:56:51.634234626Z"
            }),
            json!({
                "session": {
                    "id": "AQoQILE98gtqShGmLD7AM6yJThAB",
                    "status": "connected",
                    "connected_at": "2023-07-19T14:56:51.616329898Z",
                    "keepalive_timeout_seconds": 10,
                    "reconnect_url": null
                }
            }),
        );

        let envelope = decode(&text).expect("decode welcome");
        assert_eq!(envelope.message_type(), &MessageType::SessionWelcome);
        assert_eq!(envelope.message_id(), "96a3f3b5");
        let session = envelope.session().expect("session block");
        assert_eq!(session.id, "AQoQILE98gtqShGmLD7AM6yJThAB");
        assert_eq!(session.keepalive_timeout_seconds, Some(10));
        assert!(envelope.as_subscription().is_none());
    }

    #[test]
    fn keepalive_and_reconnect_never_carry_subscription_fields() {
        for message_type in ["session_keepalive", "session_reconnect", "session_welcome"] {
            let text = frame(
                json!({
                    "message_id": "m",
                    "message_type": message_type,
                    "message_timestamp": "t",
                    "subscription_type": "channel.cheer"
                }),
                json!({ "subscription": { "type": "channel.cheer", "status": "enabled" } }),
            );
            let envelope = decode(&text).expect("decode plain");
            assert!(
                envelope.as_subscription().is_none(),
                "{message_type} must not expose subscription fields"
            );
        }
    }

    #[test]
    fn notification_exposes_subscription_fields() {
        let text = frame(
            json!({
                "message_id": "befa7b53",
                "message_type": "notification",
                "message_timestamp": "2022-11-16T10:11:12.464757833Z",
                "subscription_type": "channel.cheer",
                "subscription_version": "1"
            }),
            json!({
                "subscription": {
                    "id": "f1c2a387",
                    "type": "channel.cheer",
                    "version": "1",
                    "status": "enabled",
                    "condition": { "broadcaster_user_id": "1337" }
                },
                "event": {
                    "is_anonymous": false,
                    "user_id": "1234",
                    "user_name": "Cool_User",
                    "broadcaster_user_id": "1337",
                    "message": "pogchamp",
                    "bits": 1000
                }
            }),
        );

        let envelope = decode(&text).expect("decode notification");
        let sub = envelope.as_subscription().expect("subscription view");
        assert_eq!(sub.subscription_type(), "channel.cheer");
        assert_eq!(sub.subscription_version(), Some("1"));
        assert_eq!(sub.subscription_status(), "enabled");
        assert_eq!(
            sub.event_data().and_then(|event| event.get("bits")),
            Some(&json!(1000))
        );
        assert!(envelope.session().is_none());
    }

    #[test]
    fn revocation_has_status_and_no_event() {
        let text = frame(
            json!({
                "message_id": "84c1e79a",
                "message_type": "revocation",
                "message_timestamp": "2022-11-16T10:11:12.464757833Z",
                "subscription_type": "channel.chat.message",
                "subscription_version": "1"
            }),
            json!({
                "subscription": {
                    "id": "f1c2a387",
                    "type": "channel.chat.message",
                    "version": "1",
                    "status": "authorization_revoked"
                }
            }),
        );

        let envelope = decode(&text).expect("decode revocation");
        let sub = envelope.as_subscription().expect("subscription view");
        assert_eq!(sub.subscription_status(), "authorization_revoked");
        assert!(sub.event_data().is_none());
        assert!(sub.event().is_err());
    }

    #[test]
    fn unknown_message_type_is_plain_other() {
        let text = frame(
            json!({ "message_id": "m", "message_type": "session_migrate", "message_timestamp": "t" }),
            json!({}),
        );
        let envelope = decode(&text).expect("decode unknown");
        assert_eq!(
            envelope.message_type(),
            &MessageType::Other("session_migrate".to_string())
        );
    }

    #[test]
    fn rejects_frames_without_message_type() {
        let text = frame(json!({ "message_id": "m", "message_timestamp": "t" }), json!({}));
        assert!(matches!(decode(&text), Err(CodecError::MalformedFrame(_))));
    }

    #[test]
    fn rejects_non_json_frames() {
        assert!(matches!(
            decode("not json at all"),
            Err(CodecError::MalformedFrame(_))
        ));
    }

    #[test]
    fn rejects_notification_without_subscription_block() {
        let text = frame(
            json!({ "message_id": "m", "message_type": "notification", "message_timestamp": "t" }),
            json!({ "event": {} }),
        );
        assert!(matches!(decode(&text), Err(CodecError::MalformedFrame(_))));
    }
}
