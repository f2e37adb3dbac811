//! Static topic catalog and subscription request building.
//!
//! Requests embed the websocket session id, so they are rebuilt after every
//! handshake. Building is pure: identical inputs give identical requests.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// EventSub topics this integration subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ChatMessage,
    PointsRedemptionAdd,
    PointsRewardAdd,
    PointsRewardRemove,
    Cheer,
    CharityDonation,
}

impl Topic {
    /// Every topic, in subscription order.
    pub const ALL: [Topic; 6] = [
        Topic::ChatMessage,
        Topic::PointsRedemptionAdd,
        Topic::PointsRewardAdd,
        Topic::PointsRewardRemove,
        Topic::Cheer,
        Topic::CharityDonation,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::ChatMessage => "channel.chat.message",
            Self::PointsRedemptionAdd => "channel.channel_points_custom_reward_redemption.add",
            Self::PointsRewardAdd => "channel.channel_points_custom_reward.add",
            Self::PointsRewardRemove => "channel.channel_points_custom_reward.remove",
            Self::Cheer => "channel.cheer",
            Self::CharityDonation => "channel.charity_campaign.donate",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.as_wire() == value)
    }

    pub fn version(&self) -> &'static str {
        "1"
    }

    /// Condition map for this topic.
    ///
    /// Chat messages are scoped to a reading user as well as a channel; every
    /// other topic only needs the broadcaster.
    pub fn condition(&self, broadcaster_id: &str, viewer_id: &str) -> BTreeMap<String, String> {
        let mut condition = BTreeMap::new();
        condition.insert("broadcaster_user_id".to_string(), broadcaster_id.to_string());
        if matches!(self, Self::ChatMessage) {
            condition.insert("user_id".to_string(), viewer_id.to_string());
        }
        condition
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMethod {
    Websocket,
}

/// Where the remote service should deliver events for a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportDescriptor {
    pub method: TransportMethod,
    pub session_id: String,
}

/// Body of a `POST /eventsub/subscriptions` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "type")]
    pub topic_type: String,
    pub version: String,
    pub condition: BTreeMap<String, String>,
    pub transport: TransportDescriptor,
}

impl SubscriptionRequest {
    pub fn new(topic: Topic, session_id: &str, broadcaster_id: &str, viewer_id: &str) -> Self {
        Self {
            topic_type: topic.as_wire().to_string(),
            version: topic.version().to_string(),
            condition: topic.condition(broadcaster_id, viewer_id),
            transport: TransportDescriptor {
                method: TransportMethod::Websocket,
                session_id: session_id.to_string(),
            },
        }
    }

    pub fn topic(&self) -> Option<Topic> {
        Topic::from_wire(&self.topic_type)
    }

    pub fn session_id(&self) -> &str {
        &self.transport.session_id
    }
}

/// Builds one request per catalog topic for the given session.
pub fn build_requests(
    session_id: &str,
    broadcaster_id: &str,
    viewer_id: &str,
) -> Vec<SubscriptionRequest> {
    Topic::ALL
        .into_iter()
        .map(|topic| SubscriptionRequest::new(topic, session_id, broadcaster_id, viewer_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builds_one_request_per_topic_for_the_session() {
        let requests = build_requests("abc", "1337", "4242");
        assert_eq!(requests.len(), Topic::ALL.len());
        assert!(requests.iter().all(|request| request.session_id() == "abc"));
        let topics: Vec<_> = requests.iter().filter_map(SubscriptionRequest::topic).collect();
        assert_eq!(topics, Topic::ALL.to_vec());
    }

    #[test]
    fn building_is_deterministic() {
        let first = build_requests("abc", "1337", "4242");
        let second = build_requests("abc", "1337", "4242");
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).expect("encode"),
            serde_json::to_string(&second).expect("encode")
        );
    }

    #[test]
    fn chat_condition_includes_viewer() {
        let condition = Topic::ChatMessage.condition("1337", "4242");
        assert_eq!(condition.get("broadcaster_user_id").map(String::as_str), Some("1337"));
        assert_eq!(condition.get("user_id").map(String::as_str), Some("4242"));

        let cheer = Topic::Cheer.condition("1337", "4242");
        assert_eq!(cheer.len(), 1);
        assert!(!cheer.contains_key("user_id"));
    }

    #[test]
    fn request_serializes_to_helix_shape() {
        let request = SubscriptionRequest::new(Topic::ChatMessage, "abc", "1337", "4242");
        let value = serde_json::to_value(&request).expect("encode");
        assert_eq!(
            value,
            json!({
                "type": "channel.chat.message",
                "version": "1",
                "condition": { "broadcaster_user_id": "1337", "user_id": "4242" },
                "transport": { "method": "websocket", "session_id": "abc" }
            })
        );
    }

    #[test]
    fn wire_names_round_trip_through_the_catalog() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_wire(topic.as_wire()), Some(topic));
        }
        assert_eq!(Topic::from_wire("channel.follow"), None);
    }
}
