//! Typed `payload.event` shapes for the subscribed topics.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stream::proto::CodecError;
use crate::stream::topics::Topic;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageBody {
    pub text: String,
    #[serde(default)]
    pub fragments: Vec<Value>,
}

/// `channel.chat.message`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageEvent {
    pub broadcaster_user_id: String,
    pub chatter_user_id: String,
    pub chatter_user_name: String,
    #[serde(default)]
    pub message_id: String,
    pub message: ChatMessageBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSummary {
    pub id: String,
    pub title: String,
    pub cost: u64,
    #[serde(default)]
    pub prompt: String,
}

/// `channel.channel_points_custom_reward_redemption.add`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionAddEvent {
    pub id: String,
    pub broadcaster_user_id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub user_input: String,
    pub status: String,
    pub reward: RewardSummary,
    #[serde(default)]
    pub redeemed_at: Option<String>,
}

/// `channel.channel_points_custom_reward.add` and `.remove`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEvent {
    pub id: String,
    pub broadcaster_user_id: String,
    pub title: String,
    pub cost: u64,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub prompt: String,
}

/// `channel.cheer`. User fields are absent for anonymous cheers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheerEvent {
    pub is_anonymous: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    pub broadcaster_user_id: String,
    #[serde(default)]
    pub message: String,
    pub bits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharityAmount {
    pub value: i64,
    pub decimal_places: u32,
    pub currency: String,
}

impl CharityAmount {
    pub fn as_decimal(&self) -> f64 {
        self.value as f64 / 10f64.powi(self.decimal_places as i32)
    }
}

/// `channel.charity_campaign.donate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharityDonationEvent {
    pub id: String,
    pub campaign_id: String,
    pub broadcaster_user_id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub charity_name: String,
    pub amount: CharityAmount,
}

/// Event payload decoded according to its subscription type.
#[derive(Debug, Clone, PartialEq)]
pub enum TopicEvent {
    ChatMessage(ChatMessageEvent),
    PointsRedemptionAdd(RedemptionAddEvent),
    PointsRewardAdd(RewardEvent),
    PointsRewardRemove(RewardEvent),
    Cheer(CheerEvent),
    CharityDonation(CharityDonationEvent),
    /// Topic outside the catalog; the raw object is kept.
    Unknown {
        subscription_type: String,
        data: Value,
    },
}

impl TopicEvent {
    pub fn decode(subscription_type: &str, data: &Value) -> Result<Self, CodecError> {
        let Some(topic) = Topic::from_wire(subscription_type) else {
            return Ok(Self::Unknown {
                subscription_type: subscription_type.to_string(),
                data: data.clone(),
            });
        };

        let event = match topic {
            Topic::ChatMessage => Self::ChatMessage(parse(topic, data)?),
            Topic::PointsRedemptionAdd => Self::PointsRedemptionAdd(parse(topic, data)?),
            Topic::PointsRewardAdd => Self::PointsRewardAdd(parse(topic, data)?),
            Topic::PointsRewardRemove => Self::PointsRewardRemove(parse(topic, data)?),
            Topic::Cheer => Self::Cheer(parse(topic, data)?),
            Topic::CharityDonation => Self::CharityDonation(parse(topic, data)?),
        };
        Ok(event)
    }
}

fn parse<T: serde::de::DeserializeOwned>(topic: Topic, data: &Value) -> Result<T, CodecError> {
    T::deserialize(data).map_err(|err| CodecError::MalformedFrame(format!("{topic} event: {err}")))
}
