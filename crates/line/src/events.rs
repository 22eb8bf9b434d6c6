use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use nickbook_core::{ScopeId, UserId};

/// A webhook delivery. Events stay raw so one malformed event cannot reject the batch.
#[derive(Clone, Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    pub events: Vec<Value>,
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("malformed webhook body: {0}")]
    Body(#[source] serde_json::Error),
    #[error("malformed event: {0}")]
    Event(#[source] serde_json::Error),
    #[error("message event without a message object")]
    MissingMessage,
}

pub fn parse_webhook_body(body: &[u8]) -> Result<WebhookBody, EventParseError> {
    serde_json::from_slice(body).map_err(EventParseError::Body)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventSource {
    User { user_id: String },
    Group { group_id: String, user_id: Option<String> },
    Room { room_id: String, user_id: Option<String> },
}

impl EventSource {
    pub fn scope_id(&self) -> ScopeId {
        match self {
            Self::User { .. } => ScopeId::private(),
            Self::Group { group_id, .. } => ScopeId(group_id.clone()),
            Self::Room { room_id, .. } => ScopeId(room_id.clone()),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User { user_id } => Some(UserId(user_id.clone())),
            Self::Group { user_id, .. } | Self::Room { user_id, .. } => {
                user_id.clone().map(UserId)
            }
        }
    }

    pub fn group_id(&self) -> Option<&str> {
        match self {
            Self::Group { group_id, .. } => Some(group_id),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Group { .. } => "group",
            Self::Room { .. } => "room",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    TextMessage { text: String },
    OtherMessage { message_type: String },
    Join,
    Leave,
    Unsupported { event_type: String },
}

impl EventKind {
    pub fn name(&self) -> &str {
        match self {
            Self::TextMessage { .. } => "message.text",
            Self::OtherMessage { .. } => "message.other",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Unsupported { event_type } => event_type,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineEvent {
    pub kind: EventKind,
    pub source: EventSource,
    pub reply_token: Option<String>,
    pub timestamp: Option<i64>,
    pub webhook_event_id: Option<String>,
}

impl LineEvent {
    pub fn from_value(value: Value) -> Result<Self, EventParseError> {
        let raw: RawEvent = serde_json::from_value(value).map_err(EventParseError::Event)?;
        raw.try_into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    reply_token: Option<String>,
    source: RawSource,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    webhook_event_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawSource {
    User {
        #[serde(rename = "userId")]
        user_id: String,
    },
    Group {
        #[serde(rename = "groupId")]
        group_id: String,
        #[serde(rename = "userId", default)]
        user_id: Option<String>,
    },
    Room {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "userId", default)]
        user_id: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    text: Option<String>,
}

impl From<RawSource> for EventSource {
    fn from(raw: RawSource) -> Self {
        match raw {
            RawSource::User { user_id } => Self::User { user_id },
            RawSource::Group { group_id, user_id } => Self::Group { group_id, user_id },
            RawSource::Room { room_id, user_id } => Self::Room { room_id, user_id },
        }
    }
}

impl TryFrom<RawEvent> for LineEvent {
    type Error = EventParseError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let kind = match raw.event_type.as_str() {
            "message" => {
                let RawMessage { message_type, text } =
                    raw.message.ok_or(EventParseError::MissingMessage)?;
                match text {
                    Some(text) if message_type == "text" => EventKind::TextMessage { text },
                    _ => EventKind::OtherMessage { message_type },
                }
            }
            "join" => EventKind::Join,
            "leave" => EventKind::Leave,
            _ => EventKind::Unsupported { event_type: raw.event_type },
        };

        Ok(Self {
            kind,
            source: raw.source.into(),
            reply_token: raw.reply_token.filter(|token| !token.is_empty()),
            timestamp: raw.timestamp,
            webhook_event_id: raw.webhook_event_id,
        })
    }
}
