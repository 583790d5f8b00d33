//! Message-bus and approval wire shapes (§4.9).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message arriving from an external collaborator (chat channel, webhook).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: Uuid,
    pub text: String,
    /// `"webhook"`, `"chat"`, or an adapter-specific source tag.
    pub source: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            source: source.into(),
            received_at: Utc::now(),
        }
    }
}

/// A message the agent wants delivered to an external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub text: String,
    pub channel: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OutboundMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            channel: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

/// Resolution state of an interactive approval (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}
