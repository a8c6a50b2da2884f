use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MessageId = Uuid;

/// Delivery status of a user message
///
/// Ordered: a status only ever moves forward along `Sent -> Delivered -> Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

/// Recorded audio attached to a user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAttachment {
    pub uri: String,
    pub duration_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    pub status: Option<MessageStatus>,
    pub audio: Option<AudioAttachment>,
    pub hidden: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            is_user: true,
            timestamp: Utc::now(),
            status: Some(MessageStatus::Sent),
            audio: None,
            hidden: false,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            is_user: false,
            timestamp: Utc::now(),
            status: None,
            audio: None,
            hidden: false,
        }
    }

    pub fn with_audio(mut self, uri: impl Into<String>, duration_secs: u32) -> Self {
        self.audio = Some(AudioAttachment {
            uri: uri.into(),
            duration_secs,
        });
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Whether this is an assistant reply still waiting for promotion
    pub fn is_provisional(&self) -> bool {
        !self.is_user && self.hidden
    }
}
