//! Chat payload carried as the content of a signed reply.
//!
//! Every message a participant publishes (join, leave, heartbeat hello or
//! chat text) is served to peers as one [`ChatPayload`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Kind of a chat payload. Discriminants match the wire enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// The participant joined the room.
    Join = 0,
    /// The participant is leaving the room.
    Leave = 1,
    /// Periodic heartbeat announcing the participant is still present.
    Hello = 2,
    /// A chat text message.
    Chat = 3,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Join => write!(f, "JOIN"),
            Self::Leave => write!(f, "LEAVE"),
            Self::Hello => write!(f, "HELLO"),
            Self::Chat => write!(f, "CHAT"),
        }
    }
}

/// The content of one published chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// Screen name of the sender.
    pub from: String,
    /// Chat room the message belongs to.
    pub to: String,
    /// Message kind.
    pub kind: MessageType,
    /// Chat text; present only for [`MessageType::Chat`].
    pub data: Option<String>,
    /// Send time in whole seconds since the UNIX epoch.
    pub timestamp: u64,
}

impl ChatPayload {
    /// Builds a chat text payload.
    #[must_use]
    pub fn chat(from: &str, to: &str, text: &str, timestamp: u64) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            kind: MessageType::Chat,
            data: Some(text.to_string()),
            timestamp,
        }
    }

    /// Builds a payload without text (join, leave or hello).
    #[must_use]
    pub fn control(from: &str, to: &str, kind: MessageType, timestamp: u64) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            data: None,
            timestamp,
        }
    }

    /// Chat text, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.data.as_deref()
    }

    /// Returns `true` if the payload was sent `threshold` or longer before
    /// `now_ms`. Timestamps in the future are never stale.
    #[must_use]
    pub fn is_stale(&self, now_ms: u64, threshold: Duration) -> bool {
        let sent_ms = self.timestamp.saturating_mul(1000);
        let threshold_ms = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX);
        now_ms.saturating_sub(sent_ms) >= threshold_ms
    }
}

/// Converts milliseconds to whole seconds, rounding half up.
#[must_use]
pub const fn millis_to_secs(millis: u64) -> u64 {
    millis.saturating_add(500) / 1000
}
