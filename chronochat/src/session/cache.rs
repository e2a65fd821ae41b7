//! Bounded cache of this session's own published messages.
//!
//! Peers fetch our messages by sequence number some time after the sync
//! service announced them, so the most recent ones are kept here to answer
//! those requests. The oldest entries are evicted first.

use std::collections::VecDeque;

use chronochat_proto::message::{ChatPayload, MessageType, millis_to_secs};

/// Payload stored for messages that carry no text.
pub const PLACEHOLDER_PAYLOAD: &str = "xxx";

/// One message as published by this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMessage {
    /// Sequence number the message was published under.
    pub sequence_no: u64,
    /// Message kind.
    pub kind: MessageType,
    /// Chat text, or [`PLACEHOLDER_PAYLOAD`].
    pub payload: String,
    /// Time the message was cached, in milliseconds since the epoch.
    pub time_ms: u64,
}

impl CachedMessage {
    /// Builds the wire payload served for this message.
    #[must_use]
    pub fn to_payload(&self, from: &str, to: &str) -> ChatPayload {
        let timestamp = millis_to_secs(self.time_ms);
        match self.kind {
            MessageType::Chat => ChatPayload::chat(from, to, &self.payload, timestamp),
            kind => ChatPayload::control(from, to, kind, timestamp),
        }
    }
}

/// FIFO-evicting store of [`CachedMessage`]s.
#[derive(Debug, Clone)]
pub struct MessageCache {
    entries: VecDeque<CachedMessage>,
    capacity: usize,
}

impl MessageCache {
    /// Creates an empty cache holding at most `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends a message, evicting from the oldest end until the cache is
    /// back within capacity.
    pub fn append(&mut self, message: CachedMessage) {
        self.entries.push_back(message);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Finds the most recently appended message with `sequence_no`.
    #[must_use]
    pub fn find(&self, sequence_no: u64) -> Option<&CachedMessage> {
        self.entries
            .iter()
            .rev()
            .find(|m| m.sequence_no == sequence_no)
    }

    /// Number of cached messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been cached (or everything was evicted).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of messages kept.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &CachedMessage> {
        self.entries.iter()
    }
}
