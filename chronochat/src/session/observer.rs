//! Hooks through which a session reports roster and chat activity.
//!
//! The session owns one [`SessionObserver`]. The application layer can use
//! [`EventObserver`] to receive [`ChatEvent`]s over a channel; test
//! harnesses plug in [`StatsAggregator`](crate::stats::StatsAggregator).

use tokio::sync::mpsc;

use super::identity::ParticipantKey;

/// Callbacks for roster changes and received chat text. All default to no-ops.
pub trait SessionObserver {
    /// A participant was added to the roster.
    fn on_participant_added(&mut self, _key: &ParticipantKey) {}

    /// A participant restarted; `old`'s bookkeeping now belongs to `new`.
    fn on_participant_renamed(&mut self, _old: &ParticipantKey, _new: &ParticipantKey) {}

    /// A participant left or was declared departed.
    fn on_participant_left(&mut self, _key: &ParticipantKey) {}

    /// A chat message from another participant was delivered.
    fn on_chat_received(&mut self, _from: &str, _text: &str) {}
}

impl SessionObserver for () {}

/// Events emitted by [`EventObserver`] for an application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A participant joined.
    ParticipantJoined {
        /// Rendered participant key.
        key: String,
    },
    /// A participant restarted under a newer session.
    ParticipantRenamed {
        /// Previous key.
        old: String,
        /// Current key.
        new: String,
    },
    /// A participant left or timed out.
    ParticipantLeft {
        /// Rendered participant key.
        key: String,
    },
    /// A chat message arrived.
    MessageReceived {
        /// Sender's screen name.
        from: String,
        /// Message text.
        text: String,
    },
}

/// Forwards session activity as [`ChatEvent`]s over a bounded channel.
///
/// Sends are best-effort: if the channel is full or closed the event is
/// dropped.
#[derive(Debug, Clone)]
pub struct EventObserver {
    tx: mpsc::Sender<ChatEvent>,
}

impl EventObserver {
    /// Creates the observer and the receiver the application should drain.
    #[must_use]
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    fn emit(&self, event: ChatEvent) {
        if self.tx.try_send(event).is_err() {
            tracing::debug!("chat event dropped, receiver full or closed");
        }
    }
}

impl SessionObserver for EventObserver {
    fn on_participant_added(&mut self, key: &ParticipantKey) {
        self.emit(ChatEvent::ParticipantJoined {
            key: key.to_string(),
        });
    }

    fn on_participant_renamed(&mut self, old: &ParticipantKey, new: &ParticipantKey) {
        self.emit(ChatEvent::ParticipantRenamed {
            old: old.to_string(),
            new: new.to_string(),
        });
    }

    fn on_participant_left(&mut self, key: &ParticipantKey) {
        self.emit(ChatEvent::ParticipantLeft {
            key: key.to_string(),
        });
    }

    fn on_chat_received(&mut self, from: &str, text: &str) {
        self.emit(ChatEvent::MessageReceived {
            from: from.to_string(),
            text: text.to_string(),
        });
    }
}
