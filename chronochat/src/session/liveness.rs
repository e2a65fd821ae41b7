//! Heartbeat and per-peer alive checks.
//!
//! Both are one-shot entries in the session's timer queue. The heartbeat
//! re-arms itself after each successful sequence advance; an alive check
//! captures the peer's sequence number at delivery time and, when it
//! fires, declares the peer departed if nothing newer was published since.

use chronochat_proto::message::MessageType;

use super::cache::PLACEHOLDER_PAYLOAD;
use super::identity::ParticipantKey;
use super::observer::SessionObserver;
use super::{ChatSession, SessionError};
use crate::clock::duration_millis;
use crate::face::Face;
use crate::face::keychain::KeyChain;
use crate::sync::SyncService;

/// Timers armed by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTimer {
    /// Own presence announcement.
    Heartbeat,
    /// Departure check for one delivered message.
    AliveCheck(AliveCheck),
}

/// State captured when a peer's message was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliveCheck {
    /// Sequence number of the delivered message.
    pub sequence_no: u64,
    /// Sender's screen name.
    pub name: String,
    /// Sender's session number.
    pub session_no: u64,
    /// Sender's data prefix, as known to the sync service.
    pub data_prefix: String,
}

impl AliveCheck {
    /// Roster key of the checked peer.
    #[must_use]
    pub fn key(&self) -> ParticipantKey {
        ParticipantKey::new(&self.name, self.session_no)
    }

    /// Whether the peer should be treated as gone: it is still listed and
    /// has published nothing since the captured message.
    #[must_use]
    pub fn is_departed(&self, current: Option<u64>, in_roster: bool) -> bool {
        in_roster && current == Some(self.sequence_no)
    }
}

impl<F, S, K, O> ChatSession<F, S, K, O>
where
    F: Face,
    S: SyncService,
    K: KeyChain,
    O: SessionObserver,
{
    pub(super) fn arm_heartbeat(&mut self) {
        let deadline = self
            .now()
            .saturating_add(duration_millis(self.config.heartbeat_interval));
        self.timers.schedule(deadline, SessionTimer::Heartbeat);
        self.heartbeat_armed = true;
    }

    /// Announces presence and re-arms. A failed sequence advance leaves the
    /// heartbeat disarmed for good.
    pub(super) fn on_heartbeat(&mut self) -> Result<(), SessionError> {
        if self.cache.is_empty() {
            self.cache_message(MessageType::Join, PLACEHOLDER_PAYLOAD);
        }
        if let Err(e) = self.sync.publish_next_sequence_no() {
            self.heartbeat_armed = false;
            tracing::error!(user = %self.identity.user_name, "heartbeat stopped");
            return Err(e.into());
        }
        self.cache_message(MessageType::Hello, PLACEHOLDER_PAYLOAD);
        tracing::debug!(
            user = %self.identity.user_name,
            sequence_no = self.sync.sequence_no(),
            "heartbeat"
        );
        self.arm_heartbeat();
        Ok(())
    }

    pub(super) fn arm_alive_check(&mut self, check: AliveCheck) {
        let deadline = self
            .now()
            .saturating_add(duration_millis(self.config.alive_timeout));
        self.timers.schedule(deadline, SessionTimer::AliveCheck(check));
    }

    pub(super) fn on_alive_check(&mut self, check: &AliveCheck) {
        let key = check.key();
        let current = self
            .sync
            .producer_sequence_no(&check.data_prefix, check.session_no);
        if !check.is_departed(current, self.roster.contains(&key)) {
            return;
        }
        self.roster.remove(&key);
        tracing::info!(participant = %key, "{}: Leave", check.name);
        self.observer.on_participant_left(&key);
    }
}
