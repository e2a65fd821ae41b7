//! Chat session controller.
//!
//! A [`ChatSession`] owns one participant's state in a chat room: its
//! identity, the cache of its own messages, the roster of peers it has
//! heard from, and its timers. It is driven entirely from one logical
//! thread: the host feeds it [`SessionEvent`]s from the transport and the
//! sync service and calls [`fire_due_timers`](ChatSession::fire_due_timers)
//! as time passes. Nothing blocks and nothing is retried; failures are
//! logged and the session waits for the next event to re-derive state.

pub mod cache;
pub mod identity;
pub mod liveness;
pub mod observer;
pub mod reconcile;
pub mod roster;

use std::sync::Arc;
use std::time::Duration;

use chronochat_proto::codec::{self, CodecError};
use chronochat_proto::message::MessageType;
use chronochat_proto::packet::{Data, Interest};

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::face::keychain::{KeyChain, SignError};
use crate::face::{Face, FaceError, FaceEvent};
use crate::sync::{SyncError, SyncEvent, SyncService};
use crate::timer::TimerQueue;

use cache::{CachedMessage, MessageCache, PLACEHOLDER_PAYLOAD};
use identity::{MAX_SESSION_NO, ParticipantKey, SessionIdentity};
use liveness::{AliveCheck, SessionTimer};
use observer::SessionObserver;
use roster::{Roster, RosterChange};

/// Errors raised while handling a single event or user action.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transport rejected an operation.
    #[error("transport error: {0}")]
    Face(#[from] FaceError),

    /// The sync service could not advance the sequence number.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// A reply could not be signed.
    #[error("signing error: {0}")]
    Sign(#[from] SignError),

    /// A payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A name lacked the components the protocol expects.
    #[error("malformed name: {0}")]
    MalformedName(String),

    /// A reply's signature did not verify.
    #[error("unverified data: {0}")]
    Unverified(String),
}

/// Input delivered to a session by whatever pumps its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// From the transport.
    Face(FaceEvent),
    /// From the sync service.
    Sync(SyncEvent),
}

impl From<FaceEvent> for SessionEvent {
    fn from(event: FaceEvent) -> Self {
        Self::Face(event)
    }
}

impl From<SyncEvent> for SessionEvent {
    fn from(event: SyncEvent) -> Self {
        Self::Sync(event)
    }
}

/// One participant's chat session.
pub struct ChatSession<F, S, K, O> {
    identity: SessionIdentity,
    config: SessionConfig,
    face: F,
    sync: S,
    key_chain: K,
    observer: O,
    clock: Arc<dyn Clock>,
    cache: MessageCache,
    roster: Roster,
    timers: TimerQueue<SessionTimer>,
    /// Flag of the most recent sync batch, shared by all fetches in flight.
    is_recovery: bool,
    heartbeat_armed: bool,
}

impl<F, S, K, O> ChatSession<F, S, K, O>
where
    F: Face,
    S: SyncService,
    K: KeyChain,
    O: SessionObserver,
{
    /// Creates a session and registers its chat prefix on `face`.
    ///
    /// A registration failure is logged; the session can still fetch from
    /// peers but will not be able to serve its own messages.
    pub fn new(
        identity: SessionIdentity,
        config: SessionConfig,
        mut face: F,
        sync: S,
        key_chain: K,
        observer: O,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if let Err(e) = face.register_prefix(&identity.chat_prefix) {
            tracing::error!(
                prefix = %identity.chat_prefix,
                error = %e,
                "prefix registration failed"
            );
        }
        let cache = MessageCache::new(config.cache_capacity);
        Self {
            identity,
            config,
            face,
            sync,
            key_chain,
            observer,
            clock,
            cache,
            roster: Roster::new(),
            timers: TimerQueue::new(),
            is_recovery: true,
            heartbeat_armed: false,
        }
    }

    /// Dispatches one event. Failures are logged and never propagate.
    pub fn handle_event(&mut self, event: SessionEvent) {
        let result = match event {
            SessionEvent::Face(FaceEvent::Interest(interest)) => self.on_interest(&interest),
            SessionEvent::Face(FaceEvent::Data { data, .. }) => self.on_data(&data),
            SessionEvent::Face(FaceEvent::Timeout(interest)) => {
                tracing::debug!(name = %interest.name, "fetch timed out");
                Ok(())
            }
            SessionEvent::Face(FaceEvent::RegisterFailed(prefix)) => {
                tracing::error!(%prefix, "prefix registration rejected");
                Ok(())
            }
            SessionEvent::Sync(SyncEvent::Initialized) => {
                self.on_initialized();
                Ok(())
            }
            SessionEvent::Sync(SyncEvent::State {
                updates,
                is_recovery,
            }) => self.on_sync_state(&updates, is_recovery).map(|_| ()),
        };
        if let Err(e) = result {
            self.log_failure(&e);
        }
    }

    /// Sends a chat message. Empty text only seeds the cache.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Sync`] if the sequence number could not be
    /// advanced; nothing is cached in that case.
    pub fn send_message(&mut self, text: &str) -> Result<(), SessionError> {
        if self.cache.is_empty() {
            self.cache_message(MessageType::Join, PLACEHOLDER_PAYLOAD);
        }
        if text.is_empty() {
            return Ok(());
        }
        self.sync.publish_next_sequence_no()?;
        self.cache_message(MessageType::Chat, text);
        Ok(())
    }

    /// Announces that this session is leaving the room.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Sync`] if the sequence number could not be
    /// advanced.
    pub fn leave(&mut self) -> Result<(), SessionError> {
        self.sync.publish_next_sequence_no()?;
        self.cache_message(MessageType::Leave, PLACEHOLDER_PAYLOAD);
        tracing::info!(user = %self.identity.user_name, "left {}", self.identity.chat_room);
        Ok(())
    }

    /// Runs every timer due at the current time. Returns how many fired.
    pub fn fire_due_timers(&mut self) -> usize {
        let due = self.timers.pop_due(self.now());
        let fired = due.len();
        for timer in due {
            match timer {
                SessionTimer::Heartbeat => {
                    if let Err(e) = self.on_heartbeat() {
                        self.log_failure(&e);
                    }
                }
                SessionTimer::AliveCheck(check) => self.on_alive_check(&check),
            }
        }
        fired
    }

    /// Deadline of the earliest armed timer, in milliseconds since the epoch.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Time left until the earliest armed timer is due.
    #[must_use]
    pub fn time_until_next_timer(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| Duration::from_millis(deadline.saturating_sub(self.now())))
    }

    /// Number of armed timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// This session's identity.
    #[must_use]
    pub const fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Protocol constants in use.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Participants currently considered present.
    #[must_use]
    pub const fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Own messages available to peers.
    #[must_use]
    pub const fn cache(&self) -> &MessageCache {
        &self.cache
    }

    /// Recovery flag of the most recent sync batch.
    #[must_use]
    pub const fn is_recovery(&self) -> bool {
        self.is_recovery
    }

    /// Whether the heartbeat chain is still alive.
    #[must_use]
    pub const fn is_heartbeat_armed(&self) -> bool {
        self.heartbeat_armed
    }

    /// The observer.
    #[must_use]
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// The observer, mutably.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// The transport.
    #[must_use]
    pub const fn face(&self) -> &F {
        &self.face
    }

    /// The sync service.
    #[must_use]
    pub const fn sync(&self) -> &S {
        &self.sync
    }

    fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Appends under the sync service's current sequence number.
    fn cache_message(&mut self, kind: MessageType, payload: &str) {
        self.cache.append(CachedMessage {
            sequence_no: self.sync.sequence_no(),
            kind,
            payload: payload.to_string(),
            time_ms: self.now(),
        });
    }

    fn on_initialized(&mut self) {
        if !self.heartbeat_armed {
            self.arm_heartbeat();
        }
        let me = self.identity.key();
        if self.roster.contains(&me) {
            return;
        }
        self.roster.add(me.clone());
        tracing::info!(participant = %me, "{}: Join", self.identity.screen_name);
        self.observer.on_participant_added(&me);
        self.cache_message(MessageType::Join, PLACEHOLDER_PAYLOAD);
    }

    /// Answers a peer's fetch from the cache. Misses are not answered.
    fn on_interest(&mut self, interest: &Interest) -> Result<(), SessionError> {
        let index = isize::try_from(self.identity.chat_prefix.len() + 1)
            .map_err(|_| SessionError::MalformedName(interest.name.to_uri()))?;
        let sequence_no = interest
            .name
            .get(index)
            .and_then(|c| c.parse::<u64>().ok())
            .ok_or_else(|| SessionError::MalformedName(interest.name.to_uri()))?;

        let Some(message) = self.cache.find(sequence_no) else {
            tracing::debug!(name = %interest.name, "no cached message");
            return Ok(());
        };
        let payload = message.to_payload(&self.identity.screen_name, &self.identity.chat_room);
        let mut data = Data::new(interest.name.clone(), codec::encode(&payload)?);
        self.key_chain.sign(&mut data)?;
        self.face.put_data(data)?;
        Ok(())
    }

    /// Applies a fetched peer message.
    fn on_data(&mut self, data: &Data) -> Result<(), SessionError> {
        if !self.key_chain.verify(data) {
            return Err(SessionError::Unverified(data.name.to_uri()));
        }
        let payload = codec::decode(&data.content)?;
        if payload.is_stale(self.now(), self.config.staleness_threshold) {
            tracing::debug!(
                from = %payload.from,
                timestamp = payload.timestamp,
                "stale message ignored"
            );
            return Ok(());
        }

        let malformed = || SessionError::MalformedName(data.name.to_uri());
        let session_no = data
            .name
            .get(-2)
            .and_then(|c| c.parse::<u64>().ok())
            .filter(|&n| n <= MAX_SESSION_NO)
            .ok_or_else(malformed)?;
        let sequence_no = data
            .name
            .get(-1)
            .and_then(|c| c.parse::<u64>().ok())
            .ok_or_else(malformed)?;
        let data_prefix = data.name.prefix(-2).to_uri();

        let sender = ParticipantKey::new(&payload.from, session_no);
        self.apply_roster_change(&sender, payload.kind);

        self.arm_alive_check(AliveCheck {
            sequence_no,
            name: payload.from.clone(),
            session_no,
            data_prefix,
        });

        let from_self = payload.from == self.identity.screen_name;
        if payload.kind == MessageType::Chat && !self.is_recovery && !from_self {
            let text = payload.text().unwrap_or_default();
            tracing::info!(from = %payload.from, "{}: {}", payload.from, text);
            self.observer.on_chat_received(&payload.from, text);
        }

        if payload.kind == MessageType::Leave && !from_self && self.roster.remove(&sender) {
            tracing::info!(participant = %sender, "{}: Leave", payload.from);
            self.observer.on_participant_left(&sender);
        }
        Ok(())
    }

    fn apply_roster_change(&mut self, sender: &ParticipantKey, kind: MessageType) {
        match self.roster.reconcile(sender, kind) {
            RosterChange::Added(key) => {
                tracing::info!(participant = %key, "{}: Join", key.name());
                self.observer.on_participant_added(&key);
            }
            RosterChange::Superseded { old, new } => {
                tracing::info!(%old, %new, "participant restarted");
                self.observer.on_participant_renamed(&old, &new);
            }
            RosterChange::Unchanged | RosterChange::Ignored => {}
        }
    }

    fn log_failure(&self, error: &SessionError) {
        let user = &self.identity.user_name;
        match error {
            SessionError::Codec(_)
            | SessionError::MalformedName(_)
            | SessionError::Unverified(_) => {
                tracing::warn!(%user, %error, "dropped inbound data");
            }
            SessionError::Face(_) | SessionError::Sync(_) | SessionError::Sign(_) => {
                tracing::error!(%user, %error, "session operation failed");
            }
        }
    }
}
