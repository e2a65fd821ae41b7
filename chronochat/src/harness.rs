//! Multi-participant test rooms over a [`MemoryNetwork`].
//!
//! A [`RoomHarness`] owns several sessions sharing one in-memory network.
//! Every session is observed by a [`StatsAggregator`] primed with the same
//! expected messages, so after a run each participant can report what it
//! received from every other one.

use std::sync::Arc;

use tokio::sync::mpsc;

use chronochat_proto::name::Name;

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::face::keychain::DigestKeyChain;
use crate::loopback::{MemoryFace, MemoryNetwork, MemorySync, NodeId};
use crate::runtime;
use crate::session::identity::SessionIdentity;
use crate::session::{ChatSession, SessionError, SessionEvent};
use crate::stats::{ParticipantSummary, StatsAggregator, StatsError, TestContext};

/// Safety bound on pump rounds in [`RoomHarness::pump_all`].
const MAX_ROUNDS: usize = 10_000;

/// Session type used by the harness.
pub type HarnessSession = ChatSession<MemoryFace, MemorySync, DigestKeyChain, StatsAggregator>;

/// Errors from harness operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// No participant has that index.
    #[error("no participant #{0}")]
    NoSuchParticipant(usize),

    /// The participant has crashed.
    #[error("participant #{0} has crashed")]
    Crashed(usize),

    /// The session rejected the action.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Statistics could not be submitted.
    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// One simulated participant.
pub struct Participant {
    /// The participant's session.
    pub session: HarnessSession,
    /// The participant's network node.
    pub node: NodeId,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    crashed: bool,
}

impl Participant {
    /// Whether [`RoomHarness::crash`] was called for this participant.
    #[must_use]
    pub const fn is_crashed(&self) -> bool {
        self.crashed
    }

    /// The participant's delivery statistics.
    #[must_use]
    pub const fn stats(&self) -> &StatsAggregator {
        self.session.observer()
    }
}

/// Texts every participant sends in a run of `count` messages.
#[must_use]
pub fn expected_messages(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("chat message {i}")).collect()
}

/// A chat room of simulated participants.
pub struct RoomHarness {
    network: MemoryNetwork,
    clock: Arc<dyn Clock>,
    hub_prefix: Name,
    chat_room: String,
    config: SessionConfig,
    messages: Vec<String>,
    participants: Vec<Participant>,
}

impl RoomHarness {
    /// Creates an empty room.
    pub fn new(
        hub_prefix: Name,
        chat_room: impl Into<String>,
        config: SessionConfig,
        messages: Vec<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            network: MemoryNetwork::new(clock.clone()),
            clock,
            hub_prefix,
            chat_room: chat_room.into(),
            config,
            messages,
            participants: Vec::new(),
        }
    }

    /// Adds a participant whose session number is taken from the clock.
    /// Returns its index.
    pub fn add_participant(&mut self, screen_name: &str) -> usize {
        let identity = SessionIdentity::new(
            screen_name,
            &self.chat_room,
            &self.hub_prefix,
            self.clock.now_millis(),
        );
        self.add_identity(identity)
    }

    /// Adds a participant with an explicit session number, e.g. to model a
    /// restart under the same screen name. Returns its index.
    pub fn add_participant_with_session(&mut self, screen_name: &str, session_no: u64) -> usize {
        let token = crate::session::identity::random_token(
            crate::session::identity::PREFIX_TOKEN_LEN,
        );
        let identity = SessionIdentity::with_token(
            screen_name,
            &self.chat_room,
            &self.hub_prefix,
            &token,
            session_no,
        );
        self.add_identity(identity)
    }

    fn add_identity(&mut self, identity: SessionIdentity) -> usize {
        let index = self.participants.len();
        let endpoint = self.network.join(
            &identity.chat_prefix,
            identity.session_no,
            &self.config.sync_broadcast_prefix,
        );

        let mut stats = StatsAggregator::new(&identity.screen_name, &identity.user_name);
        stats.set_test_context(TestContext {
            messages: self.messages.clone(),
            participant_no: index,
            participants: index + 1,
        });

        tracing::info!(
            index,
            user = %identity.user_name,
            node = %endpoint.node,
            "participant joined"
        );
        let session = ChatSession::new(
            identity,
            self.config.clone(),
            endpoint.face,
            endpoint.sync,
            DigestKeyChain,
            stats,
            self.clock.clone(),
        );
        self.participants.push(Participant {
            session,
            node: endpoint.node,
            events: endpoint.events,
            crashed: false,
        });

        // Everyone's context tracks the room size, not their join order.
        let size = self.participants.len();
        for participant in &mut self.participants {
            participant.session.observer_mut().set_participant_count(size);
        }
        index
    }

    fn live_participant(&mut self, index: usize) -> Result<&mut Participant, HarnessError> {
        let participant = self
            .participants
            .get_mut(index)
            .ok_or(HarnessError::NoSuchParticipant(index))?;
        if participant.crashed {
            return Err(HarnessError::Crashed(index));
        }
        Ok(participant)
    }

    /// Sends `text` from participant `index`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] if the participant does not exist, has
    /// crashed, or the session rejects the message.
    pub fn send(&mut self, index: usize, text: &str) -> Result<(), HarnessError> {
        self.live_participant(index)?.session.send_message(text)?;
        Ok(())
    }

    /// Makes participant `index` leave the room.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] if the participant does not exist, has
    /// crashed, or the session rejects the action.
    pub fn leave(&mut self, index: usize) -> Result<(), HarnessError> {
        self.live_participant(index)?.session.leave()?;
        Ok(())
    }

    /// Disconnects participant `index` without a LEAVE and stops pumping it.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NoSuchParticipant`] for an unknown index.
    pub fn crash(&mut self, index: usize) -> Result<(), HarnessError> {
        let participant = self
            .participants
            .get_mut(index)
            .ok_or(HarnessError::NoSuchParticipant(index))?;
        participant.crashed = true;
        self.network.disconnect(participant.node);
        tracing::info!(index, "participant crashed");
        Ok(())
    }

    /// Pumps every live participant and expires overdue interests until
    /// nothing more happens. Returns the total work done.
    pub fn pump_all(&mut self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_ROUNDS {
            let mut round = self.network.expire_interests();
            for participant in self.participants.iter_mut().filter(|p| !p.crashed) {
                round += runtime::pump(&mut participant.session, &mut participant.events);
            }
            if round == 0 {
                return total;
            }
            total += round;
        }
        tracing::warn!(rounds = MAX_ROUNDS, "room did not settle");
        total
    }

    /// Sends every live participant's summary to `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Stats`] if the queue is closed.
    pub fn submit_stats(
        &self,
        queue: &mpsc::UnboundedSender<Vec<ParticipantSummary>>,
    ) -> Result<(), HarnessError> {
        for participant in self.participants.iter().filter(|p| !p.crashed) {
            participant.stats().submit(queue)?;
        }
        Ok(())
    }

    /// Participant `index`.
    #[must_use]
    pub fn participant(&self, index: usize) -> Option<&Participant> {
        self.participants.get(index)
    }

    /// All participants in join order.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Number of participants ever added.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Returns `true` if nobody joined yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// The underlying network, for failure injection.
    #[must_use]
    pub const fn network(&self) -> &MemoryNetwork {
        &self.network
    }

    /// The expected messages every participant was primed with.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}
