//! Group-synchronization collaborator interface.
//!
//! The sync service gives each session a private, monotonically increasing
//! sequence counter and tells every other member of the group when a
//! producer's counter changes. It carries no payload: the session fetches
//! the content itself once it learns a new sequence number exists.
//!
//! Implementations:
//! - [`crate::loopback::MemorySync`] - in-process group for tests and the harness

/// Errors that can occur while publishing a sequence number.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The sync group is unreachable.
    #[error("sync group unreachable")]
    Unreachable,
}

/// One producer's counter change, as reported by the sync service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncStateUpdate {
    /// The producer's data prefix (URI form).
    pub data_prefix: String,
    /// The producer's session number.
    pub session_no: u64,
    /// The producer's latest sequence number.
    pub sequence_no: u64,
}

impl SyncStateUpdate {
    /// Creates an update.
    pub fn new(data_prefix: impl Into<String>, session_no: u64, sequence_no: u64) -> Self {
        Self {
            data_prefix: data_prefix.into(),
            session_no,
            sequence_no,
        }
    }
}

/// Notifications from the sync service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The local producer has joined the group.
    Initialized,
    /// A batch of other producers' counter changes.
    State {
        /// Updates in the order the service reported them.
        updates: Vec<SyncStateUpdate>,
        /// `true` for an initial or recovery catch-up batch.
        is_recovery: bool,
    },
}

/// Per-session sequence counter shared with a sync group.
pub trait SyncService {
    /// Advance the local counter by one and announce it to the group.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the new number could not be announced. The
    /// counter is left unchanged in that case.
    fn publish_next_sequence_no(&mut self) -> Result<(), SyncError>;

    /// The local counter's current value.
    fn sequence_no(&self) -> u64;

    /// The latest sequence number known for another producer, or `None` if
    /// the producer is unknown.
    fn producer_sequence_no(&self, data_prefix: &str, session_no: u64) -> Option<u64>;
}
