//! Per-participant delivery statistics for test rooms.
//!
//! Every participant in a test room sends the same list of expected
//! messages. A [`StatsAggregator`] keeps, for each peer it has seen, a
//! count per expected text, starting from zero. After the run the counts
//! say which messages arrived more than once and which never arrived.
//!
//! Used as a session's [`SessionObserver`], the aggregator treats a
//! receipt from, or a restart of, a participant it never registered as a
//! broken test setup and panics.

use std::collections::BTreeMap;

use tokio::sync::mpsc;

use crate::session::identity::ParticipantKey;
use crate::session::observer::SessionObserver;

/// Errors from the stats aggregator.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// No bucket matches the participant.
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),

    /// The summary queue's receiver is gone.
    #[error("summary queue closed")]
    QueueClosed,
}

/// Expected traffic for a test run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestContext {
    /// Texts every participant sends, once each.
    pub messages: Vec<String>,
    /// Index of the local participant.
    pub participant_no: usize,
    /// Number of participants in the run.
    pub participants: usize,
}

/// Delivery result for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantSummary {
    /// Participant key.
    pub name: String,
    /// Messages received, duplicates included.
    pub total_received: u32,
    /// Extra copies beyond the first.
    pub duplicates: u32,
    /// Expected messages never received.
    pub lost: u32,
}

type Counts = BTreeMap<String, u32>;

/// Tallies received chat texts per participant.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    screen_name: String,
    user_name: String,
    context: TestContext,
    template: Counts,
    buckets: BTreeMap<String, Counts>,
}

impl StatsAggregator {
    /// Creates an aggregator for the local session.
    pub fn new(screen_name: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            user_name: user_name.into(),
            context: TestContext::default(),
            template: Counts::new(),
            buckets: BTreeMap::new(),
        }
    }

    /// Installs the expected messages and registers the local user.
    pub fn set_test_context(&mut self, context: TestContext) {
        self.template = context.messages.iter().map(|m| (m.clone(), 0)).collect();
        self.context = context;
        let own = self.user_name.clone();
        self.add_user(&own);
    }

    /// The installed test context.
    #[must_use]
    pub const fn context(&self) -> &TestContext {
        &self.context
    }

    /// Updates the room size after the context was installed, keeping counts.
    pub const fn set_participant_count(&mut self, participants: usize) {
        self.context.participants = participants;
    }

    /// Starts tracking `key` with all expected counts at zero. Keys without
    /// a session suffix are rejected with an error log; known keys are left
    /// alone.
    pub fn add_user(&mut self, key: &str) {
        if key.len() <= self.screen_name.len() {
            tracing::error!(%key, "refusing to track a participant without a session number");
            return;
        }
        if self.buckets.contains_key(key) {
            return;
        }
        self.buckets.insert(key.to_string(), self.template.clone());
        tracing::debug!(%key, tracked = self.buckets.len(), "tracking participant");
    }

    /// Moves `old`'s counts to `new` after a participant restart.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::UnknownParticipant`] if `old` is not tracked.
    pub fn rename_user(&mut self, old: &str, new: &str) -> Result<(), StatsError> {
        let counts = self
            .buckets
            .remove(old)
            .ok_or_else(|| StatsError::UnknownParticipant(old.to_string()))?;
        tracing::info!(%old, %new, "participant renamed");
        self.buckets.insert(new.to_string(), counts);
        Ok(())
    }

    /// Counts one receipt of `text` from screen name `from`.
    ///
    /// The bucket whose base name equals `from` is preferred; otherwise the
    /// first key containing `from` is used. Receipts from the local screen
    /// name are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::UnknownParticipant`] if no bucket matches.
    pub fn record_receipt(&mut self, from: &str, text: &str) -> Result<(), StatsError> {
        if from == self.screen_name {
            tracing::warn!(%from, "not counting a message from myself");
            return Ok(());
        }
        let key = self
            .find_key(from)
            .ok_or_else(|| StatsError::UnknownParticipant(from.to_string()))?;
        let template = &self.template;
        let counts = self.buckets.entry(key).or_default();
        if !template.contains_key(text) {
            tracing::warn!(%from, %text, "unexpected message");
        }
        *counts.entry(text.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn find_key(&self, from: &str) -> Option<String> {
        let exact = self
            .buckets
            .keys()
            .find(|k| ParticipantKey::parse(k).is_some_and(|p| p.name() == from));
        exact
            .or_else(|| self.buckets.keys().find(|k| k.contains(from)))
            .cloned()
    }

    /// Per-peer results, excluding the local session.
    #[must_use]
    pub fn summarize(&self) -> Vec<ParticipantSummary> {
        self.buckets
            .iter()
            .filter(|(key, _)| **key != self.user_name)
            .map(|(key, counts)| {
                let mut summary = ParticipantSummary {
                    name: key.clone(),
                    total_received: 0,
                    duplicates: 0,
                    lost: 0,
                };
                for &count in counts.values() {
                    summary.total_received += count;
                    if count > 1 {
                        summary.duplicates += count - 1;
                    } else if count == 0 {
                        summary.lost += 1;
                    }
                }
                tracing::debug!(
                    local = %self.user_name,
                    peer = %summary.name,
                    count = summary.total_received,
                    duplicates = summary.duplicates,
                    lost = summary.lost,
                    "participant summary"
                );
                summary
            })
            .collect()
    }

    /// Sends [`summarize`](Self::summarize) to `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::QueueClosed`] if the receiver was dropped.
    pub fn submit(
        &self,
        queue: &mpsc::UnboundedSender<Vec<ParticipantSummary>>,
    ) -> Result<(), StatsError> {
        tracing::debug!(
            local = %self.user_name,
            expected = self.context.messages.len(),
            "submitting stats"
        );
        queue
            .send(self.summarize())
            .map_err(|_| StatsError::QueueClosed)
    }

    /// Counts recorded for `key`, if tracked.
    #[must_use]
    pub fn counts(&self, key: &str) -> Option<&BTreeMap<String, u32>> {
        self.buckets.get(key)
    }

    /// Tracked participant keys, the local one included.
    pub fn tracked(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }
}

impl SessionObserver for StatsAggregator {
    fn on_participant_added(&mut self, key: &ParticipantKey) {
        self.add_user(&key.to_string());
    }

    fn on_participant_renamed(&mut self, old: &ParticipantKey, new: &ParticipantKey) {
        if let Err(e) = self.rename_user(&old.to_string(), &new.to_string()) {
            panic!("{}: inconsistent roster update: {e}", self.user_name);
        }
    }

    fn on_chat_received(&mut self, from: &str, text: &str) {
        if let Err(e) = self.record_receipt(from, text) {
            panic!("{}: receipt outside the test context: {e}", self.user_name);
        }
    }
}
