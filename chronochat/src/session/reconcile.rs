//! Turning sync-state batches into fetches.

use chronochat_proto::name::Name;
use chronochat_proto::packet::Interest;

use super::observer::SessionObserver;
use super::{ChatSession, SessionError};
use crate::face::Face;
use crate::face::keychain::KeyChain;
use crate::sync::{SyncService, SyncStateUpdate};

/// One fetch derived from a sync batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    /// Producer prefix.
    pub data_prefix: Name,
    /// Producer session number.
    pub session_no: u64,
    /// Sequence number to fetch.
    pub sequence_no: u64,
}

impl FetchPlan {
    /// `data_prefix/session_no/sequence_no`.
    #[must_use]
    pub fn name(&self) -> Name {
        self.data_prefix
            .clone()
            .append(self.session_no.to_string())
            .append(self.sequence_no.to_string())
    }
}

/// Reduces a batch to at most one fetch per producer prefix.
///
/// Updates whose prefix ends in `screen_name` are skipped. For repeated
/// prefixes the last update wins, at the position of the first. Prefixes
/// that are not valid names are dropped.
#[must_use]
pub fn plan_fetches(updates: &[SyncStateUpdate], screen_name: &str) -> Vec<FetchPlan> {
    let mut plans: Vec<FetchPlan> = Vec::with_capacity(updates.len());
    for update in updates {
        let data_prefix = match Name::from_uri(&update.data_prefix) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(prefix = %update.data_prefix, error = %e, "unusable sync prefix");
                continue;
            }
        };
        if data_prefix.get(-1) == Some(screen_name) {
            continue;
        }
        let plan = FetchPlan {
            data_prefix,
            session_no: update.session_no,
            sequence_no: update.sequence_no,
        };
        match plans.iter_mut().find(|p| p.data_prefix == plan.data_prefix) {
            Some(existing) => *existing = plan,
            None => plans.push(plan),
        }
    }
    plans
}

impl<F, S, K, O> ChatSession<F, S, K, O>
where
    F: Face,
    S: SyncService,
    K: KeyChain,
    O: SessionObserver,
{
    /// Records the batch's recovery flag and expresses one interest per
    /// planned fetch. The first transport failure abandons the rest.
    pub(super) fn on_sync_state(
        &mut self,
        updates: &[SyncStateUpdate],
        is_recovery: bool,
    ) -> Result<usize, SessionError> {
        self.is_recovery = is_recovery;
        let plans = plan_fetches(updates, &self.identity.screen_name);
        let mut issued = 0;
        for plan in &plans {
            let interest = Interest::new(plan.name()).with_lifetime(self.config.fetch_lifetime);
            tracing::debug!(name = %interest.name, is_recovery, "fetching");
            self.face.express_interest(interest)?;
            issued += 1;
        }
        Ok(issued)
    }
}
