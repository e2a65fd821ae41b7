//! Property tests for the message cache and the roster.
//!
//! Uses proptest to verify:
//! 1. The cache never exceeds its bound and evicts in insertion order.
//! 2. `find` returns the most recently appended entry for a sequence number.
//! 3. The roster never holds two sessions of one screen name, and a
//!    repeated delivery never changes it.

use chronochat::session::cache::{CachedMessage, MessageCache};
use chronochat::session::identity::ParticipantKey;
use chronochat::session::roster::{Roster, RosterChange};
use chronochat_proto::message::MessageType;
use proptest::prelude::*;

fn arb_kind() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::Join),
        Just(MessageType::Leave),
        Just(MessageType::Hello),
        Just(MessageType::Chat),
    ]
}

/// Deliveries from a small pool of names so that collisions are common.
fn arb_delivery() -> impl Strategy<Value = (ParticipantKey, MessageType)> {
    (
        prop_oneof![Just("amy"), Just("bob"), Just("cat"), Just("dan")],
        0u64..5,
        arb_kind(),
    )
        .prop_map(|(name, session, kind)| (ParticipantKey::new(name, session), kind))
}

fn message(sequence_no: u64, index: usize) -> CachedMessage {
    CachedMessage {
        sequence_no,
        kind: MessageType::Chat,
        payload: format!("entry {index}"),
        time_ms: 0,
    }
}

proptest! {
    /// The cache holds the last `capacity` appends, oldest first.
    #[test]
    fn cache_is_bounded_fifo(
        capacity in 1usize..20,
        seqs in prop::collection::vec(0u64..50, 0..100),
    ) {
        let mut cache = MessageCache::new(capacity);
        for (index, &seq) in seqs.iter().enumerate() {
            cache.append(message(seq, index));
            prop_assert!(cache.len() <= capacity);
        }

        let kept = seqs.len().min(capacity);
        let expected: Vec<String> = (seqs.len() - kept..seqs.len())
            .map(|index| format!("entry {index}"))
            .collect();
        let actual: Vec<String> = cache.iter().map(|m| m.payload.clone()).collect();
        prop_assert_eq!(actual, expected);
    }

    /// `find` sees the latest append of a sequence number still in the cache.
    #[test]
    fn find_returns_most_recent(seqs in prop::collection::vec(0u64..10, 1..60)) {
        let mut cache = MessageCache::new(100);
        for (index, &seq) in seqs.iter().enumerate() {
            cache.append(message(seq, index));
        }
        for &seq in &seqs {
            let last = seqs.iter().rposition(|&s| s == seq).unwrap();
            let found = cache.find(seq).unwrap();
            prop_assert_eq!(&found.payload, &format!("entry {last}"));
        }
    }

    /// At most one roster entry per screen name, holding the highest session
    /// seen since it was admitted.
    #[test]
    fn roster_has_one_entry_per_name(deliveries in prop::collection::vec(arb_delivery(), 0..40)) {
        let mut roster = Roster::new();
        for (key, kind) in &deliveries {
            roster.reconcile(key, *kind);
        }

        let mut names: Vec<&str> = roster.iter().map(ParticipantKey::name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        prop_assert_eq!(names.len(), total);

        for entry in roster.iter() {
            // LEAVEs before the first admitting delivery are ignored.
            let highest = deliveries
                .iter()
                .filter(|(k, _)| k.name() == entry.name())
                .skip_while(|(_, kind)| *kind == MessageType::Leave)
                .map(|(k, _)| k.session_no())
                .max();
            prop_assert_eq!(Some(entry.session_no()), highest);
        }
    }

    /// Delivering the same message twice in a row changes nothing the second time.
    #[test]
    fn repeated_delivery_is_idempotent(
        deliveries in prop::collection::vec(arb_delivery(), 0..20),
        last in arb_delivery(),
    ) {
        let mut roster = Roster::new();
        for (key, kind) in &deliveries {
            roster.reconcile(key, *kind);
        }
        roster.reconcile(&last.0, last.1);
        let before = roster.keys();
        let change = roster.reconcile(&last.0, last.1);
        prop_assert!(matches!(change, RosterChange::Unchanged | RosterChange::Ignored));
        prop_assert_eq!(roster.keys(), before);
    }
}
