//! Property tests for names and the chat payload codec.
//!
//! Uses proptest to verify:
//! 1. Any name with non-empty components survives URI rendering and parsing.
//! 2. Negative prefixes and indices agree with the component list.
//! 3. Random bytes never cause a panic in `decode`.
//! 4. Staleness is monotonic in the current time.

use std::time::Duration;

use chronochat_proto::codec;
use chronochat_proto::message::{ChatPayload, MessageType};
use chronochat_proto::name::Name;
use proptest::prelude::*;

/// Strategy for names of 0..8 arbitrary non-empty components.
fn arb_name() -> impl Strategy<Value = Name> {
    prop::collection::vec("[^\x00]{1,12}", 0..8).prop_map(|components| {
        components
            .into_iter()
            .fold(Name::new(), |name, c| name.append(c))
    })
}

fn arb_kind() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::Join),
        Just(MessageType::Leave),
        Just(MessageType::Hello),
        Just(MessageType::Chat),
    ]
}

proptest! {
    /// Escaping makes every component survive the URI form, whatever it contains.
    #[test]
    fn uri_form_preserves_components(name in arb_name()) {
        let parsed = Name::from_uri(&name.to_uri()).expect("rendered URI should parse");
        prop_assert_eq!(parsed, name);
    }

    /// Dropping `k` trailing components keeps a prefix of the original.
    #[test]
    fn negative_prefix_is_prefix(name in arb_name(), k in 0usize..10) {
        let k = isize::try_from(k).unwrap();
        let prefix = name.prefix(-k);
        prop_assert!(prefix.is_prefix_of(&name));
        prop_assert_eq!(prefix.len(), name.len().saturating_sub(k.unsigned_abs()));
    }

    /// `get(-1)` is the last component and `get(len)` is out of range.
    #[test]
    fn negative_index_counts_from_end(name in arb_name()) {
        let last = name.components().last().map(String::as_str);
        prop_assert_eq!(name.get(-1), last);
        prop_assert_eq!(name.get(isize::try_from(name.len()).unwrap()), None);
    }

    /// Random bytes never cause a panic when decoded.
    #[test]
    fn random_bytes_decode_no_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode(&bytes);
    }

    /// Control payloads never carry text, whatever their kind.
    #[test]
    fn control_payload_has_no_text(kind in arb_kind(), ts in any::<u64>()) {
        let payload = ChatPayload::control("a", "room", kind, ts);
        let bytes = codec::encode(&payload).expect("encode should succeed");
        let decoded = codec::decode(&bytes).expect("decode should succeed");
        prop_assert!(decoded.data.is_none());
        prop_assert_eq!(decoded.kind, kind);
    }

    /// Once stale, a payload stays stale as time moves on.
    #[test]
    fn staleness_is_monotonic(
        ts in 0u64..4_000_000_000,
        now in 0u64..4_000_000_000_000,
        later in 0u64..1_000_000,
    ) {
        let payload = ChatPayload::chat("a", "room", "x", ts);
        let threshold = Duration::from_millis(120_000);
        if payload.is_stale(now, threshold) {
            prop_assert!(payload.is_stale(now + later, threshold));
        }
    }
}
