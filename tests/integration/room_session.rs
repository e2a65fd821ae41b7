//! Integration tests for rooms of sessions on the in-memory network.
//!
//! Covers discovery, chat delivery, leaving, restarts under the same
//! screen name, and late joiners catching up without replaying backlog.
//!
//! Verification command: `cargo test --test room_session`

use std::sync::Arc;

use chronochat::clock::ManualClock;
use chronochat::config::SessionConfig;
use chronochat::harness::{RoomHarness, expected_messages};
use chronochat::session::identity::ParticipantKey;
use chronochat_proto::message::MessageType;
use chronochat_proto::name::Name;

const START_MS: u64 = 1_700_000_000_000;
const SESSION: u64 = 1_700_000_000;

fn room(messages: usize) -> RoomHarness {
    RoomHarness::new(
        Name::from_uri("/ndn/edu/ucla/remap").unwrap(),
        "ndnchat",
        SessionConfig::default(),
        expected_messages(messages),
        Arc::new(ManualClock::new(START_MS)),
    )
}

fn roster_keys(room: &RoomHarness, index: usize) -> Vec<String> {
    room.participant(index).unwrap().session.roster().keys()
}

#[test]
fn three_participants_see_each_other() {
    let mut room = room(1);
    let alice = room.add_participant_with_session("alice", SESSION);
    let bob = room.add_participant_with_session("bob", SESSION);
    let carol = room.add_participant_with_session("carol", SESSION);
    room.pump_all();

    for index in [alice, bob, carol] {
        let mut keys = roster_keys(&room, index);
        keys.sort();
        assert_eq!(
            keys,
            vec!["alice1700000000", "bob1700000000", "carol1700000000"],
            "participant {index}"
        );
    }
}

#[test]
fn chat_reaches_every_peer() {
    let mut room = room(2);
    let alice = room.add_participant_with_session("alice", SESSION);
    let bob = room.add_participant_with_session("bob", SESSION);
    let carol = room.add_participant_with_session("carol", SESSION);
    room.pump_all();

    room.send(alice, "chat message 1").unwrap();
    room.send(alice, "chat message 2").unwrap();
    room.pump_all();

    for index in [bob, carol] {
        let stats = room.participant(index).unwrap().stats();
        let counts = stats.counts("alice1700000000").unwrap();
        assert_eq!(counts["chat message 1"], 1, "participant {index}");
        assert_eq!(counts["chat message 2"], 1, "participant {index}");
    }
    let own = room.participant(alice).unwrap().stats();
    assert_eq!(own.counts("alice1700000000").unwrap()["chat message 1"], 0);
}

#[test]
fn sender_cache_holds_join_and_chats() {
    let mut room = room(1);
    let alice = room.add_participant_with_session("alice", SESSION);
    room.pump_all();
    room.send(alice, "chat message 1").unwrap();

    let cache = room.participant(alice).unwrap().session.cache();
    let kinds: Vec<_> = cache.iter().map(|m| (m.sequence_no, m.kind)).collect();
    assert_eq!(kinds, vec![(0, MessageType::Join), (1, MessageType::Chat)]);
}

#[test]
fn leave_removes_participant_from_peers() {
    let mut room = room(1);
    let alice = room.add_participant_with_session("alice", SESSION);
    let bob = room.add_participant_with_session("bob", SESSION);
    room.pump_all();

    room.leave(bob).unwrap();
    room.pump_all();

    assert_eq!(roster_keys(&room, alice), vec!["alice1700000000"]);
    // A session never removes itself on its own LEAVE.
    assert!(
        room.participant(bob)
            .unwrap()
            .session
            .roster()
            .contains(&ParticipantKey::new("bob", SESSION))
    );
}

#[test]
fn restart_supersedes_old_session_in_place() {
    let mut room = room(1);
    let alice = room.add_participant_with_session("alice", SESSION);
    let old_bob = room.add_participant_with_session("bob", SESSION);
    let carol = room.add_participant_with_session("carol", SESSION);
    room.pump_all();
    room.send(old_bob, "chat message 1").unwrap();
    room.pump_all();

    room.crash(old_bob).unwrap();
    room.add_participant_with_session("bob", SESSION + 100);
    room.pump_all();

    for index in [alice, carol] {
        let keys = roster_keys(&room, index);
        assert_eq!(keys.len(), 3, "participant {index}");
        assert!(keys.contains(&"bob1700000100".to_string()));
        assert!(!keys.contains(&"bob1700000000".to_string()));

        let stats = room.participant(index).unwrap().stats();
        assert!(stats.counts("bob1700000000").is_none());
        assert_eq!(stats.counts("bob1700000100").unwrap()["chat message 1"], 1);
    }
}

#[test]
fn late_joiner_does_not_replay_backlog() {
    let mut room = room(1);
    let alice = room.add_participant_with_session("alice", SESSION);
    room.pump_all();
    room.send(alice, "chat message 1").unwrap();
    room.pump_all();

    let carol = room.add_participant_with_session("carol", SESSION);
    room.pump_all();

    let late = room.participant(carol).unwrap();
    assert!(late.session.is_recovery());
    assert!(late.session.roster().contains(&ParticipantKey::new("alice", SESSION)));
    let counts = late.stats().counts("alice1700000000").unwrap();
    assert_eq!(counts["chat message 1"], 0);
}

#[test]
fn late_joiner_receives_new_messages() {
    let mut room = room(2);
    let alice = room.add_participant_with_session("alice", SESSION);
    room.pump_all();
    room.send(alice, "chat message 1").unwrap();
    room.pump_all();
    let carol = room.add_participant_with_session("carol", SESSION);
    room.pump_all();

    room.send(alice, "chat message 2").unwrap();
    room.pump_all();

    let late = room.participant(carol).unwrap();
    assert!(!late.session.is_recovery());
    let counts = late.stats().counts("alice1700000000").unwrap();
    assert_eq!(counts["chat message 1"], 0);
    assert_eq!(counts["chat message 2"], 1);
}
