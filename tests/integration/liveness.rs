//! Integration tests for heartbeats and departure detection.
//!
//! Time is driven with a `ManualClock`: each step advances the clock and
//! pumps the room until it settles.
//!
//! Verification command: `cargo test --test liveness`

use std::sync::Arc;
use std::time::Duration;

use chronochat::clock::ManualClock;
use chronochat::config::SessionConfig;
use chronochat::harness::{RoomHarness, expected_messages};
use chronochat::session::identity::ParticipantKey;
use chronochat_proto::message::MessageType;
use chronochat_proto::name::Name;

const START_MS: u64 = 1_700_000_000_000;
const SESSION: u64 = 1_700_000_000;

fn room() -> (RoomHarness, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let room = RoomHarness::new(
        Name::from_uri("/hub").unwrap(),
        "lobby",
        SessionConfig::default(),
        expected_messages(1),
        clock.clone(),
    );
    (room, clock)
}

fn step(room: &mut RoomHarness, clock: &ManualClock, by: Duration) {
    clock.advance(by);
    room.pump_all();
}

fn has(room: &RoomHarness, index: usize, name: &str) -> bool {
    room.participant(index)
        .unwrap()
        .session
        .roster()
        .contains(&ParticipantKey::new(name, SESSION))
}

#[test]
fn heartbeat_sends_hello_every_interval() {
    let (mut room, clock) = room();
    let alice = room.add_participant_with_session("alice", SESSION);
    room.pump_all();

    step(&mut room, &clock, Duration::from_secs(60));
    step(&mut room, &clock, Duration::from_secs(60));

    let session = &room.participant(alice).unwrap().session;
    let kinds: Vec<_> = session.cache().iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![MessageType::Join, MessageType::Hello, MessageType::Hello]
    );
    assert!(session.is_heartbeat_armed());
}

#[test]
fn heartbeats_keep_peers_present() {
    let (mut room, clock) = room();
    let alice = room.add_participant_with_session("alice", SESSION);
    let bob = room.add_participant_with_session("bob", SESSION);
    room.pump_all();

    for _ in 0..5 {
        step(&mut room, &clock, Duration::from_secs(60));
    }

    assert!(has(&room, alice, "bob"));
    assert!(has(&room, bob, "alice"));
}

#[test]
fn crashed_peer_is_dropped_after_alive_timeout() {
    let (mut room, clock) = room();
    let alice = room.add_participant_with_session("alice", SESSION);
    let bob = room.add_participant_with_session("bob", SESSION);
    let carol = room.add_participant_with_session("carol", SESSION);
    room.pump_all();
    room.crash(bob).unwrap();

    step(&mut room, &clock, Duration::from_secs(60));
    assert!(has(&room, alice, "bob"));

    step(&mut room, &clock, Duration::from_secs(60));
    for index in [alice, carol] {
        assert!(!has(&room, index, "bob"), "participant {index}");
    }
    assert!(has(&room, alice, "carol"));
    assert!(has(&room, carol, "alice"));
}

#[test]
fn alive_check_does_not_fire_early() {
    let (mut room, clock) = room();
    let alice = room.add_participant_with_session("alice", SESSION);
    let bob = room.add_participant_with_session("bob", SESSION);
    room.pump_all();
    room.crash(bob).unwrap();

    step(&mut room, &clock, Duration::from_millis(119_999));
    assert!(has(&room, alice, "bob"));
    step(&mut room, &clock, Duration::from_millis(1));
    assert!(!has(&room, alice, "bob"));
}

#[test]
fn failed_heartbeat_stops_and_peers_notice() {
    let (mut room, clock) = room();
    let alice = room.add_participant_with_session("alice", SESSION);
    let bob = room.add_participant_with_session("bob", SESSION);
    room.pump_all();

    let alice_node = room.participant(alice).unwrap().node;
    room.network().set_fail_publish(alice_node, true);

    step(&mut room, &clock, Duration::from_secs(60));
    let session = &room.participant(alice).unwrap().session;
    assert!(!session.is_heartbeat_armed());
    assert_eq!(session.next_deadline(), Some(START_MS + 120_000));

    // The heartbeat never comes back, even once publishing works again.
    room.network().set_fail_publish(alice_node, false);
    step(&mut room, &clock, Duration::from_secs(60));
    assert!(!room.participant(alice).unwrap().session.is_heartbeat_armed());
    assert!(!has(&room, bob, "alice"));
}

#[test]
fn leaving_peer_is_not_resurrected_by_alive_check() {
    let (mut room, clock) = room();
    let alice = room.add_participant_with_session("alice", SESSION);
    let bob = room.add_participant_with_session("bob", SESSION);
    room.pump_all();
    room.leave(bob).unwrap();
    room.pump_all();
    room.crash(bob).unwrap();
    assert!(!has(&room, alice, "bob"));

    step(&mut room, &clock, Duration::from_secs(120));
    assert!(!has(&room, alice, "bob"));
    assert!(has(&room, alice, "alice"));
}
