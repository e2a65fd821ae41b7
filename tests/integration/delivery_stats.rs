//! Integration tests for per-participant delivery statistics.
//!
//! Verification command: `cargo test --test delivery_stats`

use std::sync::Arc;

use tokio::sync::mpsc;

use chronochat::clock::ManualClock;
use chronochat::config::SessionConfig;
use chronochat::face::FaceEvent;
use chronochat::face::keychain::{DigestKeyChain, KeyChain};
use chronochat::harness::{RoomHarness, expected_messages};
use chronochat::loopback::MemoryNetwork;
use chronochat::session::identity::SessionIdentity;
use chronochat::session::{ChatSession, SessionEvent};
use chronochat::stats::{ParticipantSummary, StatsAggregator, TestContext};
use chronochat::sync::SyncEvent;
use chronochat_proto::codec;
use chronochat_proto::message::ChatPayload;
use chronochat_proto::name::Name;
use chronochat_proto::packet::{Data, Interest};

const START_MS: u64 = 1_700_000_000_000;
const SESSION: u64 = 1_700_000_000;

fn room(messages: usize) -> RoomHarness {
    RoomHarness::new(
        Name::from_uri("/hub").unwrap(),
        "lobby",
        SessionConfig::default(),
        expected_messages(messages),
        Arc::new(ManualClock::new(START_MS)),
    )
}

fn collect(room: &RoomHarness) -> Vec<Vec<ParticipantSummary>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    room.submit_stats(&tx).unwrap();
    drop(tx);
    let mut all = Vec::new();
    while let Ok(summaries) = rx.try_recv() {
        all.push(summaries);
    }
    all
}

#[test]
fn clean_run_has_no_loss_or_duplicates() {
    let mut room = room(5);
    for name in ["alice", "bob", "carol"] {
        room.add_participant_with_session(name, SESSION);
    }
    room.pump_all();

    for text in room.messages().to_vec() {
        for index in 0..room.len() {
            room.send(index, &text).unwrap();
        }
        room.pump_all();
    }

    let reports = collect(&room);
    assert_eq!(reports.len(), 3);
    for report in reports {
        assert_eq!(report.len(), 2);
        for summary in report {
            assert_eq!(summary.total_received, 5, "{}", summary.name);
            assert_eq!(summary.duplicates, 0, "{}", summary.name);
            assert_eq!(summary.lost, 0, "{}", summary.name);
        }
    }
}

#[test]
fn failed_fetch_is_reported_lost() {
    let mut room = room(2);
    let alice = room.add_participant_with_session("alice", SESSION);
    let bob = room.add_participant_with_session("bob", SESSION);
    room.pump_all();

    let bob_node = room.participant(bob).unwrap().node;
    room.network().set_fail_express(bob_node, true);
    room.send(alice, "chat message 1").unwrap();
    room.pump_all();
    room.network().set_fail_express(bob_node, false);

    room.send(alice, "chat message 2").unwrap();
    room.pump_all();

    let summary = room.participant(bob).unwrap().stats().summarize();
    assert_eq!(
        summary,
        vec![ParticipantSummary {
            name: "alice1700000000".into(),
            total_received: 1,
            duplicates: 0,
            lost: 1,
        }]
    );
}

#[test]
fn crashed_participants_do_not_report() {
    let mut room = room(1);
    room.add_participant_with_session("alice", SESSION);
    let bob = room.add_participant_with_session("bob", SESSION);
    room.pump_all();
    room.crash(bob).unwrap();
    assert_eq!(collect(&room).len(), 1);
}

#[test]
fn redelivered_chat_counts_as_duplicate() {
    let clock = Arc::new(ManualClock::new(START_MS));
    let net = MemoryNetwork::new(clock.clone());
    let hub = Name::from_uri("/hub").unwrap();
    let identity = SessionIdentity::with_token("alice", "lobby", &hub, "alicetoken", SESSION);
    let config = SessionConfig::default();
    let mut endpoint = net.join(
        &identity.chat_prefix,
        identity.session_no,
        &config.sync_broadcast_prefix,
    );

    let mut stats = StatsAggregator::new(&identity.screen_name, &identity.user_name);
    stats.set_test_context(TestContext {
        messages: vec!["hi".to_string()],
        participant_no: 0,
        participants: 2,
    });
    let mut session = ChatSession::new(
        identity,
        config,
        endpoint.face,
        endpoint.sync,
        DigestKeyChain,
        stats,
        clock,
    );
    while let Ok(event) = endpoint.events.try_recv() {
        session.handle_event(event);
    }
    session.handle_event(SessionEvent::Sync(SyncEvent::State {
        updates: Vec::new(),
        is_recovery: false,
    }));

    let name = Name::from_uri("/hub/lobby/caroltoken/0000000012/1").unwrap();
    let payload = ChatPayload::chat("carol", "lobby", "hi", SESSION);
    let mut data = Data::new(name.clone(), codec::encode(&payload).unwrap());
    DigestKeyChain.sign(&mut data).unwrap();
    for _ in 0..2 {
        session.handle_event(SessionEvent::Face(FaceEvent::Data {
            interest: Interest::new(name.clone()),
            data: data.clone(),
        }));
    }

    assert_eq!(session.roster().len(), 2);
    assert_eq!(
        session.observer().summarize(),
        vec![ParticipantSummary {
            name: "carol0000000012".into(),
            total_received: 2,
            duplicates: 1,
            lost: 0,
        }]
    );
}
