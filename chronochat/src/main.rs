//! `chronochat-harness`: simulated chat room with delivery statistics.
//!
//! Starts N participants on an in-memory network, has each of them send
//! the same M messages in real time, then prints what every participant
//! received from every other one. Configuration via CLI flags, environment
//! variables, or config file (`~/.config/chronochat/config.toml`).
//!
//! ```bash
//! cargo run --bin chronochat-harness -- -n 4 --messages 20 --chat-delay-ms 100
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use chronochat::clock::SystemClock;
use chronochat::config::{CliArgs, Config, HarnessConfig};
use chronochat::harness::{RoomHarness, expected_messages};
use chronochat::stats::ParticipantSummary;
use chronochat_proto::name::Name;

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    let config = match Config::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let hub_prefix = match Name::from_uri(&config.harness.hub_prefix) {
        Ok(name) => name,
        Err(e) => {
            eprintln!("Invalid hub prefix {}: {e}", config.harness.hub_prefix);
            std::process::exit(1);
        }
    };

    tracing::info!(
        participants = config.harness.participants,
        messages = config.harness.messages,
        room = %config.harness.chat_room,
        "chronochat harness starting"
    );

    let mut room = RoomHarness::new(
        hub_prefix,
        &config.harness.chat_room,
        config.session.clone(),
        expected_messages(config.harness.messages),
        Arc::new(SystemClock),
    );
    for i in 0..config.harness.participants {
        room.add_participant(&format!("{}{i}", config.harness.screen_name));
    }

    run_room(&mut room, &config.harness).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Err(e) = room.submit_stats(&tx) {
        tracing::error!(error = %e, "failed to collect stats");
    }
    drop(tx);

    let mut reporter = 0;
    while let Some(summaries) = rx.recv().await {
        let user = room
            .participant(reporter)
            .map_or("?", |p| p.session.identity().user_name.as_str());
        print_report(user, &summaries);
        reporter += 1;
    }

    tracing::info!("chronochat harness exiting");
}

/// Sends every expected message from every participant, one round per
/// `chat_delay`, pumping the room in between, then drains.
async fn run_room(room: &mut RoomHarness, config: &HarnessConfig) {
    let mut ticker = tokio::time::interval(config.pump_interval);
    room.pump_all();

    for text in room.messages().to_vec() {
        for index in 0..room.len() {
            if let Err(e) = room.send(index, &text) {
                tracing::error!(index, error = %e, "send failed");
            }
        }
        pump_for(room, &mut ticker, config.chat_delay).await;
    }
    pump_for(room, &mut ticker, config.drain).await;
}

async fn pump_for(room: &mut RoomHarness, ticker: &mut tokio::time::Interval, period: Duration) {
    let deadline = tokio::time::Instant::now() + period;
    while tokio::time::Instant::now() < deadline {
        ticker.tick().await;
        room.pump_all();
    }
}

fn print_report(user: &str, summaries: &[ParticipantSummary]) {
    println!("{user}:");
    for s in summaries {
        println!(
            "  {:<24} received {:>4}  duplicates {:>4}  lost {:>4}",
            s.name, s.total_received, s.duplicates, s.lost
        );
    }
}

/// Initialize logging.
///
/// Logs go to stderr unless a file is given. Returns a [`WorkerGuard`] that
/// must be held until shutdown so buffered entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some(log_path) = file_path else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        return None;
    };

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
