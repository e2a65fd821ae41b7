//! Drivers that feed a [`ChatSession`] its events and timers.
//!
//! [`pump`] is the non-blocking step used by tests and the room harness.
//! [`run`] is an async loop for a single session that sleeps until either
//! the next timer is due or an event arrives.

use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::face::Face;
use crate::face::keychain::KeyChain;
use crate::session::observer::SessionObserver;
use crate::session::{ChatSession, SessionEvent};
use crate::sync::SyncService;

/// Upper bound on one idle wait in [`run`], so a changed clock is noticed.
const MAX_IDLE: Duration = Duration::from_secs(1);

/// Fires due timers, then handles every event already queued. Returns the
/// number of timers fired plus events handled.
pub fn pump<F, S, K, O>(
    session: &mut ChatSession<F, S, K, O>,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> usize
where
    F: Face,
    S: SyncService,
    K: KeyChain,
    O: SessionObserver,
{
    let mut handled = session.fire_due_timers();
    while let Ok(event) = events.try_recv() {
        session.handle_event(event);
        handled += 1;
    }
    handled
}

/// Drives `session` until `shutdown` flips to `true` or the event channel
/// closes.
pub async fn run<F, S, K, O>(
    session: &mut ChatSession<F, S, K, O>,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
) where
    F: Face,
    S: SyncService,
    K: KeyChain,
    O: SessionObserver,
{
    tracing::info!(user = %session.identity().user_name, "session running");
    loop {
        session.fire_due_timers();
        let idle = session
            .time_until_next_timer()
            .map_or(MAX_IDLE, |d| d.min(MAX_IDLE));

        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::debug!("event channel closed");
                    break;
                };
                session.handle_event(event);
            }
            () = tokio::time::sleep(idle) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!(user = %session.identity().user_name, "session stopped");
}
