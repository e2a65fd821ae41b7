//! In-memory network for testing.
//!
//! [`MemoryNetwork`] simulates both collaborators a session needs: a
//! named-data transport that routes interests to whichever node registered
//! a covering prefix, and a sync group that tracks each node's sequence
//! counter and tells the other members when it changes. Nodes join via
//! [`MemoryNetwork::join`], which hands back a [`MemoryEndpoint`] holding
//! the node's [`MemoryFace`], [`MemorySync`] and event receiver.
//!
//! Nothing is delivered synchronously: every outcome is queued on the
//! receiving node's channel, so the caller decides when each node runs.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use chronochat_proto::name::Name;
use chronochat_proto::packet::{Data, Interest};

use crate::clock::{Clock, duration_millis};
use crate::face::keychain::verify_digest;
use crate::face::{Face, FaceError, FaceEvent};
use crate::session::SessionEvent;
use crate::sync::{SyncError, SyncEvent, SyncService, SyncStateUpdate};

/// Identifies a node within one [`MemoryNetwork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

struct Node {
    group: String,
    data_prefix: String,
    session_no: u64,
    sequence_no: u64,
    registered: Vec<Name>,
    tx: mpsc::UnboundedSender<SessionEvent>,
    connected: bool,
    fail_publish: bool,
    fail_express: bool,
}

impl Node {
    fn update(&self) -> SyncStateUpdate {
        SyncStateUpdate::new(&self.data_prefix, self.session_no, self.sequence_no)
    }

    fn deliver(&self, event: impl Into<SessionEvent>) {
        if !self.connected {
            return;
        }
        if self.tx.send(event.into()).is_err() {
            tracing::debug!(prefix = %self.data_prefix, "event receiver dropped");
        }
    }
}

struct PendingInterest {
    requester: NodeId,
    interest: Interest,
    expires_at: u64,
}

#[derive(Default)]
struct NetworkState {
    nodes: Vec<Node>,
    pending: Vec<PendingInterest>,
}

impl NetworkState {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Sends `update` to every other member of `from`'s group.
    fn announce(&self, from: NodeId, update: &SyncStateUpdate) {
        let Some(origin) = self.node(from) else {
            return;
        };
        for (index, node) in self.nodes.iter().enumerate() {
            if index == from.0 || node.group != origin.group {
                continue;
            }
            node.deliver(SyncEvent::State {
                updates: vec![update.clone()],
                is_recovery: false,
            });
        }
    }
}

/// Shared in-process network. Cloning yields another handle to the same
/// network.
#[derive(Clone)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
    clock: Arc<dyn Clock>,
}

/// Everything a session needs to run on a [`MemoryNetwork`].
pub struct MemoryEndpoint {
    /// The node's id, for failure injection.
    pub node: NodeId,
    /// Transport handle.
    pub face: MemoryFace,
    /// Sync handle.
    pub sync: MemorySync,
    /// Events addressed to this node.
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl MemoryNetwork {
    /// Creates an empty network whose interest lifetimes are measured on
    /// `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(NetworkState::default())),
            clock,
        }
    }

    /// Adds a producer to the sync group named `broadcast_prefix`.
    ///
    /// The node starts at sequence number 0. It is sent `Initialized`
    /// followed by a recovery batch listing the group's other producers,
    /// and every other member is told about it.
    pub fn join(
        &self,
        chat_prefix: &Name,
        session_no: u64,
        broadcast_prefix: &str,
    ) -> MemoryEndpoint {
        let (tx, events) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let node = NodeId(state.nodes.len());
        state.nodes.push(Node {
            group: broadcast_prefix.to_string(),
            data_prefix: chat_prefix.to_uri(),
            session_no,
            sequence_no: 0,
            registered: Vec::new(),
            tx,
            connected: true,
            fail_publish: false,
            fail_express: false,
        });

        let peers: Vec<SyncStateUpdate> = state
            .nodes
            .iter()
            .enumerate()
            .filter(|(index, n)| *index != node.0 && n.group == broadcast_prefix)
            .map(|(_, n)| n.update())
            .collect();
        if let Some(joined) = state.node(node) {
            joined.deliver(SyncEvent::Initialized);
            if !peers.is_empty() {
                joined.deliver(SyncEvent::State {
                    updates: peers,
                    is_recovery: true,
                });
            }
            let update = joined.update();
            state.announce(node, &update);
        }
        drop(state);

        tracing::debug!(%node, prefix = %chat_prefix, session_no, "node joined");
        MemoryEndpoint {
            node,
            face: MemoryFace {
                network: self.clone(),
                node,
            },
            sync: MemorySync {
                network: self.clone(),
                node,
            },
            events,
        }
    }

    /// Cuts `node` off: nothing is routed to or from it any more. Its last
    /// published sequence number stays known to the group.
    pub fn disconnect(&self, node: NodeId) {
        let mut state = self.state.lock();
        if let Some(n) = state.node_mut(node) {
            n.connected = false;
        }
        state.pending.retain(|p| p.requester != node);
        tracing::debug!(%node, "node disconnected");
    }

    /// Makes `node`'s sequence advances fail.
    pub fn set_fail_publish(&self, node: NodeId, fail: bool) {
        if let Some(n) = self.state.lock().node_mut(node) {
            n.fail_publish = fail;
        }
    }

    /// Makes `node`'s interests fail to send.
    pub fn set_fail_express(&self, node: NodeId, fail: bool) {
        if let Some(n) = self.state.lock().node_mut(node) {
            n.fail_express = fail;
        }
    }

    /// Times out every pending interest whose lifetime has elapsed.
    /// Returns how many expired.
    pub fn expire_interests(&self) -> usize {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        let (expired, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
            .into_iter()
            .partition(|p| p.expires_at <= now);
        state.pending = pending;
        for p in &expired {
            if let Some(node) = state.node(p.requester) {
                node.deliver(FaceEvent::Timeout(p.interest.clone()));
            }
        }
        expired.len()
    }

    /// Number of interests awaiting a reply or timeout.
    #[must_use]
    pub fn pending_interests(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of nodes that ever joined.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    fn express(&self, from: NodeId, interest: Interest) -> Result<(), FaceError> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        let node = state.node(from).ok_or(FaceError::Closed)?;
        if !node.connected {
            return Err(FaceError::Closed);
        }
        if node.fail_express {
            return Err(FaceError::ExpressFailed(interest.name));
        }

        let target = state
            .nodes
            .iter()
            .find(|n| n.connected && n.registered.iter().any(|p| p.is_prefix_of(&interest.name)));
        match target {
            Some(n) => n.deliver(FaceEvent::Interest(interest.clone())),
            None => tracing::debug!(name = %interest.name, "no route for interest"),
        }
        state.pending.push(PendingInterest {
            requester: from,
            expires_at: now.saturating_add(duration_millis(interest.lifetime)),
            interest,
        });
        Ok(())
    }

    fn register(&self, node: NodeId, prefix: &Name) -> Result<(), FaceError> {
        let mut state = self.state.lock();
        let n = state.node_mut(node).ok_or(FaceError::Closed)?;
        if !n.connected {
            return Err(FaceError::RegisterFailed(prefix.clone()));
        }
        n.registered.push(prefix.clone());
        Ok(())
    }

    fn put(&self, from: NodeId, data: Data) -> Result<(), FaceError> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        if !state.node(from).is_some_and(|n| n.connected) {
            return Err(FaceError::Closed);
        }
        if !verify_digest(&data) {
            tracing::warn!(name = %data.name, "dropping data with invalid signature");
            return Ok(());
        }

        let (satisfied, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
            .into_iter()
            .partition(|p| p.expires_at > now && p.interest.matches(&data));
        state.pending = pending;
        for p in satisfied {
            if let Some(node) = state.node(p.requester) {
                node.deliver(FaceEvent::Data {
                    interest: p.interest,
                    data: data.clone(),
                });
            }
        }
        Ok(())
    }

    fn publish(&self, node: NodeId) -> Result<(), SyncError> {
        let mut state = self.state.lock();
        let n = state.node_mut(node).ok_or(SyncError::Unreachable)?;
        if n.fail_publish || !n.connected {
            return Err(SyncError::Unreachable);
        }
        n.sequence_no += 1;
        let update = n.update();
        state.announce(node, &update);
        Ok(())
    }

    fn sequence_no(&self, node: NodeId) -> u64 {
        self.state.lock().node(node).map_or(0, |n| n.sequence_no)
    }

    fn producer_sequence_no(&self, data_prefix: &str, session_no: u64) -> Option<u64> {
        self.state
            .lock()
            .nodes
            .iter()
            .find(|n| n.data_prefix == data_prefix && n.session_no == session_no)
            .map(|n| n.sequence_no)
    }
}

/// A node's transport handle on a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryFace {
    network: MemoryNetwork,
    node: NodeId,
}

impl Face for MemoryFace {
    fn express_interest(&mut self, interest: Interest) -> Result<(), FaceError> {
        self.network.express(self.node, interest)
    }

    fn register_prefix(&mut self, prefix: &Name) -> Result<(), FaceError> {
        self.network.register(self.node, prefix)
    }

    fn put_data(&mut self, data: Data) -> Result<(), FaceError> {
        self.network.put(self.node, data)
    }
}

/// A node's sync handle on a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemorySync {
    network: MemoryNetwork,
    node: NodeId,
}

impl SyncService for MemorySync {
    fn publish_next_sequence_no(&mut self) -> Result<(), SyncError> {
        self.network.publish(self.node)
    }

    fn sequence_no(&self) -> u64 {
        self.network.sequence_no(self.node)
    }

    fn producer_sequence_no(&self, data_prefix: &str, session_no: u64) -> Option<u64> {
        self.network.producer_sequence_no(data_prefix, session_no)
    }
}
