//! Named-data transport abstraction.
//!
//! Defines the [`Face`] trait the session uses to express requests, answer
//! requests for its own prefix, and register that prefix. All calls are
//! fire-and-forget: results come back later as [`FaceEvent`]s delivered by
//! whatever pumps the transport.
//!
//! Implementations:
//! - [`crate::loopback::MemoryFace`] - in-process network for tests and the harness

pub mod keychain;

use chronochat_proto::name::Name;
use chronochat_proto::packet::{Data, Interest};

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum FaceError {
    /// The face is no longer connected to the network.
    #[error("face is closed")]
    Closed,

    /// The request could not be sent.
    #[error("failed to express interest for {0}")]
    ExpressFailed(Name),

    /// The prefix could not be registered.
    #[error("failed to register prefix {0}")]
    RegisterFailed(Name),
}

/// Asynchronous outcome of an earlier [`Face`] call, or an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceEvent {
    /// A peer is requesting content under our registered prefix.
    Interest(Interest),
    /// A reply arrived for an interest we expressed.
    Data {
        /// The interest being answered.
        interest: Interest,
        /// The signed reply.
        data: Data,
    },
    /// An interest we expressed expired without a reply.
    Timeout(Interest),
    /// Prefix registration was rejected by the network.
    RegisterFailed(Name),
}

/// Named request/reply transport.
///
/// Calls never block. Successful return only means the operation was
/// handed to the network; replies and timeouts are reported as
/// [`FaceEvent`]s.
pub trait Face {
    /// Send a request; a `Data` or `Timeout` event follows later.
    ///
    /// # Errors
    ///
    /// Returns [`FaceError`] if the request could not be handed off.
    fn express_interest(&mut self, interest: Interest) -> Result<(), FaceError>;

    /// Start receiving `Interest` events for names under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`FaceError`] if registration could not be attempted.
    fn register_prefix(&mut self, prefix: &Name) -> Result<(), FaceError>;

    /// Publish a signed reply to a pending request.
    ///
    /// # Errors
    ///
    /// Returns [`FaceError`] if the reply could not be handed off.
    fn put_data(&mut self, data: Data) -> Result<(), FaceError>;
}
