//! Request and reply packets.
//!
//! An [`Interest`] asks for the content stored under a name; a [`Data`]
//! packet answers it with content and a signature. Signing itself belongs
//! to the key chain in the session crate; these are plain values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::name::Name;

/// Lifetime given to interests that do not set one explicitly.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_millis(4000);

/// A named request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interest {
    /// The name being requested.
    pub name: Name,
    /// How long the request stays pending before it times out.
    pub lifetime: Duration,
}

impl Interest {
    /// Creates an interest with [`DEFAULT_INTEREST_LIFETIME`].
    #[must_use]
    pub const fn new(name: Name) -> Self {
        Self {
            name,
            lifetime: DEFAULT_INTEREST_LIFETIME,
        }
    }

    /// Overrides the lifetime.
    #[must_use]
    pub const fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Returns `true` if `data` answers this interest.
    #[must_use]
    pub fn matches(&self, data: &Data) -> bool {
        self.name.is_prefix_of(&data.name)
    }
}

/// A named, signed reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    /// The name the content is published under.
    pub name: Name,
    /// Opaque content bytes.
    pub content: Vec<u8>,
    /// Signature bytes; empty until signed.
    pub signature: Vec<u8>,
}

impl Data {
    /// Creates an unsigned data packet.
    #[must_use]
    pub const fn new(name: Name, content: Vec<u8>) -> Self {
        Self {
            name,
            content,
            signature: Vec::new(),
        }
    }

    /// Returns `true` once a signature has been attached.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}
