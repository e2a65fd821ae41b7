//! Roster of participants currently considered present.
//!
//! Entries keep insertion order. At most one entry exists per base screen
//! name: a delivery from a newer session of the same name replaces the old
//! entry in place.

use chronochat_proto::message::MessageType;

use super::identity::ParticipantKey;

/// Outcome of reconciling one delivery against the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    /// A new participant was appended.
    Added(ParticipantKey),
    /// An older session of the same name was replaced in place.
    Superseded {
        /// The entry that was replaced.
        old: ParticipantKey,
        /// The entry that took its place.
        new: ParticipantKey,
    },
    /// The sender (or a newer session of it) is already present.
    Unchanged,
    /// A LEAVE from a participant we do not hold; nothing to do.
    Ignored,
}

/// Insertion-ordered set of participant keys.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<ParticipantKey>,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends `key` unless it is already present. Returns `true` if added.
    pub fn add(&mut self, key: ParticipantKey) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.entries.push(key);
        true
    }

    /// Replaces `old` with `new` at the same position. Returns `false` if
    /// `old` is not present.
    pub fn supersede(&mut self, old: &ParticipantKey, new: ParticipantKey) -> bool {
        match self.entries.iter_mut().find(|k| *k == old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }

    /// Removes `key`, keeping the order of the rest. Returns `true` if removed.
    pub fn remove(&mut self, key: &ParticipantKey) -> bool {
        match self.entries.iter().position(|k| k == key) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &ParticipantKey) -> bool {
        self.entries.contains(key)
    }

    /// The entry for base name `name`, if any.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&ParticipantKey> {
        self.entries.iter().find(|k| k.name() == name)
    }

    /// Applies the membership rule for a delivery of `kind` from `sender`.
    ///
    /// - same name, lower session held: supersede in place
    /// - same name, same or higher session held: unchanged
    /// - name not held: add, except for LEAVE which is ignored
    ///
    /// Removal on LEAVE is left to the caller, which also checks the sender
    /// is not the local session.
    pub fn reconcile(&mut self, sender: &ParticipantKey, kind: MessageType) -> RosterChange {
        match self.entries.iter().position(|k| k.name() == sender.name()) {
            Some(index) if self.entries[index].session_no() < sender.session_no() => {
                let old = std::mem::replace(&mut self.entries[index], sender.clone());
                RosterChange::Superseded {
                    old,
                    new: sender.clone(),
                }
            }
            Some(_) => RosterChange::Unchanged,
            None if kind == MessageType::Leave => RosterChange::Ignored,
            None => {
                self.entries.push(sender.clone());
                RosterChange::Added(sender.clone())
            }
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in roster order.
    pub fn iter(&self) -> impl Iterator<Item = &ParticipantKey> {
        self.entries.iter()
    }

    /// Rendered keys in roster order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}
