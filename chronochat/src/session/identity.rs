//! Session identity and participant keys.
//!
//! A participant is identified by its screen name plus the session number
//! of the process that published it, concatenated into a single key
//! (`alice1700000000`). Session numbers are rendered with a fixed width of
//! [`SESSION_DIGITS`] so a key can be split back unambiguously.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;

use chronochat_proto::message::millis_to_secs;
use chronochat_proto::name::Name;

/// Width of the decimal session number at the end of a participant key.
pub const SESSION_DIGITS: usize = 10;

/// Largest session number that fits in [`SESSION_DIGITS`] digits. Peers
/// announcing a larger one are rejected as malformed.
pub const MAX_SESSION_NO: u64 = 9_999_999_999;

/// Length of the random token that makes each session's prefix unique.
pub const PREFIX_TOKEN_LEN: usize = 10;

/// A roster member: base screen name plus session number.
///
/// Keys render and parse unambiguously only while the session number is at
/// most [`MAX_SESSION_NO`]; a wider number renders with extra digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantKey {
    name: String,
    session_no: u64,
}

impl ParticipantKey {
    /// Creates a key.
    pub fn new(name: impl Into<String>, session_no: u64) -> Self {
        Self {
            name: name.into(),
            session_no,
        }
    }

    /// Splits a rendered key into name and session number.
    ///
    /// Returns `None` if the key is not longer than [`SESSION_DIGITS`] or
    /// its trailing digits are not a decimal number.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let split = key.len().checked_sub(SESSION_DIGITS)?;
        if split == 0 || !key.is_char_boundary(split) {
            return None;
        }
        let (name, digits) = key.split_at(split);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(name, digits.parse().ok()?))
    }

    /// Base screen name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session number.
    #[must_use]
    pub const fn session_no(&self) -> u64 {
        self.session_no
    }
}

impl fmt::Display for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:0width$}",
            self.name,
            self.session_no,
            width = SESSION_DIGITS
        )
    }
}

/// Immutable identity of the local session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Human-readable screen name.
    pub screen_name: String,
    /// Chat room name.
    pub chat_room: String,
    /// `hub_prefix/chat_room/<token>`, the prefix our content is served under.
    pub chat_prefix: Name,
    /// Session start time in seconds, distinguishing restarts.
    pub session_no: u64,
    /// `screen_name ‖ session_no`.
    pub user_name: String,
}

impl SessionIdentity {
    /// Creates an identity with a fresh random prefix token, taking the
    /// session number from `now_ms`.
    #[must_use]
    pub fn new(screen_name: &str, chat_room: &str, hub_prefix: &Name, now_ms: u64) -> Self {
        Self::with_token(
            screen_name,
            chat_room,
            hub_prefix,
            &random_token(PREFIX_TOKEN_LEN),
            millis_to_secs(now_ms),
        )
    }

    /// Creates an identity with an explicit prefix token and session number.
    #[must_use]
    pub fn with_token(
        screen_name: &str,
        chat_room: &str,
        hub_prefix: &Name,
        token: &str,
        session_no: u64,
    ) -> Self {
        let chat_prefix = hub_prefix.clone().append(chat_room).append(token);
        let user_name = ParticipantKey::new(screen_name, session_no).to_string();
        Self {
            screen_name: screen_name.to_string(),
            chat_room: chat_room.to_string(),
            chat_prefix,
            session_no,
            user_name,
        }
    }

    /// This session's roster key.
    #[must_use]
    pub fn key(&self) -> ParticipantKey {
        ParticipantKey::new(&self.screen_name, self.session_no)
    }
}

/// Generates `len` random alphanumeric characters.
#[must_use]
pub fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
