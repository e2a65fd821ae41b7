//! Hierarchical names for named-data requests and replies.
//!
//! A [`Name`] is an ordered list of components rendered as a URI
//! (`/hub/room/token/1700000000/3`). Components are stored unescaped;
//! bytes outside the URI unreserved set are percent-escaped on display.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a name URI cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// A `%` was not followed by two hex digits.
    #[error("invalid percent-escape in component {0:?}")]
    InvalidEscape(String),
    /// The unescaped component bytes are not valid UTF-8.
    #[error("component {0:?} does not decode to UTF-8")]
    InvalidUtf8(String),
}

/// An ordered list of name components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name {
    components: Vec<String>,
}

impl Name {
    /// Creates the empty name (`/`).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses a name from its URI form.
    ///
    /// The leading slash and an `ndn:` scheme are optional and empty
    /// components are skipped, so `"/a//b/"` parses as `/a/b`.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if a component has a malformed percent-escape
    /// or does not decode to UTF-8.
    pub fn from_uri(uri: &str) -> Result<Self, NameError> {
        let uri = uri.strip_prefix("ndn:").unwrap_or(uri);
        let components = uri
            .split('/')
            .filter(|c| !c.is_empty())
            .map(unescape)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }

    /// Returns this name with one more component appended.
    #[must_use]
    pub fn append(mut self, component: impl Into<String>) -> Self {
        self.push(component);
        self
    }

    /// Appends a component in place.
    pub fn push(&mut self, component: impl Into<String>) {
        self.components.push(component.into());
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` for the empty name.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns the component at `index`; negative indices count from the end.
    #[must_use]
    pub fn get(&self, index: isize) -> Option<&str> {
        let idx = if index < 0 {
            self.components.len().checked_sub(index.unsigned_abs())?
        } else {
            usize::try_from(index).ok()?
        };
        self.components.get(idx).map(String::as_str)
    }

    /// Returns the first `len` components. A negative `len` drops that many
    /// components from the end instead.
    #[must_use]
    pub fn prefix(&self, len: isize) -> Self {
        let count = if len < 0 {
            self.components.len().saturating_sub(len.unsigned_abs())
        } else {
            usize::try_from(len)
                .unwrap_or(usize::MAX)
                .min(self.components.len())
        };
        Self {
            components: self.components[..count].to_vec(),
        }
    }

    /// Returns `true` if every component of `self` leads `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.components.starts_with(&self.components)
    }

    /// Borrow the raw (unescaped) components.
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Renders the escaped URI form.
    #[must_use]
    pub fn to_uri(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", escape(component))?;
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s)
    }
}

const fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for byte in component.bytes() {
        if is_unreserved(byte) {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn unescape(component: &str) -> Result<String, NameError> {
    let raw = component.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = raw
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| NameError::InvalidEscape(component.to_string()))?;
            bytes.push(hex);
            i += 3;
        } else {
            bytes.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8(bytes).map_err(|_| NameError::InvalidUtf8(component.to_string()))
}
