//! Newtype wrappers for remote identifiers.
//!
//! These types prevent accidental mixing of different identifiers (e.g., passing a
//! content CID where a record URI is expected) and make signatures self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The stable identity of a remote record (an `at://` URI).
///
/// A URI survives edits of the record it names, which makes it the dedup key
/// for everything the bot does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentUri(pub String);

impl ContentUri {
    pub fn new(s: impl Into<String>) -> Self {
        ContentUri(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContentUri {
    fn from(s: String) -> Self {
        ContentUri(s)
    }
}

impl From<&str> for ContentUri {
    fn from(s: &str) -> Self {
        ContentUri(s.to_string())
    }
}

/// The content hash (CID) of one specific version of a record.
///
/// Write APIs reference content by `(uri, cid)` so that a repost or reply
/// targets exactly the version the bot looked at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentCid(pub String);

impl ContentCid {
    pub fn new(s: impl Into<String>) -> Self {
        ContentCid(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentCid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContentCid {
    fn from(s: String) -> Self {
        ContentCid(s)
    }
}

impl From<&str> for ContentCid {
    fn from(s: &str) -> Self {
        ContentCid(s.to_string())
    }
}

/// An account handle, e.g. `alice.bsky.social`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(pub String);

impl Handle {
    pub fn new(s: impl Into<String>) -> Self {
        Handle(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<String> for Handle {
    fn from(s: String) -> Self {
        Handle(s)
    }
}

impl From<&str> for Handle {
    fn from(s: &str) -> Self {
        Handle(s.to_string())
    }
}

/// A decentralized identifier (`did:plc:...`) naming the bot's repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(pub String);

impl Did {
    pub fn new(s: impl Into<String>) -> Self {
        Did(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
