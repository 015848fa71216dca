//! The canonical content record shared by every pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ContentCid, ContentUri, Handle};

/// A reference to one exact version of a remote record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrongRef {
    pub uri: ContentUri,
    pub cid: ContentCid,
}

impl StrongRef {
    pub fn new(uri: ContentUri, cid: ContentCid) -> Self {
        StrongRef { uri, cid }
    }
}

/// Thread placement for a new post: the record replied to and the thread root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplyRef {
    pub parent: StrongRef,
    pub root: StrongRef,
}

impl ReplyRef {
    /// A reply whose parent is also treated as the thread root.
    pub fn to_item(target: &ContentItem) -> Self {
        let strong = target.strong_ref();
        ReplyRef {
            parent: strong.clone(),
            root: strong,
        }
    }
}

/// A normalized post, thread reply or notification.
///
/// Only the content source adapter builds these; downstream code never looks
/// at raw remote payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Stable identity of the record.
    pub uri: ContentUri,
    /// Version of the record this item was read at.
    pub cid: ContentCid,
    /// Handle of the author.
    pub author: Handle,
    /// Post text; empty when the record carried none.
    pub text: String,
    /// Author-supplied creation time, if present and parseable.
    pub created_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    pub fn strong_ref(&self) -> StrongRef {
        StrongRef::new(self.uri.clone(), self.cid.clone())
    }

    /// Returns the first `max_chars` characters of the text, for log lines.
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}
