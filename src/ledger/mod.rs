//! Durable dedup ledger.
//!
//! The ledger records every remote item the bot has acted on, in two
//! independent namespaces:
//!
//! - [`Namespace::Reposted`]: source posts that were successfully reposted
//! - [`Namespace::Replied`]: replies and notifications that got an auto-response
//!
//! A record's existence is necessary and sufficient to suppress any further
//! action on its key. Records are written once and never updated or deleted;
//! inserting an existing key is a normal outcome ([`InsertOutcome::AlreadyExists`])
//! and leaves the stored record untouched.
//!
//! Uniqueness is enforced by the storage layer, so repeated or concurrent
//! inserts of the same key can never produce two rows.

mod error;
mod sqlite;

pub use error::LedgerError;
pub use sqlite::SqliteLedger;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ContentUri, Handle};

/// The two keyed sets held by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Keyed by the URI of the reposted source post.
    Reposted,
    /// Keyed by the URI of the reply or notification that was answered.
    Replied,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Reposted => write!(f, "reposted"),
            Namespace::Replied => write!(f, "replied"),
        }
    }
}

/// Result of inserting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was new and the record was stored.
    Inserted,
    /// The key was already present; the existing record is unchanged.
    AlreadyExists,
}

/// A source post the bot has reposted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepostRecord {
    pub source_uri: ContentUri,
    pub source_author: Handle,
    /// URI of the repost record created on the bot's account.
    pub repost_uri: Option<ContentUri>,
    pub reposted_at: DateTime<Utc>,
}

/// A reply or notification the bot has answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub reply_uri: ContentUri,
    /// The post the answered item hangs off (a repost, or the item itself for notifications).
    pub parent_uri: ContentUri,
    pub author: Handle,
    pub text: String,
    pub replied_at: DateTime<Utc>,
}

/// A record destined for one of the ledger namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerRecord {
    Repost(RepostRecord),
    Reply(ReplyRecord),
}

impl LedgerRecord {
    /// The namespace this record is stored in.
    pub fn namespace(&self) -> Namespace {
        match self {
            LedgerRecord::Repost(_) => Namespace::Reposted,
            LedgerRecord::Reply(_) => Namespace::Replied,
        }
    }

    /// The unique key of this record within its namespace.
    pub fn key(&self) -> &ContentUri {
        match self {
            LedgerRecord::Repost(r) => &r.source_uri,
            LedgerRecord::Reply(r) => &r.reply_uri,
        }
    }
}

/// Key-existence and idempotent-insert interface over the durable store.
pub trait Ledger {
    /// Returns true if `key` has been recorded in `namespace`.
    fn exists(&self, namespace: Namespace, key: &ContentUri) -> Result<bool, LedgerError>;

    /// Stores `record` unless its key is already present (first writer wins).
    fn insert(&self, record: &LedgerRecord) -> Result<InsertOutcome, LedgerError>;

    /// Returns up to `limit` repost records, most recent first.
    fn recent_reposts(&self, limit: usize) -> Result<Vec<RepostRecord>, LedgerError>;

    fn insert_repost(&self, record: RepostRecord) -> Result<InsertOutcome, LedgerError> {
        self.insert(&LedgerRecord::Repost(record))
    }

    fn insert_reply(&self, record: ReplyRecord) -> Result<InsertOutcome, LedgerError> {
        self.insert(&LedgerRecord::Reply(record))
    }
}
