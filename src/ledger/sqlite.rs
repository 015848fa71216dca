//! SQLite-backed ledger.
//!
//! The schema is compatible with databases written by earlier versions of the
//! bot: the same table and column names, and timestamps in SQLite's
//! `CURRENT_TIMESTAMP` text format (with optional fractional seconds).

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use super::{
    InsertOutcome, Ledger, LedgerError, LedgerRecord, Namespace, ReplyRecord, RepostRecord,
};
use crate::types::{ContentUri, Handle};

const REPOSTS_TABLE: &str = "reposted_posts";
const REPLIES_TABLE: &str = "processed_replies";

/// Stored timestamp format; sorts lexicographically in time order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Durable ledger stored in a single SQLite file.
#[derive(Debug)]
pub struct SqliteLedger {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteLedger {
    /// Opens (creating if needed) the ledger database at `path`.
    ///
    /// Schema installation is idempotent and runs on every open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        install_schema(&conn)?;
        debug!(path = %path.display(), "Opened ledger");

        Ok(SqliteLedger {
            conn,
            path: Some(path),
        })
    }

    /// Opens a ledger that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        install_schema(&conn)?;
        Ok(SqliteLedger { conn, path: None })
    }

    /// The database file, or `None` for an in-memory ledger.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Fetches the repost record for `source_uri`, if any.
    pub fn get_repost(&self, source_uri: &ContentUri) -> Result<Option<RepostRecord>, LedgerError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT original_uri, original_author, repost_uri, reposted_at \
             FROM reposted_posts WHERE original_uri = ?1",
        )?;
        let raw = stmt
            .query_row(params![source_uri.as_str()], RawRepost::from_row)
            .optional()?;
        raw.map(RawRepost::into_record).transpose()
    }

    /// Fetches the reply record for `reply_uri`, if any.
    pub fn get_reply(&self, reply_uri: &ContentUri) -> Result<Option<ReplyRecord>, LedgerError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT reply_uri, parent_post_uri, author, content, replied_at \
             FROM processed_replies WHERE reply_uri = ?1",
        )?;
        let raw = stmt
            .query_row(params![reply_uri.as_str()], RawReply::from_row)
            .optional()?;
        raw.map(RawReply::into_record).transpose()
    }

    /// Number of records in `namespace`.
    pub fn count(&self, namespace: Namespace) -> Result<u64, LedgerError> {
        let sql = match namespace {
            Namespace::Reposted => "SELECT COUNT(1) FROM reposted_posts",
            Namespace::Replied => "SELECT COUNT(1) FROM processed_replies",
        };
        let count = self.conn.query_row(sql, [], |row| row.get::<_, i64>(0))?;
        Ok(count.max(0) as u64)
    }
}

impl Ledger for SqliteLedger {
    fn exists(&self, namespace: Namespace, key: &ContentUri) -> Result<bool, LedgerError> {
        let sql = match namespace {
            Namespace::Reposted => "SELECT 1 FROM reposted_posts WHERE original_uri = ?1",
            Namespace::Replied => "SELECT 1 FROM processed_replies WHERE reply_uri = ?1",
        };
        let mut stmt = self.conn.prepare_cached(sql)?;
        Ok(stmt.exists(params![key.as_str()])?)
    }

    fn insert(&self, record: &LedgerRecord) -> Result<InsertOutcome, LedgerError> {
        let changed = match record {
            LedgerRecord::Repost(r) => self.conn.execute(
                "INSERT OR IGNORE INTO reposted_posts \
                 (original_uri, original_author, repost_uri, reposted_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    r.source_uri.as_str(),
                    r.source_author.as_str(),
                    r.repost_uri.as_ref().map(ContentUri::as_str),
                    format_timestamp(&r.reposted_at),
                ],
            )?,
            LedgerRecord::Reply(r) => self.conn.execute(
                "INSERT OR IGNORE INTO processed_replies \
                 (reply_uri, parent_post_uri, author, content, replied_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    r.reply_uri.as_str(),
                    r.parent_uri.as_str(),
                    r.author.as_str(),
                    r.text,
                    format_timestamp(&r.replied_at),
                ],
            )?,
        };

        let outcome = if changed == 0 {
            InsertOutcome::AlreadyExists
        } else {
            InsertOutcome::Inserted
        };
        debug!(
            namespace = %record.namespace(),
            key = %record.key(),
            ?outcome,
            "Ledger insert"
        );
        Ok(outcome)
    }

    fn recent_reposts(&self, limit: usize) -> Result<Vec<RepostRecord>, LedgerError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare_cached(
            "SELECT original_uri, original_author, repost_uri, reposted_at \
             FROM reposted_posts ORDER BY reposted_at DESC, id DESC LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![limit])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(RawRepost::from_row(row)?.into_record()?);
        }
        Ok(out)
    }
}

fn install_schema(conn: &Connection) -> Result<(), LedgerError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS reposted_posts (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          original_uri TEXT UNIQUE NOT NULL,
          original_author TEXT NOT NULL,
          repost_uri TEXT,
          reposted_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS processed_replies (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          reply_uri TEXT UNIQUE NOT NULL,
          parent_post_uri TEXT NOT NULL,
          author TEXT NOT NULL,
          content TEXT,
          replied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )?;
    Ok(())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(table: &'static str, raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::corrupt(table, format!("bad timestamp {raw:?}: {e}")))
}

struct RawRepost {
    source_uri: String,
    source_author: String,
    repost_uri: Option<String>,
    reposted_at: Option<String>,
}

impl RawRepost {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawRepost {
            source_uri: row.get(0)?,
            source_author: row.get(1)?,
            repost_uri: row.get(2)?,
            reposted_at: row.get(3)?,
        })
    }

    fn into_record(self) -> Result<RepostRecord, LedgerError> {
        let reposted_at = match self.reposted_at.as_deref() {
            Some(raw) => parse_timestamp(REPOSTS_TABLE, raw)?,
            None => return Err(LedgerError::corrupt(REPOSTS_TABLE, "missing reposted_at")),
        };
        Ok(RepostRecord {
            source_uri: ContentUri::new(self.source_uri),
            source_author: Handle::new(self.source_author),
            repost_uri: self.repost_uri.map(ContentUri::new),
            reposted_at,
        })
    }
}

struct RawReply {
    reply_uri: String,
    parent_uri: String,
    author: String,
    text: Option<String>,
    replied_at: Option<String>,
}

impl RawReply {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawReply {
            reply_uri: row.get(0)?,
            parent_uri: row.get(1)?,
            author: row.get(2)?,
            text: row.get(3)?,
            replied_at: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<ReplyRecord, LedgerError> {
        let replied_at = match self.replied_at.as_deref() {
            Some(raw) => parse_timestamp(REPLIES_TABLE, raw)?,
            None => return Err(LedgerError::corrupt(REPLIES_TABLE, "missing replied_at")),
        };
        Ok(ReplyRecord {
            reply_uri: ContentUri::new(self.reply_uri),
            parent_uri: ContentUri::new(self.parent_uri),
            author: Handle::new(self.author),
            text: self.text.unwrap_or_default(),
            replied_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn repost(uri: &str, author: &str, at_secs: i64) -> RepostRecord {
        RepostRecord {
            source_uri: ContentUri::new(uri),
            source_author: Handle::new(author),
            repost_uri: Some(ContentUri::new(format!("{uri}/repost"))),
            reposted_at: Utc.timestamp_opt(at_secs, 0).unwrap(),
        }
    }

    fn reply(uri: &str, parent: &str) -> ReplyRecord {
        ReplyRecord {
            reply_uri: ContentUri::new(uri),
            parent_uri: ContentUri::new(parent),
            author: Handle::new("bob.bsky.social"),
            text: "thanks!".to_string(),
            replied_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn insert_then_exists() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let uri = ContentUri::new("at://a/post/1");

        assert!(!ledger.exists(Namespace::Reposted, &uri).unwrap());
        let outcome = ledger
            .insert(&LedgerRecord::Repost(repost("at://a/post/1", "alice", 10)))
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert!(ledger.exists(Namespace::Reposted, &uri).unwrap());
    }

    #[test]
    fn namespaces_are_independent() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger
            .insert(&LedgerRecord::Repost(repost("at://a/post/1", "alice", 10)))
            .unwrap();

        let uri = ContentUri::new("at://a/post/1");
        assert!(ledger.exists(Namespace::Reposted, &uri).unwrap());
        assert!(!ledger.exists(Namespace::Replied, &uri).unwrap());
    }

    #[test]
    fn duplicate_repost_keeps_first_record() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let first = repost("at://a/post/1", "alice", 10);
        let mut second = repost("at://a/post/1", "mallory", 20);
        second.repost_uri = None;

        assert_eq!(
            ledger.insert(&LedgerRecord::Repost(first.clone())).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            ledger.insert(&LedgerRecord::Repost(second)).unwrap(),
            InsertOutcome::AlreadyExists
        );

        let stored = ledger.get_repost(&first.source_uri).unwrap().unwrap();
        assert_eq!(stored, first);
        assert_eq!(ledger.count(Namespace::Reposted).unwrap(), 1);
    }

    #[test]
    fn duplicate_reply_keeps_first_record() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let first = reply("at://b/post/9", "at://me/repost/1");
        let mut second = first.clone();
        second.text = "something else".to_string();

        assert_eq!(
            ledger.insert(&LedgerRecord::Reply(first.clone())).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            ledger.insert(&LedgerRecord::Reply(second)).unwrap(),
            InsertOutcome::AlreadyExists
        );
        assert_eq!(ledger.get_reply(&first.reply_uri).unwrap().unwrap(), first);
    }

    #[test]
    fn recent_reposts_are_newest_first_and_limited() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        for (i, at) in [(1, 100), (2, 300), (3, 200)] {
            ledger
                .insert(&LedgerRecord::Repost(repost(
                    &format!("at://a/post/{i}"),
                    "alice",
                    at,
                )))
                .unwrap();
        }

        let recent = ledger.recent_reposts(2).unwrap();
        let uris: Vec<_> = recent.iter().map(|r| r.source_uri.as_str()).collect();
        assert_eq!(uris, vec!["at://a/post/2", "at://a/post/3"]);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("posts.db");

        {
            let ledger = SqliteLedger::open(&path).unwrap();
            ledger
                .insert(&LedgerRecord::Repost(repost("at://a/post/1", "alice", 10)))
                .unwrap();
            ledger
                .insert(&LedgerRecord::Reply(reply("at://b/post/2", "at://a/post/1")))
                .unwrap();
        }

        let reopened = SqliteLedger::open(&path).unwrap();
        assert_eq!(reopened.path(), Some(path.as_path()));
        assert!(
            reopened
                .exists(Namespace::Reposted, &ContentUri::new("at://a/post/1"))
                .unwrap()
        );
        assert!(
            reopened
                .exists(Namespace::Replied, &ContentUri::new("at://b/post/2"))
                .unwrap()
        );
    }

    #[test]
    fn schema_install_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("posts.db");
        SqliteLedger::open(&path).unwrap();
        SqliteLedger::open(&path).unwrap();
        let ledger = SqliteLedger::open(&path).unwrap();
        assert_eq!(ledger.count(Namespace::Reposted).unwrap(), 0);
    }

    #[test]
    fn reads_rows_with_default_sqlite_timestamps() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger
            .conn
            .execute(
                "INSERT INTO reposted_posts (original_uri, original_author, repost_uri) \
                 VALUES ('at://legacy/1', 'carol', NULL)",
                [],
            )
            .unwrap();

        let recent = ledger.recent_reposts(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].source_author, Handle::new("carol"));
        assert_eq!(recent[0].repost_uri, None);
    }

    #[test]
    fn timestamp_format_roundtrips_with_micros() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let parsed = parse_timestamp(REPOSTS_TABLE, &format_timestamp(&ts)).unwrap();
        assert_eq!(parsed, ts);
    }

    proptest! {
        #[test]
        fn repeated_inserts_store_one_row(
            uri in "at://[a-z]{1,8}/post/[0-9]{1,4}",
            repeats in 1usize..6,
        ) {
            let ledger = SqliteLedger::open_in_memory().unwrap();
            let mut outcomes = Vec::new();
            for i in 0..repeats {
                let record = repost(&uri, &format!("author{i}"), i as i64);
                outcomes.push(ledger.insert(&LedgerRecord::Repost(record)).unwrap());
            }

            prop_assert_eq!(outcomes[0], InsertOutcome::Inserted);
            prop_assert!(outcomes[1..].iter().all(|o| *o == InsertOutcome::AlreadyExists));
            prop_assert_eq!(ledger.count(Namespace::Reposted).unwrap(), 1);
            let stored = ledger.get_repost(&ContentUri::new(&uri)).unwrap().unwrap();
            prop_assert_eq!(stored.source_author, Handle::new("author0"));
        }
    }
}
