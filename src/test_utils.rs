//! Shared test utilities: an in-memory feed service and payload builders.

use std::collections::HashMap;
use std::sync::Mutex;

use proptest::prelude::*;
use serde_json::json;

use crate::effects::{
    CreatedRecord, FeedEffect, FeedInterpreter, FeedResponse, Notification, PostView, ProfileView,
    ThreadNode,
};
use crate::ledger::{
    InsertOutcome, Ledger, LedgerError, LedgerRecord, Namespace, RepostRecord, SqliteLedger,
};
use crate::types::{ContentCid, ContentItem, ContentUri, Did, Handle, ReplyRef, StrongRef};

/// Handle of the bot account in tests.
pub const BOT_HANDLE: &str = "bot.bsky.social";

pub fn profile(handle: &str) -> ProfileView {
    ProfileView {
        did: Did::new(format!("did:plc:{}", handle.replace('.', "-"))),
        handle: Handle::new(handle),
        display_name: None,
    }
}

pub fn post_view(uri: &str, handle: &str, text: &str) -> PostView {
    PostView {
        uri: ContentUri::new(uri),
        cid: ContentCid::new(format!("cid-{uri}")),
        author: profile(handle),
        record: json!({ "$type": "app.bsky.feed.post", "text": text }),
        indexed_at: None,
    }
}

pub fn notification(uri: &str, handle: &str, text: &str) -> Notification {
    Notification {
        uri: ContentUri::new(uri),
        cid: ContentCid::new(format!("cid-{uri}")),
        author: profile(handle),
        reason: "reply".to_string(),
        record: json!({ "$type": "app.bsky.feed.post", "text": text }),
        is_read: false,
        indexed_at: None,
    }
}

pub fn content_item(uri: &str, handle: &str, text: &str) -> ContentItem {
    ContentItem {
        uri: ContentUri::new(uri),
        cid: ContentCid::new(format!("cid-{uri}")),
        author: Handle::new(handle),
        text: text.to_string(),
        created_at: None,
    }
}

pub fn arb_content_item() -> impl Strategy<Value = ContentItem> {
    ("[a-z0-9]{1,12}", "[a-z]{1,10}\\.bsky\\.social", ".{0,80}")
        .prop_map(|(id, handle, text)| content_item(&format!("at://x/post/{id}"), &handle, &text))
}

#[derive(Default)]
struct FakeFeedState {
    searches: HashMap<String, Vec<PostView>>,
    threads: HashMap<ContentUri, ThreadNode>,
    notifications: Vec<Notification>,
    fail_searches: bool,
    fail_reposts: bool,
    fail_posts: bool,
    effects: Vec<FeedEffect>,
    created: u64,
}

/// An in-memory feed service that records every effect it executes.
///
/// Queries answer from canned data; writes succeed (unless configured to
/// fail) and return freshly numbered records on the bot's account.
#[derive(Default)]
pub struct FakeFeed {
    state: Mutex<FakeFeedState>,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(self, query: &str, posts: Vec<PostView>) -> Self {
        self.lock().searches.insert(query.to_string(), posts);
        self
    }

    pub fn with_thread(self, uri: ContentUri, thread: ThreadNode) -> Self {
        self.lock().threads.insert(uri, thread);
        self
    }

    pub fn with_notifications(self, notifications: Vec<Notification>) -> Self {
        self.lock().notifications = notifications;
        self
    }

    pub fn failing_searches(self) -> Self {
        self.lock().fail_searches = true;
        self
    }

    pub fn failing_reposts(self) -> Self {
        self.lock().fail_reposts = true;
        self
    }

    pub fn failing_posts(self) -> Self {
        self.lock().fail_posts = true;
        self
    }

    /// Every effect received so far, in order.
    pub fn effects(&self) -> Vec<FeedEffect> {
        self.lock().effects.clone()
    }

    /// Subjects of every repost attempted.
    pub fn reposts(&self) -> Vec<StrongRef> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                FeedEffect::CreateRepost { subject } => Some(subject),
                _ => None,
            })
            .collect()
    }

    /// Text and thread placement of every post attempted.
    pub fn posts(&self) -> Vec<(String, Option<ReplyRef>)> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                FeedEffect::CreatePost { text, reply_to } => Some((text, reply_to)),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeFeedState> {
        self.state.lock().unwrap()
    }
}

impl FeedInterpreter for FakeFeed {
    type Error = String;

    async fn interpret(&self, effect: FeedEffect) -> Result<FeedResponse, Self::Error> {
        let mut state = self.lock();
        state.effects.push(effect.clone());

        match effect {
            FeedEffect::SearchPosts { query, limit } => {
                if state.fail_searches {
                    return Err(format!("search for {query:?} failed"));
                }
                let posts = state.searches.get(&query).cloned().unwrap_or_default();
                Ok(FeedResponse::Posts(
                    posts.into_iter().take(limit as usize).collect(),
                ))
            }
            FeedEffect::GetPostThread { uri } => state
                .threads
                .get(&uri)
                .cloned()
                .map(FeedResponse::Thread)
                .ok_or_else(|| format!("thread {uri} not found")),
            FeedEffect::ListNotifications { limit } => Ok(FeedResponse::Notifications(
                state
                    .notifications
                    .iter()
                    .take(limit as usize)
                    .cloned()
                    .collect(),
            )),
            FeedEffect::CreateRepost { subject } => {
                if state.fail_reposts {
                    return Err(format!("repost of {} failed", subject.uri));
                }
                state.created += 1;
                Ok(FeedResponse::Created(created(
                    "app.bsky.feed.repost",
                    state.created,
                )))
            }
            FeedEffect::CreatePost { .. } => {
                if state.fail_posts {
                    return Err("post failed".to_string());
                }
                state.created += 1;
                Ok(FeedResponse::Created(created(
                    "app.bsky.feed.post",
                    state.created,
                )))
            }
        }
    }
}

fn created(collection: &str, n: u64) -> CreatedRecord {
    CreatedRecord {
        uri: ContentUri::new(format!("at://did:plc:bot/{collection}/{n}")),
        cid: ContentCid::new(format!("bafy{n}")),
    }
}

/// A ledger whose operations can be made to fail, wrapping an in-memory one.
pub struct FlakyLedger {
    pub inner: SqliteLedger,
    /// Keys whose existence check fails.
    pub failing_lookups: Vec<ContentUri>,
    /// Makes every insert fail.
    pub failing_inserts: bool,
    /// Makes `recent_reposts` fail.
    pub failing_recent: bool,
}

impl FlakyLedger {
    pub fn new() -> Self {
        FlakyLedger {
            inner: SqliteLedger::open_in_memory().unwrap(),
            failing_lookups: Vec::new(),
            failing_inserts: false,
            failing_recent: false,
        }
    }

    fn storage_failure() -> LedgerError {
        LedgerError::Sql(rusqlite::Error::InvalidQuery)
    }
}

impl Ledger for FlakyLedger {
    fn exists(&self, namespace: Namespace, key: &ContentUri) -> Result<bool, LedgerError> {
        if self.failing_lookups.contains(key) {
            return Err(Self::storage_failure());
        }
        self.inner.exists(namespace, key)
    }

    fn insert(&self, record: &LedgerRecord) -> Result<InsertOutcome, LedgerError> {
        if self.failing_inserts {
            return Err(Self::storage_failure());
        }
        self.inner.insert(record)
    }

    fn recent_reposts(&self, limit: usize) -> Result<Vec<RepostRecord>, LedgerError> {
        if self.failing_recent {
            return Err(Self::storage_failure());
        }
        self.inner.recent_reposts(limit)
    }
}
