//! Content source adapter.
//!
//! Fetches candidates from the feed service and normalizes the three raw
//! payload shapes (search hits, thread replies, notifications) into
//! [`ContentItem`]s. Nothing downstream of this module inspects raw payloads.
//!
//! # Failure Semantics
//!
//! A failed fetch is never fatal: the error is logged and the fetch yields no
//! items, so a failing search simply contributes zero candidates to the cycle.
//! Missing optional record fields normalize to empty text and no timestamp.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::effects::{FeedEffect, FeedInterpreter, FeedResponse, Notification, PostView, ThreadNode};
use crate::types::{ContentItem, ContentUri};

/// Results requested per search query unless configured otherwise.
pub const DEFAULT_SEARCH_LIMIT: u32 = 25;

/// Notifications fetched per cycle unless configured otherwise.
pub const DEFAULT_NOTIFICATION_LIMIT: u32 = 50;

/// Read-only view of the feed service yielding canonical content items.
pub struct ContentSource<'a, F> {
    feed: &'a F,
}

impl<'a, F> ContentSource<'a, F>
where
    F: FeedInterpreter,
    F::Error: fmt::Display,
{
    pub fn new(feed: &'a F) -> Self {
        ContentSource { feed }
    }

    /// Posts matching `query`, in the order the service ranked them.
    pub async fn search(&self, query: &str, limit: u32) -> Vec<ContentItem> {
        let effect = FeedEffect::SearchPosts {
            query: query.to_string(),
            limit,
        };
        match self.fetch(effect).await {
            Some(FeedResponse::Posts(posts)) => {
                debug!(query, found = posts.len(), "Search returned posts");
                posts.iter().map(normalize_post).collect()
            }
            Some(other) => unexpected("posts", &other),
            None => Vec::new(),
        }
    }

    /// Direct replies to `parent`; deeper replies and unavailable posts are skipped.
    pub async fn thread_replies(&self, parent: &ContentUri) -> Vec<ContentItem> {
        let effect = FeedEffect::GetPostThread {
            uri: parent.clone(),
        };
        match self.fetch(effect).await {
            Some(FeedResponse::Thread(ThreadNode::Post(thread))) => thread
                .replies
                .iter()
                .filter_map(|node| match node {
                    ThreadNode::Post(reply) => Some(normalize_post(&reply.post)),
                    ThreadNode::Unavailable => None,
                })
                .collect(),
            Some(FeedResponse::Thread(ThreadNode::Unavailable)) => {
                debug!(uri = %parent, "Thread root is unavailable");
                Vec::new()
            }
            Some(other) => unexpected("thread", &other),
            None => Vec::new(),
        }
    }

    /// Recent notifications with reason `reply`; all other reasons are dropped.
    pub async fn notifications(&self, limit: u32) -> Vec<ContentItem> {
        match self.fetch(FeedEffect::ListNotifications { limit }).await {
            Some(FeedResponse::Notifications(notifications)) => notifications
                .iter()
                .filter(|n| n.is_reply())
                .map(normalize_notification)
                .collect(),
            Some(other) => unexpected("notifications", &other),
            None => Vec::new(),
        }
    }

    async fn fetch(&self, effect: FeedEffect) -> Option<FeedResponse> {
        let name = effect.name();
        match self.feed.interpret(effect).await {
            Ok(response) => Some(response),
            Err(e) => {
                error!(effect = name, error = %e, "Fetch failed");
                None
            }
        }
    }
}

fn unexpected(expected: &'static str, got: &FeedResponse) -> Vec<ContentItem> {
    warn!(expected, got = got.name(), "Unexpected response shape");
    Vec::new()
}

/// Normalizes a search hit or thread reply.
pub fn normalize_post(post: &PostView) -> ContentItem {
    ContentItem {
        uri: post.uri.clone(),
        cid: post.cid.clone(),
        author: post.author.handle.clone(),
        text: record_text(&post.record),
        created_at: record_created_at(&post.record),
    }
}

/// Normalizes a notification; the item refers to the record that triggered it.
pub fn normalize_notification(notification: &Notification) -> ContentItem {
    ContentItem {
        uri: notification.uri.clone(),
        cid: notification.cid.clone(),
        author: notification.author.handle.clone(),
        text: record_text(&notification.record),
        created_at: record_created_at(&notification.record),
    }
}

fn record_text(record: &serde_json::Value) -> String {
    record
        .get("text")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn record_created_at(record: &serde_json::Value) -> Option<DateTime<Utc>> {
    let raw = record.get("createdAt")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
