//! Action dispatcher.
//!
//! Performs the two outward actions of the bot, a repost and a reply, and
//! records each successful one in the dedup ledger.
//!
//! # Ordering
//!
//! The remote write always happens before the ledger write. A remote failure
//! leaves the ledger untouched, so the item is retried on a later cycle. A
//! ledger failure after a confirmed remote write is logged as a
//! reconciliation gap; the in-process acted set still prevents a second
//! action while this process lives.

use std::collections::HashSet;
use std::fmt;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::effects::{FeedEffect, FeedInterpreter, FeedResponse};
use crate::ledger::{InsertOutcome, Ledger, Namespace, ReplyRecord, RepostRecord};
use crate::types::{ContentItem, ContentUri, ReplyRef};

/// Result of a repost attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepostOutcome {
    /// The repost exists remotely; carries the URI of the repost record.
    Succeeded(ContentUri),
    /// The remote write failed. Nothing was recorded.
    Failed,
    /// This process already reposted the item.
    AlreadyActed,
}

/// Result of a reply attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The reply was published.
    Sent,
    /// The remote write failed. Nothing was recorded.
    Failed,
    /// This process already answered the item.
    AlreadyActed,
}

/// Executes reposts and replies against the feed and records them in the ledger.
pub struct ActionDispatcher<'a, F, L> {
    feed: &'a F,
    ledger: &'a L,
    acted: HashSet<(Namespace, ContentUri)>,
}

impl<'a, F, L> ActionDispatcher<'a, F, L>
where
    F: FeedInterpreter,
    F::Error: fmt::Display,
    L: Ledger,
{
    pub fn new(feed: &'a F, ledger: &'a L) -> Self {
        ActionDispatcher {
            feed,
            ledger,
            acted: HashSet::new(),
        }
    }

    /// Returns true if this process has already acted on `uri` in `namespace`.
    pub fn has_acted(&self, namespace: Namespace, uri: &ContentUri) -> bool {
        self.acted.contains(&(namespace, uri.clone()))
    }

    /// Reposts `item`, then posts `comment` as a reply to it.
    ///
    /// The comment is best-effort: its failure is logged and does not change
    /// the outcome.
    pub async fn repost(&mut self, item: &ContentItem, comment: Option<&str>) -> RepostOutcome {
        if self.has_acted(Namespace::Reposted, &item.uri) {
            debug!(uri = %item.uri, "Already reposted by this process");
            return RepostOutcome::AlreadyActed;
        }

        let effect = FeedEffect::CreateRepost {
            subject: item.strong_ref(),
        };
        let repost_uri = match self.feed.interpret(effect).await {
            Ok(FeedResponse::Created(created)) => created.uri,
            Ok(other) => {
                warn!(uri = %item.uri, got = other.name(), "Unexpected response to repost");
                return RepostOutcome::Failed;
            }
            Err(e) => {
                error!(uri = %item.uri, error = %e, "Repost failed");
                return RepostOutcome::Failed;
            }
        };
        self.acted.insert((Namespace::Reposted, item.uri.clone()));
        info!(
            uri = %item.uri,
            author = %item.author,
            repost = %repost_uri,
            "Reposted: {}",
            item.preview(50)
        );

        if let Some(comment) = comment {
            self.comment(item, comment).await;
        }

        let record = RepostRecord {
            source_uri: item.uri.clone(),
            source_author: item.author.clone(),
            repost_uri: Some(repost_uri.clone()),
            reposted_at: Utc::now(),
        };
        match self.ledger.insert_repost(record) {
            Ok(InsertOutcome::Inserted) => {}
            Ok(InsertOutcome::AlreadyExists) => {
                warn!(uri = %item.uri, "Repost was already recorded");
            }
            Err(e) => {
                error!(
                    uri = %item.uri,
                    repost = %repost_uri,
                    error = %e,
                    "Reconciliation gap: repost published but not recorded"
                );
            }
        }

        RepostOutcome::Succeeded(repost_uri)
    }

    /// Publishes `text` as a reply to `target` and records it.
    ///
    /// `thread_parent` is stored as the parent of the answered item: the
    /// repost it hangs off, or the item itself for notifications.
    pub async fn reply(
        &mut self,
        target: &ContentItem,
        thread_parent: &ContentUri,
        text: &str,
    ) -> ReplyOutcome {
        if self.has_acted(Namespace::Replied, &target.uri) {
            debug!(uri = %target.uri, "Already answered by this process");
            return ReplyOutcome::AlreadyActed;
        }

        let effect = FeedEffect::CreatePost {
            text: text.to_string(),
            reply_to: Some(ReplyRef::to_item(target)),
        };
        match self.feed.interpret(effect).await {
            Ok(FeedResponse::Created(_)) => {}
            Ok(other) => {
                warn!(uri = %target.uri, got = other.name(), "Unexpected response to reply");
                return ReplyOutcome::Failed;
            }
            Err(e) => {
                error!(uri = %target.uri, error = %e, "Reply failed");
                return ReplyOutcome::Failed;
            }
        }
        self.acted.insert((Namespace::Replied, target.uri.clone()));
        info!(uri = %target.uri, author = %target.author, "Replied: {text}");

        let record = ReplyRecord {
            reply_uri: target.uri.clone(),
            parent_uri: thread_parent.clone(),
            author: target.author.clone(),
            text: target.text.clone(),
            replied_at: Utc::now(),
        };
        match self.ledger.insert_reply(record) {
            Ok(InsertOutcome::Inserted) => {}
            Ok(InsertOutcome::AlreadyExists) => {
                warn!(uri = %target.uri, "Reply was already recorded");
            }
            Err(e) => {
                error!(
                    uri = %target.uri,
                    error = %e,
                    "Reconciliation gap: reply published but not recorded"
                );
            }
        }

        ReplyOutcome::Sent
    }

    async fn comment(&self, item: &ContentItem, comment: &str) {
        let effect = FeedEffect::CreatePost {
            text: comment.to_string(),
            reply_to: Some(ReplyRef::to_item(item)),
        };
        match self.feed.interpret(effect).await {
            Ok(_) => debug!(uri = %item.uri, "Added comment"),
            Err(e) => warn!(uri = %item.uri, error = %e, "Comment failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SqliteLedger;
    use crate::test_utils::{FakeFeed, FlakyLedger, arb_content_item, content_item};
    use proptest::prelude::*;

    #[tokio::test]
    async fn repost_records_after_remote_write() {
        let feed = FakeFeed::new();
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let item = content_item("at://a/post/1", "alice.bsky.social", "launch day");

        let outcome = ActionDispatcher::new(&feed, &ledger)
            .repost(&item, None)
            .await;

        let RepostOutcome::Succeeded(repost_uri) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(feed.reposts(), vec![item.strong_ref()]);
        let record = ledger.get_repost(&item.uri).unwrap().unwrap();
        assert_eq!(record.repost_uri, Some(repost_uri));
        assert_eq!(record.source_author.as_str(), "alice.bsky.social");
    }

    #[tokio::test]
    async fn failed_repost_records_nothing() {
        let feed = FakeFeed::new().failing_reposts();
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let item = content_item("at://a/post/1", "alice", "launch");

        let outcome = ActionDispatcher::new(&feed, &ledger)
            .repost(&item, Some("nice"))
            .await;

        assert_eq!(outcome, RepostOutcome::Failed);
        assert!(!ledger.exists(Namespace::Reposted, &item.uri).unwrap());
        assert!(feed.posts().is_empty(), "no comment without a repost");
    }

    #[tokio::test]
    async fn comment_is_a_reply_to_the_original() {
        let feed = FakeFeed::new();
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let item = content_item("at://a/post/1", "alice", "launch");

        ActionDispatcher::new(&feed, &ledger)
            .repost(&item, Some("Great post!"))
            .await;

        assert_eq!(
            feed.posts(),
            vec![("Great post!".to_string(), Some(ReplyRef::to_item(&item)))]
        );
    }

    #[tokio::test]
    async fn comment_failure_keeps_repost() {
        let feed = FakeFeed::new().failing_posts();
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let item = content_item("at://a/post/1", "alice", "launch");

        let outcome = ActionDispatcher::new(&feed, &ledger)
            .repost(&item, Some("Great post!"))
            .await;

        assert!(matches!(outcome, RepostOutcome::Succeeded(_)));
        assert!(ledger.exists(Namespace::Reposted, &item.uri).unwrap());
    }

    #[tokio::test]
    async fn ledger_failure_does_not_repeat_the_action() {
        let feed = FakeFeed::new();
        let mut ledger = FlakyLedger::new();
        ledger.failing_inserts = true;
        let item = content_item("at://a/post/1", "alice", "launch");
        let mut dispatcher = ActionDispatcher::new(&feed, &ledger);

        assert!(matches!(
            dispatcher.repost(&item, None).await,
            RepostOutcome::Succeeded(_)
        ));
        assert_eq!(
            dispatcher.repost(&item, None).await,
            RepostOutcome::AlreadyActed
        );
        assert_eq!(feed.reposts().len(), 1);
    }

    #[tokio::test]
    async fn reply_targets_item_and_records_parent() {
        let feed = FakeFeed::new();
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let target = content_item("at://b/post/9", "bob", "thanks for the info");
        let parent = ContentUri::new("at://bot/repost/1");

        let outcome = ActionDispatcher::new(&feed, &ledger)
            .reply(&target, &parent, "You're welcome!")
            .await;

        assert_eq!(outcome, ReplyOutcome::Sent);
        assert_eq!(
            feed.posts(),
            vec![(
                "You're welcome!".to_string(),
                Some(ReplyRef::to_item(&target))
            )]
        );
        let record = ledger.get_reply(&target.uri).unwrap().unwrap();
        assert_eq!(record.parent_uri, parent);
        assert_eq!(record.text, "thanks for the info");
        assert_eq!(record.author.as_str(), "bob");
    }

    #[tokio::test]
    async fn reply_ledger_failure_does_not_repeat_the_reply() {
        let feed = FakeFeed::new();
        let mut ledger = FlakyLedger::new();
        ledger.failing_inserts = true;
        let target = content_item("at://b/post/9", "bob", "thanks");
        let mut dispatcher = ActionDispatcher::new(&feed, &ledger);

        assert_eq!(
            dispatcher.reply(&target, &target.uri, "You're welcome!").await,
            ReplyOutcome::Sent
        );
        assert_eq!(
            dispatcher.reply(&target, &target.uri, "You're welcome!").await,
            ReplyOutcome::AlreadyActed
        );
        assert_eq!(feed.posts().len(), 1);
        assert!(!ledger.inner.exists(Namespace::Replied, &target.uri).unwrap());
    }

    #[tokio::test]
    async fn failed_reply_records_nothing() {
        let feed = FakeFeed::new().failing_posts();
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let target = content_item("at://b/post/9", "bob", "thanks");

        let outcome = ActionDispatcher::new(&feed, &ledger)
            .reply(&target, &target.uri, "You're welcome!")
            .await;

        assert_eq!(outcome, ReplyOutcome::Failed);
        assert!(!ledger.exists(Namespace::Replied, &target.uri).unwrap());
    }

    proptest! {
        #[test]
        fn each_item_is_acted_on_once(item in arb_content_item(), comment in proptest::option::of("[a-z ]{1,20}")) {
            let feed = FakeFeed::new();
            let ledger = SqliteLedger::open_in_memory().unwrap();
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let mut dispatcher = ActionDispatcher::new(&feed, &ledger);

            let first = rt.block_on(dispatcher.repost(&item, comment.as_deref()));
            let second = rt.block_on(dispatcher.repost(&item, comment.as_deref()));
            let replied = rt.block_on(dispatcher.reply(&item, &item.uri, "hi"));
            let replied_again = rt.block_on(dispatcher.reply(&item, &item.uri, "hi"));

            prop_assert!(matches!(first, RepostOutcome::Succeeded(_)));
            prop_assert_eq!(second, RepostOutcome::AlreadyActed);
            prop_assert_eq!(replied, ReplyOutcome::Sent);
            prop_assert_eq!(replied_again, ReplyOutcome::AlreadyActed);
            prop_assert_eq!(feed.reposts().len(), 1);
            prop_assert_eq!(feed.posts().len(), 1 + usize::from(comment.is_some()));
        }
    }
}
