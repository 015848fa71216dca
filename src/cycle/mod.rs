//! Cycle orchestrator.
//!
//! One cycle runs three passes in order:
//!
//! 1. **Repost**: search every tag then every keyword, repost matching
//!    candidates until the per-cycle cap is reached.
//! 2. **Replies to own reposts**: answer direct replies under the most recent
//!    reposts.
//! 3. **Notifications**: answer reply notifications.
//!
//! Every candidate is checked against the ledger first. A failed lookup skips
//! the candidate (fail-closed), so a storage hiccup can delay an action but
//! never duplicate one.
//!
//! # Failure Semantics
//!
//! A pass that fails is logged and counted as zero actions; the remaining
//! passes still run and the next scheduled cycle is unaffected.

use std::fmt;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::BotConfig;
use crate::dispatch::{ActionDispatcher, ReplyOutcome, RepostOutcome};
use crate::effects::FeedInterpreter;
use crate::ledger::{Ledger, LedgerError, Namespace};
use crate::source::ContentSource;
use crate::triggers::{TriggerConfig, classify_reply, should_act_on_source};
use crate::types::{ContentItem, ContentUri, Handle};

/// Errors that abort a single pass.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The ledger could not be read.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Counts of successful actions in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub reposts: usize,
    /// Replies sent under the bot's own reposts.
    pub replies: usize,
    pub notification_replies: usize,
}

impl CycleReport {
    pub fn total(&self) -> usize {
        self.reposts + self.replies + self.notification_replies
    }
}

/// Fetch sizes used by the passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleLimits {
    /// Results requested per search query.
    pub search_limit: u32,
    /// Number of recent reposts whose threads are checked for replies.
    pub recent_reposts_checked: usize,
    pub notification_limit: u32,
}

impl Default for CycleLimits {
    fn default() -> Self {
        CycleLimits {
            search_limit: crate::source::DEFAULT_SEARCH_LIMIT,
            recent_reposts_checked: 20,
            notification_limit: crate::source::DEFAULT_NOTIFICATION_LIMIT,
        }
    }
}

impl CycleLimits {
    pub fn from_config(config: &BotConfig) -> Self {
        CycleLimits {
            search_limit: config.search.search_limit,
            recent_reposts_checked: config.auto_reply.recent_reposts_checked,
            notification_limit: config.auto_reply.notification_limit,
        }
    }
}

/// Runs bot cycles against one feed and one ledger.
///
/// The runner lives for the whole process so that its dispatcher remembers
/// every item acted on, even when recording it in the ledger failed.
pub struct CycleRunner<'a, F, L> {
    source: ContentSource<'a, F>,
    dispatcher: ActionDispatcher<'a, F, L>,
    ledger: &'a L,
    triggers: TriggerConfig,
    limits: CycleLimits,
    /// Handle of the bot account; its own posts are never answered.
    own_handle: Handle,
}

impl<'a, F, L> CycleRunner<'a, F, L>
where
    F: FeedInterpreter,
    F::Error: fmt::Display,
    L: Ledger,
{
    pub fn new(feed: &'a F, ledger: &'a L, triggers: TriggerConfig, own_handle: Handle) -> Self {
        CycleRunner {
            source: ContentSource::new(feed),
            dispatcher: ActionDispatcher::new(feed, ledger),
            ledger,
            triggers,
            limits: CycleLimits::default(),
            own_handle,
        }
    }

    pub fn with_limits(mut self, limits: CycleLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Runs all three passes and returns what was done.
    pub async fn run_cycle(&mut self) -> CycleReport {
        info!("Starting bot cycle");

        let reposts = self.repost_pass().await;
        let replies = self.own_reposts_pass().await.unwrap_or_else(|e| {
            error!(error = %e, "Reply pass failed");
            0
        });
        let notification_replies = self.notification_pass().await;

        let report = CycleReport {
            reposts,
            replies,
            notification_replies,
        };
        info!(
            reposts = report.reposts,
            replies = report.replies,
            notification_replies = report.notification_replies,
            "Bot cycle completed"
        );
        report
    }

    #[instrument(skip_all, fields(cap = self.triggers.max_reposts_per_cycle()))]
    async fn repost_pass(&mut self) -> usize {
        let cap = self.triggers.max_reposts_per_cycle();
        if cap == 0 {
            debug!("Repost cap is zero, skipping searches");
            return 0;
        }

        let mut reposted = 0;
        'queries: for query in self.triggers.search_queries() {
            info!(query = query.as_str(), "Searching");
            let candidates = self
                .source
                .search(query.as_str(), self.limits.search_limit)
                .await;

            for item in candidates {
                if self.is_recorded(Namespace::Reposted, &item.uri) {
                    continue;
                }
                if !should_act_on_source(&item.text, &self.triggers) {
                    continue;
                }
                info!(
                    uri = %item.uri,
                    author = %item.author,
                    "Found post to repost: {}",
                    item.preview(50)
                );
                let comment = self.triggers.preset_comment();
                if let RepostOutcome::Succeeded(_) = self.dispatcher.repost(&item, comment).await {
                    reposted += 1;
                    if reposted >= cap {
                        debug!("Repost cap reached");
                        break 'queries;
                    }
                }
            }
        }

        info!(reposted, "Repost pass completed");
        reposted
    }

    /// Threads are fetched by the repost record URI. The live service may not
    /// resolve a repost record as a thread root, in which case this pass finds
    /// no replies and replies arrive through the notification pass instead.
    #[instrument(skip_all, fields(checked = self.limits.recent_reposts_checked))]
    async fn own_reposts_pass(&mut self) -> Result<usize, CycleError> {
        let recent = self
            .ledger
            .recent_reposts(self.limits.recent_reposts_checked)?;

        let mut sent = 0;
        for repost_uri in recent.into_iter().filter_map(|r| r.repost_uri) {
            for reply in self.source.thread_replies(&repost_uri).await {
                if self.respond(&reply, &repost_uri).await {
                    sent += 1;
                }
            }
        }

        info!(sent, "Reply pass completed");
        Ok(sent)
    }

    #[instrument(skip_all)]
    async fn notification_pass(&mut self) -> usize {
        let notifications = self
            .source
            .notifications(self.limits.notification_limit)
            .await;

        let mut sent = 0;
        for notification in notifications {
            let parent = notification.uri.clone();
            if self.respond(&notification, &parent).await {
                sent += 1;
            }
        }

        info!(sent, "Notification pass completed");
        sent
    }

    /// Answers `item` unless it was already answered or is the bot's own post.
    async fn respond(&mut self, item: &ContentItem, thread_parent: &ContentUri) -> bool {
        if self.is_recorded(Namespace::Replied, &item.uri) {
            return false;
        }
        if item.author == self.own_handle {
            return false;
        }
        let Some(response) = classify_reply(&item.text, &self.triggers) else {
            debug!(uri = %item.uri, "No response for reply");
            return false;
        };
        info!(
            uri = %item.uri,
            author = %item.author,
            "Responding to: {}",
            item.preview(50)
        );
        matches!(
            self.dispatcher.reply(item, thread_parent, response).await,
            ReplyOutcome::Sent
        )
    }

    /// Ledger lookup that treats failure as "already recorded".
    fn is_recorded(&self, namespace: Namespace, uri: &ContentUri) -> bool {
        match self.ledger.exists(namespace, uri) {
            Ok(recorded) => recorded,
            Err(e) => {
                warn!(%namespace, uri = %uri, error = %e, "Ledger lookup failed, skipping");
                true
            }
        }
    }
}
