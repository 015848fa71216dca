//! Feed effect types.
//!
//! These types describe operations against the remote feed service as data,
//! without executing them. An interpreter (see [`FeedInterpreter`]) executes
//! them; the XRPC client in `crate::bluesky` is the production interpreter and
//! tests use an in-memory one.
//!
//! Response payloads keep the service's raw shapes. Turning them into
//! [`ContentItem`]s is the job of `crate::source` alone.
//!
//! [`FeedInterpreter`]: super::FeedInterpreter
//! [`ContentItem`]: crate::types::ContentItem

use serde::{Deserialize, Serialize};

use crate::types::{ContentCid, ContentUri, Did, Handle, ReplyRef, StrongRef};

/// The notification reason for a reply to one of the account's posts.
pub const REPLY_REASON: &str = "reply";

/// A feed service operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEffect {
    // ─── Queries ──────────────────────────────────────────────────────────────
    /// Full-text post search.
    SearchPosts { query: String, limit: u32 },

    /// Fetch a post with its direct replies.
    GetPostThread { uri: ContentUri },

    /// Fetch the most recent notifications of the logged-in account.
    ListNotifications { limit: u32 },

    // ─── Mutations ────────────────────────────────────────────────────────────
    /// Repost the exact version of a post.
    CreateRepost { subject: StrongRef },

    /// Publish a text post, optionally as a reply.
    CreatePost {
        text: String,
        reply_to: Option<ReplyRef>,
    },
}

impl FeedEffect {
    /// Returns true for effects that write to the remote service.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            FeedEffect::CreateRepost { .. } | FeedEffect::CreatePost { .. }
        )
    }

    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            FeedEffect::SearchPosts { .. } => "search_posts",
            FeedEffect::GetPostThread { .. } => "get_post_thread",
            FeedEffect::ListNotifications { .. } => "list_notifications",
            FeedEffect::CreateRepost { .. } => "create_repost",
            FeedEffect::CreatePost { .. } => "create_post",
        }
    }
}

// ─── Raw payload shapes ───────────────────────────────────────────────────────

/// Author summary attached to posts and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub did: Did,
    pub handle: Handle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A post as returned by search and thread queries.
///
/// `record` is the post record itself; its fields (`text`, `createdAt`, ...)
/// are not guaranteed to be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: ContentUri,
    pub cid: ContentCid,
    pub author: ProfileView,
    #[serde(default)]
    pub record: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<String>,
}

/// A node of a post thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum ThreadNode {
    /// A visible post and its replies.
    #[serde(rename = "app.bsky.feed.defs#threadViewPost")]
    Post(ThreadViewPost),

    /// Deleted, blocked or otherwise unavailable posts.
    #[serde(other)]
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadViewPost {
    pub post: PostView,
    #[serde(default)]
    pub replies: Vec<ThreadNode>,
}

/// An entry of the account's notification list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub uri: ContentUri,
    pub cid: ContentCid,
    pub author: ProfileView,
    /// Why the notification was sent (`reply`, `like`, `follow`, ...).
    pub reason: String,
    #[serde(default)]
    pub record: serde_json::Value,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<String>,
}

impl Notification {
    pub fn is_reply(&self) -> bool {
        self.reason == REPLY_REASON
    }
}

/// A record created on the account's repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub uri: ContentUri,
    pub cid: ContentCid,
}

/// Response from a feed effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FeedResponse {
    /// Response to `SearchPosts`.
    Posts(Vec<PostView>),

    /// Response to `GetPostThread`.
    Thread(ThreadNode),

    /// Response to `ListNotifications`.
    Notifications(Vec<Notification>),

    /// Response to `CreateRepost` and `CreatePost`.
    Created(CreatedRecord),
}

impl FeedResponse {
    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            FeedResponse::Posts(_) => "posts",
            FeedResponse::Thread(_) => "thread",
            FeedResponse::Notifications(_) => "notifications",
            FeedResponse::Created(_) => "created",
        }
    }
}
