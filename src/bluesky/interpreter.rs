//! Feed effect interpreter over XRPC.
//!
//! Maps each `FeedEffect` onto one Bluesky endpoint:
//!
//! | Effect              | Endpoint                                   |
//! |---------------------|--------------------------------------------|
//! | `SearchPosts`       | `app.bsky.feed.searchPosts`                |
//! | `GetPostThread`     | `app.bsky.feed.getPostThread` (depth 1)    |
//! | `ListNotifications` | `app.bsky.notification.listNotifications`  |
//! | `CreateRepost`      | `com.atproto.repo.createRecord` (repost)   |
//! | `CreatePost`        | `com.atproto.repo.createRecord` (post)     |
//!
//! Each effect is attempted once; failures are returned to the caller.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::effects::{
    CreatedRecord, FeedEffect, FeedInterpreter, FeedResponse, Notification, PostView, ThreadNode,
};
use crate::types::{ContentUri, ReplyRef, StrongRef};

use super::client::XrpcClient;
use super::error::XrpcError;

const REPOST_COLLECTION: &str = "app.bsky.feed.repost";
const POST_COLLECTION: &str = "app.bsky.feed.post";

// ─── Wire Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchPostsOutput {
    #[serde(default)]
    posts: Vec<PostView>,
}

#[derive(Debug, Deserialize)]
struct GetPostThreadOutput {
    thread: ThreadNode,
}

#[derive(Debug, Deserialize)]
struct ListNotificationsOutput {
    #[serde(default)]
    notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
struct CreateRecordInput<'a> {
    repo: &'a str,
    collection: &'a str,
    record: serde_json::Value,
}

// ─── Interpreter Implementation ───────────────────────────────────────────────

impl FeedInterpreter for XrpcClient {
    type Error = XrpcError;

    async fn interpret(&self, effect: FeedEffect) -> Result<FeedResponse, Self::Error> {
        let name = effect.name();
        debug!(effect = name, mutation = effect.is_mutation(), "Executing feed effect");
        let result = execute(self, effect).await;
        if let Err(e) = &result {
            debug!(
                effect = name,
                kind = ?e.kind,
                transient = e.kind.is_transient(),
                "Feed effect failed"
            );
        }
        result
    }
}

async fn execute(client: &XrpcClient, effect: FeedEffect) -> Result<FeedResponse, XrpcError> {
    match effect {
        FeedEffect::SearchPosts { query, limit } => search_posts(client, query, limit).await,
        FeedEffect::GetPostThread { uri } => get_post_thread(client, uri).await,
        FeedEffect::ListNotifications { limit } => list_notifications(client, limit).await,
        FeedEffect::CreateRepost { subject } => create_repost(client, subject).await,
        FeedEffect::CreatePost { text, reply_to } => create_post(client, text, reply_to).await,
    }
}

async fn search_posts(
    client: &XrpcClient,
    query: String,
    limit: u32,
) -> Result<FeedResponse, XrpcError> {
    let output: SearchPostsOutput = client
        .query(
            "app.bsky.feed.searchPosts",
            &[("q", query), ("limit", limit.to_string())],
        )
        .await?;
    Ok(FeedResponse::Posts(output.posts))
}

async fn get_post_thread(client: &XrpcClient, uri: ContentUri) -> Result<FeedResponse, XrpcError> {
    let output: GetPostThreadOutput = client
        .query(
            "app.bsky.feed.getPostThread",
            &[
                ("uri", uri.0),
                ("depth", "1".to_string()),
                ("parentHeight", "0".to_string()),
            ],
        )
        .await?;
    Ok(FeedResponse::Thread(output.thread))
}

async fn list_notifications(client: &XrpcClient, limit: u32) -> Result<FeedResponse, XrpcError> {
    let output: ListNotificationsOutput = client
        .query(
            "app.bsky.notification.listNotifications",
            &[("limit", limit.to_string())],
        )
        .await?;
    Ok(FeedResponse::Notifications(output.notifications))
}

async fn create_repost(client: &XrpcClient, subject: StrongRef) -> Result<FeedResponse, XrpcError> {
    create_record(client, REPOST_COLLECTION, repost_record(&subject, &now())).await
}

async fn create_post(
    client: &XrpcClient,
    text: String,
    reply_to: Option<ReplyRef>,
) -> Result<FeedResponse, XrpcError> {
    create_record(
        client,
        POST_COLLECTION,
        post_record(&text, reply_to.as_ref(), &now()),
    )
    .await
}

async fn create_record(
    client: &XrpcClient,
    collection: &str,
    record: serde_json::Value,
) -> Result<FeedResponse, XrpcError> {
    let input = CreateRecordInput {
        repo: client.session().did.as_str(),
        collection,
        record,
    };
    let created: CreatedRecord = client
        .procedure("com.atproto.repo.createRecord", &input)
        .await?;
    Ok(FeedResponse::Created(created))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn strong_ref_json(r: &StrongRef) -> serde_json::Value {
    json!({ "uri": r.uri.as_str(), "cid": r.cid.as_str() })
}

fn repost_record(subject: &StrongRef, created_at: &str) -> serde_json::Value {
    json!({
        "$type": REPOST_COLLECTION,
        "subject": strong_ref_json(subject),
        "createdAt": created_at,
    })
}

fn post_record(text: &str, reply_to: Option<&ReplyRef>, created_at: &str) -> serde_json::Value {
    let mut record = json!({
        "$type": POST_COLLECTION,
        "text": text,
        "createdAt": created_at,
    });
    if let Some(reply) = reply_to {
        record["reply"] = json!({
            "root": strong_ref_json(&reply.root),
            "parent": strong_ref_json(&reply.parent),
        });
    }
    record
}
