//! Effects-as-data for the remote feed service.
//!
//! Every remote call the bot makes is first described as a [`FeedEffect`] and
//! then handed to a [`FeedInterpreter`]. This keeps the cycle engine free of
//! transport details:
//! - The adapter and dispatcher are tested against a fake interpreter
//! - Every intended remote call can be logged by name
//! - Reads and writes are distinguishable before they happen

pub mod feed;
pub mod interpreter;

pub use feed::{
    CreatedRecord, FeedEffect, FeedResponse, Notification, PostView, ProfileView, REPLY_REASON,
    ThreadNode, ThreadViewPost,
};
pub use interpreter::FeedInterpreter;
