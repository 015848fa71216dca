//! Repost Bot - a scheduled Bluesky agent that reposts matching posts and
//! auto-responds to replies.
//!
//! This library provides the dedup ledger, trigger rules, feed client and the
//! cycle engine driving them.

pub mod bluesky;
pub mod config;
pub mod cycle;
pub mod dispatch;
pub mod effects;
pub mod ledger;
pub mod logging;
pub mod schedule;
pub mod source;
pub mod triggers;
pub mod types;

#[cfg(test)]
mod test_utils;
