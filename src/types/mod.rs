//! Core domain types for the repost bot.
//!
//! Identifiers are newtypes so that URIs, CIDs and handles cannot be mixed up,
//! and `ContentItem` is the single shape every pipeline works with.

pub mod content;
pub mod ids;

pub use content::{ContentItem, ReplyRef, StrongRef};
pub use ids::{ContentCid, ContentUri, Did, Handle};
