//! Bluesky XRPC client and effect interpreter.
//!
//! This module provides the production implementation of
//! [`FeedInterpreter`](crate::effects::FeedInterpreter) on top of `reqwest`.
//!
//! Key features:
//! - Session login with an app password, refreshed once when the access token expires
//! - Distinguishes transient, permanent and expired-session errors
//! - Records are stamped with the current UTC time on creation

mod client;
mod error;
mod interpreter;

pub use client::{Session, XrpcClient};
pub use error::{XrpcError, XrpcErrorKind};
