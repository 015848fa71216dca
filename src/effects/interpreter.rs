//! Effect interpreter trait.
//!
//! The cycle engine only ever talks to the feed service through this trait.
//! The production implementation is the XRPC client; tests supply an
//! in-memory fake that records every effect it receives.

use std::future::Future;

use super::feed::{FeedEffect, FeedResponse};

/// Interprets feed effects against a remote service.
///
/// Implementations are constructed with an authenticated session, so every
/// effect runs as the bot's own account.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct CannedFeed {
///     responses: HashMap<FeedEffect, FeedResponse>,
/// }
///
/// impl FeedInterpreter for CannedFeed {
///     type Error = String;
///
///     async fn interpret(&self, effect: FeedEffect) -> Result<FeedResponse, Self::Error> {
///         self.responses.get(&effect)
///             .cloned()
///             .ok_or_else(|| format!("unexpected effect: {:?}", effect))
///     }
/// }
/// ```
pub trait FeedInterpreter {
    /// The error type returned by this interpreter.
    type Error;

    /// Execute a feed effect and return its response.
    fn interpret(
        &self,
        effect: FeedEffect,
    ) -> impl Future<Output = Result<FeedResponse, Self::Error>> + Send;
}
