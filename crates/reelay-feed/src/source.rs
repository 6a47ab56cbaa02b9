use async_trait::async_trait;

use crate::error::FeedError;
use crate::types::{DownloadOptions, Downloaded, FeedQuery, FeedStream, Identity, Post};

/// The upstream feed the relay reads from.
///
/// [`FeedClient`](crate::FeedClient) is the HTTP implementation; tests provide
/// in-memory fakes.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Resolve the stable external identity of `username`.
    async fn resolve_identity(&self, username: &str) -> Result<Identity, FeedError>;

    /// Enumerate posts created strictly after `query.resume_after`, oldest first.
    ///
    /// The outer `Err` means the feed could not be opened at all. Failures of
    /// individual items surface as `Err` items inside the stream.
    async fn stream_feed(&self, username: &str, query: FeedQuery)
        -> Result<FeedStream, FeedError>;

    /// Fetch every asset of `post` into `options.target_dir`.
    async fn download(
        &self,
        post: &Post,
        options: &DownloadOptions,
    ) -> Result<Downloaded, FeedError>;
}
