use reelay_core::ConfigError;
use reelay_discord::DestinationError;
use reelay_feed::FeedError;
use thiserror::Error;

/// Failures that abort delivery of a single post.
///
/// Source-side media problems are not errors: they become
/// [`PostOutcome::MediaError`](crate::PostOutcome::MediaError).
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("destination request failed: {0}")]
    Destination(#[from] DestinationError),

    #[error("failed to create work directory: {0}")]
    WorkDir(#[source] std::io::Error),
}

/// Failures that abort one profile's sync for the current tick.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to resolve identity for '{username}': {source}")]
    Identity {
        username: String,
        #[source]
        source: FeedError,
    },

    #[error("failed to provision destination thread: {0}")]
    Provision(#[source] DestinationError),

    #[error("failed to persist profile: {0}")]
    Persist(#[from] ConfigError),

    #[error("failed to open feed: {0}")]
    Feed(#[source] FeedError),

    #[error("failed to handle post: {source} ({post_id})")]
    Post {
        post_id: String,
        #[source]
        source: RelayError,
    },
}
