use thiserror::Error;

/// Errors returned by the feed collaborator.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("rate limited by feed gateway: {url}")]
    RateLimited { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("post {post_id} has no downloadable assets")]
    NoAssets { post_id: String },

    #[error("pagination limit reached for {username}: exceeded {max_pages} pages")]
    PaginationLimit { username: String, max_pages: usize },

    #[error("invalid feed base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}
