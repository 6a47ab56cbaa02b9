use thiserror::Error;

#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited on {route} (retry after {retry_after_ms}ms)")]
    RateLimited { route: String, retry_after_ms: u64 },

    #[error("destination API returned {status} for {route}: {body}")]
    Api {
        status: u16,
        route: String,
        body: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid destination base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}
