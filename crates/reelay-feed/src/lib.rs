//! Feed collaborator: identity lookup, resumable feed enumeration, and asset
//! downloads for tracked creator accounts.

pub mod client;
pub mod error;
pub mod retry;
pub mod source;
pub mod types;

pub use client::FeedClient;
pub use error::FeedError;
pub use source::FeedSource;
pub use types::{
    DownloadOptions, Downloaded, FeedQuery, FeedStream, FilenameFn, Identity, MediaKind, Post,
};
