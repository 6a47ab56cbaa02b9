//! Feed item and download types shared by every [`FeedSource`](crate::FeedSource).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// Resolved external identity of a tracked account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    ImageSet,
}

/// One feed item. Produced by the feed, consumed by a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    /// Creation time in epoch seconds.
    pub create_time: i64,
    /// Author handle, without the leading `@`.
    #[serde(default)]
    pub author: String,
    pub kind: MediaKind,
    /// High-definition byte size. Only meaningful for image sets.
    #[serde(default)]
    pub hd_size: u64,
    #[serde(default)]
    pub assets: Vec<String>,
}

impl Post {
    #[must_use]
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.create_time, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// Resumption predicate for [`FeedSource::stream_feed`](crate::FeedSource::stream_feed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedQuery {
    /// Only posts created strictly after this instant are yielded.
    pub resume_after: DateTime<Utc>,
}

/// A lazy, ordered, finite sequence of posts plus the expected-count hint.
///
/// Per-item failures arrive as `Err` items; the consumer logs them and keeps
/// enumerating.
pub struct FeedStream {
    pub expected: usize,
    pub posts: BoxStream<'static, Result<Post, FeedError>>,
}

impl std::fmt::Debug for FeedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedStream")
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

/// Builds the file name for the asset at `index` of a post.
pub type FilenameFn = fn(&Post, usize) -> String;

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub target_dir: PathBuf,
    /// Total attempts per asset, including the first.
    pub attempts: u32,
    pub filename: Option<FilenameFn>,
}

/// Files fetched for one post.
///
/// Every file is removed when the value is dropped, on success and error paths
/// alike. Removal failures are logged, not propagated.
#[derive(Debug)]
pub struct Downloaded {
    pub post_id: String,
    pub total_bytes: u64,
    files: Vec<PathBuf>,
}

impl Downloaded {
    #[must_use]
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            total_bytes: 0,
            files: Vec::new(),
        }
    }

    /// Take ownership of a file that now exists on disk.
    pub fn push(&mut self, path: PathBuf, bytes: u64) {
        self.total_bytes = self.total_bytes.saturating_add(bytes);
        self.files.push(path);
    }

    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    #[must_use]
    pub fn first(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }
}

impl Drop for Downloaded {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(e) = std::fs::remove_file(file) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::error!(
                        file = %file.display(),
                        error = %e,
                        "failed to remove temporary file"
                    );
                }
            }
        }
    }
}
