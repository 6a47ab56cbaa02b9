//! Delivery of a single post into its destination thread.
//!
//! Failures on the source side (a download that exhausts its attempts, an
//! encode that fails) are reported in-band and the post counts as handled.
//! Failures on the destination side propagate, so the post is offered again
//! on the next tick.

use std::path::Path;
use std::sync::Arc;

use reelay_discord::Destination;
use reelay_feed::{DownloadOptions, FeedSource, MediaKind, Post};
use reelay_media::Transcode;

use crate::error::RelayError;
use crate::markers;

/// Image sets whose high-definition size exceeds this are not relayed.
pub const DEFAULT_SIZE_LIMIT_BYTES: u64 = 25 * 1024 * 1024;

/// What happened to a post that did not abort the sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// Every file of the post was uploaded.
    Delivered { files: usize },
    /// Media could not be fetched, read, or converted.
    MediaError { reason: String },
    /// An image set over the size limit; nothing was downloaded.
    Oversized { size: u64 },
}

/// Receives a structured event for every handled post.
pub trait RelayObserver: Send + Sync {
    fn post_handled(&self, thread: &str, post: &Post, outcome: &PostOutcome);
}

#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    /// Total download attempts per asset.
    pub download_attempts: u32,
    pub size_limit_bytes: u64,
    /// Post `#e` / `#big` notices into the thread for skipped posts.
    pub inband_markers: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            download_attempts: 4,
            size_limit_bytes: DEFAULT_SIZE_LIMIT_BYTES,
            inband_markers: true,
        }
    }
}

impl RelaySettings {
    #[must_use]
    pub fn from_app_config(config: &reelay_core::AppConfig) -> Self {
        Self {
            download_attempts: config.download_attempts,
            size_limit_bytes: config.size_limit_bytes,
            inband_markers: config.inband_markers,
        }
    }
}

pub struct PostRelay {
    feed: Arc<dyn FeedSource>,
    destination: Arc<dyn Destination>,
    transcoder: Arc<dyn Transcode>,
    settings: RelaySettings,
    observer: Option<Arc<dyn RelayObserver>>,
}

impl std::fmt::Debug for PostRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostRelay")
            .field("settings", &self.settings)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl PostRelay {
    #[must_use]
    pub fn new(
        feed: Arc<dyn FeedSource>,
        destination: Arc<dyn Destination>,
        transcoder: Arc<dyn Transcode>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            feed,
            destination,
            transcoder,
            settings,
            observer: None,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RelayObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Deliver `post` into `thread`.
    ///
    /// All intermediate files live in a private work directory that is removed
    /// before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Destination`] if a file upload or an in-band
    /// notice cannot be sent, and [`RelayError::WorkDir`] if no work
    /// directory can be created.
    pub async fn handle_post(&self, post: &Post, thread: &str) -> Result<PostOutcome, RelayError> {
        let work_dir = tempfile::Builder::new()
            .suffix("_reelay")
            .tempdir()
            .map_err(RelayError::WorkDir)?;

        let outcome = match post.kind {
            MediaKind::Video => self.relay_video(post, thread, work_dir.path()).await?,
            MediaKind::ImageSet => self.relay_images(post, thread, work_dir.path()).await?,
        };

        if let Some(observer) = &self.observer {
            observer.post_handled(thread, post, &outcome);
        }
        Ok(outcome)
    }

    async fn relay_video(
        &self,
        post: &Post,
        thread: &str,
        work_dir: &Path,
    ) -> Result<PostOutcome, RelayError> {
        let options = DownloadOptions {
            target_dir: work_dir.to_path_buf(),
            attempts: self.settings.download_attempts,
            filename: None,
        };
        let downloaded = match self.feed.download(post, &options).await {
            Ok(d) => d,
            Err(e) => return self.media_error(post, thread, e.to_string()).await,
        };
        let Some(source) = downloaded.first() else {
            return self
                .media_error(post, thread, "download produced no files".to_owned())
                .await;
        };

        let converted = match self.transcoder.convert(source, work_dir).await {
            Ok(c) => c,
            Err(e) => return self.media_error(post, thread, e.to_string()).await,
        };
        let content = match converted.read().await {
            Ok(bytes) => bytes,
            Err(e) => return self.media_error(post, thread, e.to_string()).await,
        };

        let filename = basename(source);
        tracing::debug!(
            post_id = %post.id,
            filename = %filename,
            bytes = content.len(),
            "relay: uploading video"
        );
        self.destination.send_file(thread, &filename, content).await?;
        Ok(PostOutcome::Delivered { files: 1 })
    }

    async fn relay_images(
        &self,
        post: &Post,
        thread: &str,
        work_dir: &Path,
    ) -> Result<PostOutcome, RelayError> {
        if post.hd_size > self.settings.size_limit_bytes {
            tracing::info!(
                post_id = %post.id,
                size = post.hd_size,
                limit = self.settings.size_limit_bytes,
                "relay: image set over size limit, skipping"
            );
            self.notify(thread, &markers::oversized(&post.id)).await?;
            return Ok(PostOutcome::Oversized { size: post.hd_size });
        }

        let options = DownloadOptions {
            target_dir: work_dir.to_path_buf(),
            attempts: self.settings.download_attempts,
            filename: Some(image_filename),
        };
        let downloaded = match self.feed.download(post, &options).await {
            Ok(d) => d,
            Err(e) => return self.media_error(post, thread, e.to_string()).await,
        };
        if downloaded.files().is_empty() {
            return self
                .media_error(post, thread, "download produced no files".to_owned())
                .await;
        }

        // Read everything up front so an unreadable file is reported before
        // any part of the set has been uploaded.
        let mut files = Vec::with_capacity(downloaded.files().len());
        for path in downloaded.files() {
            match tokio::fs::read(path).await {
                Ok(bytes) => files.push((basename(path), bytes)),
                Err(e) => {
                    let reason = format!("failed to read {}: {e}", path.display());
                    return self.media_error(post, thread, reason).await;
                }
            }
        }

        let count = files.len();
        for (filename, content) in files {
            self.destination.send_file(thread, &filename, content).await?;
        }
        Ok(PostOutcome::Delivered { files: count })
    }

    async fn media_error(
        &self,
        post: &Post,
        thread: &str,
        reason: String,
    ) -> Result<PostOutcome, RelayError> {
        tracing::warn!(post_id = %post.id, reason = %reason, "relay: media error, skipping post");
        self.notify(thread, &markers::media_error(&post.id)).await?;
        Ok(PostOutcome::MediaError { reason })
    }

    async fn notify(&self, thread: &str, text: &str) -> Result<(), RelayError> {
        if self.settings.inband_markers {
            self.destination.send_message(thread, text).await?;
        }
        Ok(())
    }
}

/// `@<author>_<YYYY-MM-DD>_<index>.jpg`, dated in UTC.
fn image_filename(post: &Post, index: usize) -> String {
    format!(
        "@{}_{}_{index}.jpg",
        post.author,
        post.created_at().format("%Y-%m-%d")
    )
}

fn basename(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |n| n.to_string_lossy().into_owned(),
    )
}
