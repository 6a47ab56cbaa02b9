//! One sync pass for one profile.
//!
//! Order of steps: resolve identity, provision the destination thread, open
//! the feed after the watermark, relay each post oldest first, advance the
//! watermark. Every profile mutation is saved before the step that depends
//! on it runs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reelay_core::{ConfigError, Profile, ProfileStore};
use reelay_discord::{Destination, ThreadOptions};
use reelay_feed::{FeedQuery, FeedSource};

use crate::error::SyncError;
use crate::relay::{PostOutcome, PostRelay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The feed reported nothing after the watermark.
    NoUpdates,
    /// The feed was drained without a destination failure.
    Completed,
}

/// Result of a successful sync, carrying the updated profile snapshot.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub profile: Profile,
    pub status: SyncStatus,
    /// Count hint returned by the feed.
    pub expected: usize,
    pub delivered: usize,
    /// Posts answered with an in-band notice instead of media.
    pub skipped: usize,
    /// Feed items that failed to enumerate.
    pub item_errors: usize,
}

impl SyncReport {
    fn new(profile: Profile, status: SyncStatus, expected: usize) -> Self {
        Self {
            profile,
            status,
            expected,
            delivered: 0,
            skipped: 0,
            item_errors: 0,
        }
    }
}

/// Collaborators shared by every profile's sync.
pub struct ProfileSync {
    feed: Arc<dyn FeedSource>,
    destination: Arc<dyn Destination>,
    relay: PostRelay,
    parent_channel: String,
}

impl std::fmt::Debug for ProfileSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileSync")
            .field("parent_channel", &self.parent_channel)
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}

impl ProfileSync {
    #[must_use]
    pub fn new(
        feed: Arc<dyn FeedSource>,
        destination: Arc<dyn Destination>,
        relay: PostRelay,
        parent_channel: impl Into<String>,
    ) -> Self {
        Self {
            feed,
            destination,
            relay,
            parent_channel: parent_channel.into(),
        }
    }
}

/// Bring `profile`'s destination thread up to date with its feed.
///
/// Takes an owned snapshot and returns the updated one in the report. The
/// watermark only moves once every observed post has been handled, so a
/// failed sync leaves it where it was and the same posts are offered again.
///
/// # Errors
///
/// Returns [`SyncError`] when identity resolution, thread provisioning,
/// feed opening, persistence, or delivery of a post fails. Nothing after the
/// failing step runs.
pub async fn sync_profile<S>(
    ctx: &ProfileSync,
    store: &mut S,
    mut profile: Profile,
) -> Result<SyncReport, SyncError>
where
    S: ProfileStore + ?Sized,
{
    if profile.user_id.is_none() {
        let identity = ctx
            .feed
            .resolve_identity(&profile.username)
            .await
            .map_err(|source| SyncError::Identity {
                username: profile.username.clone(),
                source,
            })?;
        tracing::info!(profile = %profile.tag, user_id = %identity.id, "sync: resolved identity");
        profile.user_id = Some(identity.id);
        persist(store, &profile)?;
    }

    let thread = match profile.thread.clone() {
        Some(thread) => thread,
        None => {
            let thread = provision_thread(ctx, &profile.tag).await?;
            tracing::info!(profile = %profile.tag, thread = %thread, "sync: provisioned thread");
            profile.thread = Some(thread.clone());
            persist(store, &profile)?;
            thread
        }
    };

    let query = FeedQuery {
        resume_after: profile.resume_after(),
    };
    let feed = ctx
        .feed
        .stream_feed(&profile.username, query)
        .await
        .map_err(SyncError::Feed)?;

    if feed.expected == 0 {
        tracing::info!(profile = %profile.tag, "sync: no updates");
        return Ok(SyncReport::new(profile, SyncStatus::NoUpdates, 0));
    }

    let expected = feed.expected;
    let mut report = SyncReport::new(profile, SyncStatus::Completed, expected);
    let mut last_seen: Option<DateTime<Utc>> = None;
    let mut posts = feed.posts;
    let mut index = 0usize;

    while let Some(item) = posts.next().await {
        index += 1;
        let post = match item {
            Ok(post) => post,
            Err(e) => {
                report.item_errors += 1;
                tracing::warn!(
                    profile = %report.profile.tag,
                    error = %e,
                    "sync: feed item failed, continuing"
                );
                continue;
            }
        };

        tracing::info!(
            profile = %report.profile.tag,
            post_id = %post.id,
            "sync: post [{index}/{expected}]"
        );
        let outcome = ctx
            .relay
            .handle_post(&post, &thread)
            .await
            .map_err(|source| SyncError::Post {
                post_id: post.id.clone(),
                source,
            })?;
        match outcome {
            PostOutcome::Delivered { .. } => report.delivered += 1,
            PostOutcome::MediaError { .. } | PostOutcome::Oversized { .. } => report.skipped += 1,
        }
        last_seen = Some(post.created_at());
    }

    match last_seen {
        Some(observed) if report.profile.advance_watermark(observed) => {
            persist(store, &report.profile)?;
            tracing::info!(
                profile = %report.profile.tag,
                last_upload = %observed,
                delivered = report.delivered,
                skipped = report.skipped,
                "sync: watermark advanced"
            );
        }
        Some(_) => {}
        None => tracing::warn!(
            profile = %report.profile.tag,
            item_errors = report.item_errors,
            "sync: no post observed, watermark unchanged"
        ),
    }

    Ok(report)
}

/// Runs the store's blocking write without stalling other tasks on a
/// multi-threaded runtime. A current-thread runtime has no other worker to
/// hand off to, so the write runs inline there.
fn persist<S>(store: &mut S, profile: &Profile) -> Result<(), ConfigError>
where
    S: ProfileStore + ?Sized,
{
    match tokio::runtime::Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(tokio::runtime::RuntimeFlavor::MultiThread) => {
            tokio::task::block_in_place(|| store.save(profile))
        }
        _ => store.save(profile),
    }
}

/// Announce `tag` in the parent channel and start the profile's thread on it.
async fn provision_thread(ctx: &ProfileSync, tag: &str) -> Result<String, SyncError> {
    let message_id = ctx
        .destination
        .send_message(&ctx.parent_channel, tag)
        .await
        .map_err(SyncError::Provision)?;
    ctx.destination
        .create_thread(
            &ctx.parent_channel,
            &message_id,
            tag,
            ThreadOptions::default(),
        )
        .await
        .map_err(SyncError::Provision)
}
