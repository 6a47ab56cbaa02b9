//! Wires the HTTP clients, the encoder, and the profile store into a scheduler.

use std::sync::Arc;

use reelay_core::{AppConfig, YamlProfileStore};
use reelay_discord::{Destination, DiscordClient};
use reelay_feed::{FeedClient, FeedSource};
use reelay_media::{FfmpegTranscoder, Transcode};
use reelay_relay::{PostRelay, ProfileSync, RelaySettings, Scheduler};

pub(crate) fn build_scheduler(config: &AppConfig) -> anyhow::Result<Scheduler<YamlProfileStore>> {
    let store = YamlProfileStore::open(&config.profiles_path)?;

    let feed: Arc<dyn FeedSource> = Arc::new(FeedClient::new(
        &config.feed_base_url,
        config.request_timeout_secs,
        &config.user_agent,
        config.retry_backoff_base_ms,
    )?);
    let destination: Arc<dyn Destination> = Arc::new(discord_client(config)?);
    let transcoder: Arc<dyn Transcode> = Arc::new(FfmpegTranscoder::new(
        config.ffmpeg_path.clone(),
        config.max_dimension,
    ));

    let relay = PostRelay::new(
        Arc::clone(&feed),
        Arc::clone(&destination),
        transcoder,
        RelaySettings::from_app_config(config),
    );
    let sync = ProfileSync::new(feed, destination, relay, config.parent_channel.clone());

    Ok(Scheduler::new(sync, store, config.poll_interval()))
}

pub(crate) fn discord_client(config: &AppConfig) -> anyhow::Result<DiscordClient> {
    let client = DiscordClient::with_base_url(
        &config.discord_token,
        config.request_timeout_secs,
        &config.user_agent,
        &config.discord_api_base,
    )?;
    Ok(client.with_backoff_base_ms(config.retry_backoff_base_ms))
}
