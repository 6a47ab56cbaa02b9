//! In-memory collaborators for relay, sync, and scheduler tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use reelay_core::{ConfigError, Profile, ProfileStore};
use reelay_discord::{Destination, DestinationError, ThreadOptions};
use reelay_feed::{
    DownloadOptions, Downloaded, FeedError, FeedQuery, FeedSource, FeedStream, Identity,
    MediaKind, Post,
};
use reelay_media::{ConvertedFile, Transcode, TranscodeError};
use reelay_relay::{sync_profile, PostRelay, ProfileSync, RelaySettings, SyncError, SyncReport};

pub const PARENT: &str = "parent-1";

pub fn video(id: &str, create_time: i64) -> Post {
    Post {
        id: id.to_owned(),
        create_time,
        author: "alice".to_owned(),
        kind: MediaKind::Video,
        hd_size: 0,
        assets: vec![format!("https://cdn.test/{id}.mp4")],
    }
}

pub fn images(id: &str, create_time: i64, hd_size: u64) -> Post {
    Post {
        id: id.to_owned(),
        create_time,
        author: "alice".to_owned(),
        kind: MediaKind::ImageSet,
        hd_size,
        assets: vec![
            format!("https://cdn.test/{id}/0.jpg"),
            format!("https://cdn.test/{id}/1.jpg"),
        ],
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

pub fn resolved(tag: &str, username: &str) -> Profile {
    Profile {
        user_id: Some(format!("id-{username}")),
        thread: Some(format!("thread-{tag}")),
        ..Profile::new(tag, username)
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

pub enum Item {
    Post(Post),
    Broken,
}

#[derive(Clone)]
pub enum Download {
    Files(Vec<Vec<u8>>),
    Fail,
    /// One entry that cannot be read back as a file.
    Unreadable,
}

#[derive(Default)]
pub struct FakeFeed {
    identities: Mutex<HashMap<String, String>>,
    items: Mutex<Vec<Item>>,
    expected: Mutex<Option<usize>>,
    downloads: Mutex<HashMap<String, Download>>,
    cancel_on_stream: Mutex<Option<CancellationToken>>,
    pub resolve_calls: AtomicUsize,
    pub stream_calls: Mutex<Vec<(String, DateTime<Utc>)>>,
    pub download_calls: Mutex<Vec<(String, u32, PathBuf)>>,
}

impl FakeFeed {
    pub fn with_identity(self, username: &str, id: &str) -> Self {
        self.identities
            .lock()
            .unwrap()
            .insert(username.to_owned(), id.to_owned());
        self
    }

    pub fn with_posts(self, posts: Vec<Post>) -> Self {
        *self.items.lock().unwrap() = posts.into_iter().map(Item::Post).collect();
        self
    }

    pub fn with_items(self, items: Vec<Item>) -> Self {
        *self.items.lock().unwrap() = items;
        self
    }

    pub fn with_expected(self, expected: usize) -> Self {
        *self.expected.lock().unwrap() = Some(expected);
        self
    }

    pub fn with_download(self, post_id: &str, download: Download) -> Self {
        self.downloads
            .lock()
            .unwrap()
            .insert(post_id.to_owned(), download);
        self
    }

    pub fn cancel_on_stream(self, token: CancellationToken) -> Self {
        *self.cancel_on_stream.lock().unwrap() = Some(token);
        self
    }

    pub fn streams(&self) -> usize {
        self.stream_calls.lock().unwrap().len()
    }

    pub fn downloads(&self) -> usize {
        self.download_calls.lock().unwrap().len()
    }
}

fn item_error() -> FeedError {
    FeedError::NotFound {
        url: "https://feed.test/broken".to_owned(),
    }
}

#[async_trait]
impl FeedSource for FakeFeed {
    async fn resolve_identity(&self, username: &str) -> Result<Identity, FeedError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.identities
            .lock()
            .unwrap()
            .get(username)
            .map(|id| Identity { id: id.clone() })
            .ok_or_else(|| FeedError::NotFound {
                url: format!("https://feed.test/users/{username}"),
            })
    }

    async fn stream_feed(
        &self,
        username: &str,
        query: FeedQuery,
    ) -> Result<FeedStream, FeedError> {
        self.stream_calls
            .lock()
            .unwrap()
            .push((username.to_owned(), query.resume_after));
        if let Some(token) = self.cancel_on_stream.lock().unwrap().as_ref() {
            token.cancel();
        }

        let items: Vec<Result<Post, FeedError>> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter_map(|item| match item {
                Item::Post(p) if p.created_at() > query.resume_after => Some(Ok(p.clone())),
                Item::Post(_) => None,
                Item::Broken => Some(Err(item_error())),
            })
            .collect();
        let expected = self.expected.lock().unwrap().unwrap_or(items.len());

        Ok(FeedStream {
            expected,
            posts: futures::stream::iter(items).boxed(),
        })
    }

    async fn download(
        &self,
        post: &Post,
        options: &DownloadOptions,
    ) -> Result<Downloaded, FeedError> {
        self.download_calls.lock().unwrap().push((
            post.id.clone(),
            options.attempts,
            options.target_dir.clone(),
        ));
        let plan = self
            .downloads
            .lock()
            .unwrap()
            .get(&post.id)
            .cloned()
            .unwrap_or_else(|| Download::Files(vec![format!("media-{}", post.id).into_bytes()]));

        let name_for = |i: usize| match options.filename {
            Some(template) => template(post, i),
            None => format!("{}_{i}.mp4", post.id),
        };

        let mut downloaded = Downloaded::new(&post.id);
        match plan {
            Download::Fail => {
                return Err(FeedError::UnexpectedStatus {
                    status: 502,
                    url: post.assets.first().cloned().unwrap_or_default(),
                })
            }
            Download::Files(contents) => {
                for (i, bytes) in contents.into_iter().enumerate() {
                    let path = options.target_dir.join(name_for(i));
                    std::fs::write(&path, &bytes).unwrap();
                    downloaded.push(path, bytes.len() as u64);
                }
            }
            Download::Unreadable => {
                let path = options.target_dir.join(name_for(0));
                std::fs::create_dir(&path).unwrap();
                downloaded.push(path, 0);
            }
        }
        Ok(downloaded)
    }
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeDestination {
    pub messages: Mutex<Vec<(String, String)>>,
    pub threads: Mutex<Vec<(String, String, String, ThreadOptions)>>,
    pub files: Mutex<Vec<(String, String, Vec<u8>)>>,
    fail_file_containing: Mutex<Option<String>>,
    fail_messages: AtomicBool,
    fail_threads: AtomicBool,
}

fn api_error(route: &str) -> DestinationError {
    DestinationError::Api {
        status: 500,
        route: route.to_owned(),
        body: "unavailable".to_owned(),
    }
}

impl FakeDestination {
    pub fn fail_files_containing(&self, needle: Option<&str>) {
        *self.fail_file_containing.lock().unwrap() = needle.map(str::to_owned);
    }

    pub fn fail_messages(&self, fail: bool) {
        self.fail_messages.store(fail, Ordering::SeqCst);
    }

    pub fn fail_threads(&self, fail: bool) {
        self.fail_threads.store(fail, Ordering::SeqCst);
    }

    pub fn message_texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl Destination for FakeDestination {
    async fn send_message(&self, channel: &str, text: &str) -> Result<String, DestinationError> {
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(api_error("send_message"));
        }
        let mut messages = self.messages.lock().unwrap();
        messages.push((channel.to_owned(), text.to_owned()));
        Ok(format!("msg-{}", messages.len()))
    }

    async fn create_thread(
        &self,
        parent_channel: &str,
        message_id: &str,
        name: &str,
        options: ThreadOptions,
    ) -> Result<String, DestinationError> {
        if self.fail_threads.load(Ordering::SeqCst) {
            return Err(api_error("create_thread"));
        }
        let mut threads = self.threads.lock().unwrap();
        threads.push((
            parent_channel.to_owned(),
            message_id.to_owned(),
            name.to_owned(),
            options,
        ));
        Ok(format!("thread-{name}"))
    }

    async fn send_file(
        &self,
        channel: &str,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<(), DestinationError> {
        if let Some(needle) = self.fail_file_containing.lock().unwrap().as_deref() {
            if filename.contains(needle) {
                return Err(api_error("send_file"));
            }
        }
        self.files
            .lock()
            .unwrap()
            .push((channel.to_owned(), filename.to_owned(), content));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transcoder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTranscoder {
    fail: AtomicBool,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeTranscoder {
    pub fn failing() -> Self {
        let t = Self::default();
        t.fail.store(true, Ordering::SeqCst);
        t
    }
}

#[async_trait]
impl Transcode for FakeTranscoder {
    async fn convert(
        &self,
        source: &Path,
        work_dir: &Path,
    ) -> Result<ConvertedFile, TranscodeError> {
        self.calls.lock().unwrap().push(source.to_path_buf());
        if self.fail.load(Ordering::SeqCst) {
            return Err(TranscodeError::Failed {
                status: "exit status: 1".to_owned(),
                output: "moov atom not found".to_owned(),
            });
        }
        let mut content = b"converted:".to_vec();
        content.extend(std::fs::read(source).unwrap());
        let out = tempfile::Builder::new()
            .suffix("_reelay.mp4")
            .tempfile_in(work_dir)
            .unwrap()
            .into_temp_path();
        std::fs::write(&out, content).unwrap();
        ConvertedFile::from_temp_path(out).await
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub profiles: Vec<Profile>,
    pub saves: Vec<Profile>,
    pub fail_saves: bool,
}

impl MemoryStore {
    pub fn with(profiles: Vec<Profile>) -> Self {
        Self {
            profiles,
            ..Self::default()
        }
    }

    pub fn get(&self, username: &str) -> Profile {
        self.profiles
            .iter()
            .find(|p| p.username == username)
            .cloned()
            .unwrap()
    }
}

impl ProfileStore for MemoryStore {
    fn profiles(&self) -> Vec<Profile> {
        self.profiles.clone()
    }

    fn save(&mut self, profile: &Profile) -> Result<(), ConfigError> {
        if self.fail_saves {
            return Err(ConfigError::ProfilesFileWrite {
                path: "memory".to_owned(),
                reason: "disk full".to_owned(),
            });
        }
        let slot = self
            .profiles
            .iter_mut()
            .find(|p| p.username == profile.username)
            .ok_or_else(|| ConfigError::UnknownProfile(profile.username.clone()))?;
        *slot = profile.clone();
        self.saves.push(profile.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub feed: Arc<FakeFeed>,
    pub destination: Arc<FakeDestination>,
    pub transcoder: Arc<FakeTranscoder>,
}

impl Harness {
    pub fn new(feed: FakeFeed) -> Self {
        Self {
            feed: Arc::new(feed),
            destination: Arc::new(FakeDestination::default()),
            transcoder: Arc::new(FakeTranscoder::default()),
        }
    }

    pub fn with_transcoder(mut self, transcoder: FakeTranscoder) -> Self {
        self.transcoder = Arc::new(transcoder);
        self
    }

    pub fn relay(&self, settings: RelaySettings) -> PostRelay {
        PostRelay::new(
            self.feed.clone(),
            self.destination.clone(),
            self.transcoder.clone(),
            settings,
        )
    }

    pub fn profile_sync(&self) -> ProfileSync {
        ProfileSync::new(
            self.feed.clone(),
            self.destination.clone(),
            self.relay(RelaySettings::default()),
            PARENT,
        )
    }
}

/// Sync the stored profile for `username`.
pub async fn sync(
    h: &Harness,
    store: &mut MemoryStore,
    username: &str,
) -> Result<SyncReport, SyncError> {
    let profile = store.get(username);
    sync_profile(&h.profile_sync(), store, profile).await
}
