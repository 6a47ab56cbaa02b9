//! HTTP client for the JSON feed gateway.
//!
//! Endpoints:
//!
//! - `GET {base}/users/{username}` → `{"id": "..."}`
//! - `GET {base}/users/{username}/posts?after=<epoch>[&cursor=<c>]` →
//!   `{"total": n, "posts": [...], "next_cursor": "..." | null}`
//!
//! Pages are fetched lazily as the returned stream is polled. Each post object
//! is decoded on its own so one malformed item does not poison the page.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response, Url};
use serde::Deserialize;

use crate::error::FeedError;
use crate::retry::retry_with_backoff;
use crate::source::FeedSource;
use crate::types::{DownloadOptions, Downloaded, FeedQuery, FeedStream, Identity, MediaKind, Post};

/// Maximum number of feed pages followed in one enumeration.
/// Guards against gateways that hand back a cycling cursor.
pub(crate) const MAX_PAGES: usize = 200;

/// Retries for identity and page requests. Asset downloads use the caller's
/// attempt budget instead.
const REQUEST_RETRIES: u32 = 2;

/// Client for the feed gateway. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    base_url: Url,
    backoff_base_ms: u64,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    posts: Vec<serde_json::Value>,
    #[serde(default)]
    next_cursor: Option<String>,
}

struct Page {
    total: usize,
    items: Vec<Result<Post, FeedError>>,
    next_cursor: Option<String>,
}

/// Lazy enumeration state threaded through `stream::unfold`.
struct Cursor {
    client: FeedClient,
    username: String,
    after: DateTime<Utc>,
    pending: Option<Vec<Result<Post, FeedError>>>,
    next: Option<String>,
    pages: usize,
}

impl FeedClient {
    /// Creates a client for the gateway at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidBaseUrl`] if `base_url` is not an absolute
    /// hierarchical URL, or [`FeedError::Http`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        backoff_base_ms: u64,
    ) -> Result<Self, FeedError> {
        let invalid = |reason: String| FeedError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason,
        };
        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("URL cannot be a base".to_owned()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: parsed,
            backoff_base_ms,
        })
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn posts_url(&self, username: &str, after: DateTime<Utc>, cursor: Option<&str>) -> Url {
        let mut url = self.endpoint(&["users", username, "posts"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("after", &after.timestamp().to_string());
            if let Some(c) = cursor {
                pairs.append_pair("cursor", c);
            }
        }
        url
    }

    async fn get_json(&self, url: &Url) -> Result<serde_json::Value, FeedError> {
        retry_with_backoff(REQUEST_RETRIES, self.backoff_base_ms, || async {
            let response = self.client.get(url.clone()).send().await?;
            let body = check_status(response)?.text().await?;
            serde_json::from_str::<serde_json::Value>(&body).map_err(|e| FeedError::Deserialize {
                context: url.to_string(),
                source: e,
            })
        })
        .await
    }

    async fn fetch_page(
        &self,
        username: &str,
        after: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<Page, FeedError> {
        let url = self.posts_url(username, after, cursor);
        let body = self.get_json(&url).await?;
        let raw: RawPage = serde_json::from_value(body).map_err(|e| FeedError::Deserialize {
            context: url.to_string(),
            source: e,
        })?;
        Ok(parse_page(raw, username, after))
    }

    async fn fetch_asset(&self, asset: &str) -> Result<Vec<u8>, FeedError> {
        let response = self.client.get(asset).send().await?;
        let bytes = check_status(response)?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn resolve_identity(&self, username: &str) -> Result<Identity, FeedError> {
        let url = self.endpoint(&["users", username]);
        let body = self.get_json(&url).await?;
        serde_json::from_value(body).map_err(|e| FeedError::Deserialize {
            context: format!("identity of {username}"),
            source: e,
        })
    }

    async fn stream_feed(
        &self,
        username: &str,
        query: FeedQuery,
    ) -> Result<FeedStream, FeedError> {
        let first = self.fetch_page(username, query.resume_after, None).await?;
        let expected = first.total;

        let cursor = Cursor {
            client: self.clone(),
            username: username.to_owned(),
            after: query.resume_after,
            pending: Some(first.items),
            next: first.next_cursor,
            pages: 1,
        };

        let posts = stream::unfold(cursor, |mut st| async move {
            if let Some(items) = st.pending.take() {
                return Some((items, st));
            }
            let next = st.next.take()?;
            if st.pages >= MAX_PAGES {
                let err = FeedError::PaginationLimit {
                    username: st.username.clone(),
                    max_pages: MAX_PAGES,
                };
                return Some((vec![Err(err)], st));
            }
            st.pages += 1;
            match st.client.fetch_page(&st.username, st.after, Some(&next)).await {
                Ok(page) => {
                    st.next = page.next_cursor;
                    Some((page.items, st))
                }
                // `next` is already consumed, so the stream ends after this item.
                Err(e) => Some((vec![Err(e)], st)),
            }
        })
        .flat_map(stream::iter)
        .boxed();

        Ok(FeedStream { expected, posts })
    }

    async fn download(
        &self,
        post: &Post,
        options: &DownloadOptions,
    ) -> Result<Downloaded, FeedError> {
        if post.assets.is_empty() {
            return Err(FeedError::NoAssets {
                post_id: post.id.clone(),
            });
        }

        let max_retries = options.attempts.saturating_sub(1);
        let mut downloaded = Downloaded::new(post.id.clone());

        for (index, asset) in post.assets.iter().enumerate() {
            let name = match options.filename {
                Some(template) => template(post, index),
                None => default_filename(post, index, asset),
            };
            let target = options.target_dir.join(sanitize_filename(&name));

            let bytes =
                retry_with_backoff(max_retries, self.backoff_base_ms, || self.fetch_asset(asset))
                    .await?;

            tokio::fs::write(&target, &bytes)
                .await
                .map_err(|e| FeedError::Io {
                    path: target.display().to_string(),
                    source: e,
                })?;

            tracing::debug!(
                post_id = %post.id,
                file = %target.display(),
                bytes = bytes.len(),
                "feed: asset downloaded"
            );
            downloaded.push(target, bytes.len() as u64);
        }

        Ok(downloaded)
    }
}

/// Maps non-2xx responses onto typed errors.
fn check_status(response: Response) -> Result<Response, FeedError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    Err(match status.as_u16() {
        404 => FeedError::NotFound { url },
        429 => FeedError::RateLimited { url },
        code => FeedError::UnexpectedStatus { status: code, url },
    })
}

/// Decodes each post on its own and drops anything at or before the watermark.
fn parse_page(raw: RawPage, username: &str, after: DateTime<Utc>) -> Page {
    let items = raw
        .posts
        .into_iter()
        .map(|value| {
            serde_json::from_value::<Post>(value).map_err(|e| FeedError::Deserialize {
                context: format!("post in feed of {username}"),
                source: e,
            })
        })
        .filter(|item| match item {
            Ok(post) => post.create_time > after.timestamp(),
            Err(_) => true,
        })
        .collect();

    Page {
        total: raw.total,
        items,
        next_cursor: raw.next_cursor.filter(|c| !c.is_empty()),
    }
}

/// `<post-id>_<index><ext>`, with the extension taken from the asset URL path.
fn default_filename(post: &Post, index: usize, asset: &str) -> String {
    let ext = Url::parse(asset)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_owned))
        })
        .and_then(|last| {
            Path::new(&last)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
        })
        .unwrap_or_else(|| match post.kind {
            MediaKind::Video => ".mp4".to_owned(),
            MediaKind::ImageSet => ".jpg".to_owned(),
        });
    format!("{}_{index}{ext}", post.id)
}

/// Keeps generated names inside the target directory.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "asset".to_owned(),
        _ => cleaned,
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
