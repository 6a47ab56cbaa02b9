//! HTTP client for the Discord REST API (v10 routes).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};

use crate::destination::{Destination, ThreadOptions};
use crate::error::DestinationError;
use crate::rate_limit::retry_with_backoff;

const DEFAULT_BASE_URL: &str = "https://discord.com/api/v10";

/// Discord rejects thread names longer than this many characters.
const MAX_THREAD_NAME_CHARS: usize = 100;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Bot-authenticated Discord client.
///
/// Use [`DiscordClient::new`] for production or [`DiscordClient::with_base_url`]
/// to point at a mock server in tests.
pub struct DiscordClient {
    client: Client,
    token: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct StartThread<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_archive_duration: Option<u32>,
    invitable: bool,
    rate_limit_per_user: u32,
}

#[derive(Serialize)]
struct AttachmentRef<'a> {
    id: u32,
    filename: &'a str,
}

#[derive(Serialize)]
struct FilePayload<'a> {
    attachments: [AttachmentRef<'a>; 1],
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient")
            .field("token", &"[redacted]")
            .field("base_url", &self.base_url.as_str())
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .finish_non_exhaustive()
    }
}

impl DiscordClient {
    /// Creates a client pointed at the production Discord API.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(token: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, DestinationError> {
        Self::with_base_url(token, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`DestinationError::InvalidBaseUrl`] if
    /// `base_url` is not an absolute hierarchical URL.
    pub fn with_base_url(
        token: &str,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, DestinationError> {
        let invalid = |reason: String| DestinationError::InvalidBaseUrl {
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
            token: token.to_owned(),
            base_url: parsed,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    /// Overrides the retry policy for rate-limited requests.
    #[must_use]
    pub fn with_retry_policy(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Overrides only the base delay of the rate-limit backoff, keeping the
    /// default retry count.
    #[must_use]
    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    fn route(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn post(&self, url: &Url) -> RequestBuilder {
        self.client
            .post(url.clone())
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
    }

    async fn send_for_id(
        &self,
        route: &str,
        request: RequestBuilder,
    ) -> Result<String, DestinationError> {
        let response = check_status(route, request.send().await?).await?;
        let body = response.text().await?;
        let created: Created =
            serde_json::from_str(&body).map_err(|e| DestinationError::Deserialize {
                context: route.to_owned(),
                source: e,
            })?;
        Ok(created.id)
    }
}

#[async_trait]
impl Destination for DiscordClient {
    async fn send_message(&self, channel: &str, text: &str) -> Result<String, DestinationError> {
        let url = self.route(&["channels", channel, "messages"]);
        let route = format!("POST /channels/{channel}/messages");
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let request = self.post(&url).json(&CreateMessage { content: text });
            self.send_for_id(&route, request)
        })
        .await
    }

    async fn create_thread(
        &self,
        parent_channel: &str,
        message_id: &str,
        name: &str,
        options: ThreadOptions,
    ) -> Result<String, DestinationError> {
        let url = self.route(&["channels", parent_channel, "messages", message_id, "threads"]);
        let route = format!("POST /channels/{parent_channel}/messages/{message_id}/threads");
        let name = truncate_chars(name, MAX_THREAD_NAME_CHARS);
        let body = StartThread {
            name: &name,
            auto_archive_duration: options.auto_archive_minutes,
            invitable: options.joinable,
            rate_limit_per_user: options.rate_limit_per_user,
        };
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.send_for_id(&route, self.post(&url).json(&body))
        })
        .await
    }

    async fn send_file(
        &self,
        channel: &str,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<(), DestinationError> {
        let url = self.route(&["channels", channel, "messages"]);
        let route = format!("POST /channels/{channel}/messages (attachment)");
        let payload = serde_json::to_string(&FilePayload {
            attachments: [AttachmentRef { id: 0, filename }],
        })
        .map_err(|e| DestinationError::Deserialize {
            context: route.clone(),
            source: e,
        })?;

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            // Multipart forms are single-use, so each attempt builds its own.
            let form = Form::new().text("payload_json", payload.clone()).part(
                "files[0]",
                Part::bytes(content.clone()).file_name(filename.to_owned()),
            );
            let request = self.post(&url).multipart(form);
            let route = route.as_str();
            async move {
                check_status(route, request.send().await?).await?;
                Ok(())
            }
        })
        .await
    }
}

/// Maps non-2xx responses onto typed errors, decoding `retry_after` on 429.
async fn check_status(route: &str, response: Response) -> Result<Response, DestinationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 429 {
        return Err(DestinationError::RateLimited {
            route: route.to_owned(),
            retry_after_ms: parse_retry_after_ms(&body),
        });
    }
    Err(DestinationError::Api {
        status: status.as_u16(),
        route: route.to_owned(),
        body,
    })
}

/// Reads `retry_after` (fractional seconds) from a 429 body; `0` when absent.
fn parse_retry_after_ms(body: &str) -> u64 {
    serde_json::from_str::<RateLimitBody>(body)
        .ok()
        .filter(|b| b.retry_after.is_finite() && b.retry_after > 0.0)
        .map_or(0, |b| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let ms = (b.retry_after * 1000.0).ceil() as u64;
            ms
        })
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
