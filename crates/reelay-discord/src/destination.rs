use async_trait::async_trait;

use crate::error::DestinationError;

/// Settings for a newly created thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadOptions {
    /// Whether members other than the creator may add people to the thread.
    pub joinable: bool,
    /// Minutes of inactivity before auto-archive. `None` leaves the platform default.
    pub auto_archive_minutes: Option<u32>,
    /// Per-user slow-mode in seconds. `0` disables it.
    pub rate_limit_per_user: u32,
}

impl Default for ThreadOptions {
    fn default() -> Self {
        Self {
            joinable: true,
            auto_archive_minutes: None,
            rate_limit_per_user: 0,
        }
    }
}

/// The messaging platform posts are relayed into.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Post a plain text message and return the new message's id.
    async fn send_message(&self, channel: &str, text: &str) -> Result<String, DestinationError>;

    /// Start a thread rooted at `message_id` in `parent_channel` and return its channel id.
    async fn create_thread(
        &self,
        parent_channel: &str,
        message_id: &str,
        name: &str,
        options: ThreadOptions,
    ) -> Result<String, DestinationError>;

    /// Upload `content` as a single attachment named `filename`.
    async fn send_file(
        &self,
        channel: &str,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<(), DestinationError>;
}
