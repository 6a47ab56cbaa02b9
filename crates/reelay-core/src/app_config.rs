use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl Environment {
    /// Log filter used when `REELAY_LOG_LEVEL` is not set.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Environment::Development => "debug",
            Environment::Test => "warn",
            Environment::Production => "info",
        }
    }

    /// Whether log output may carry terminal colour codes.
    #[must_use]
    pub fn ansi_logs(&self) -> bool {
        !matches!(self, Environment::Production)
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub profiles_path: PathBuf,
    pub discord_token: String,
    pub discord_api_base: String,
    pub parent_channel: String,
    pub feed_base_url: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub download_attempts: u32,
    pub retry_backoff_base_ms: u64,
    pub ffmpeg_path: PathBuf,
    pub max_dimension: u32,
    pub size_limit_bytes: u64,
    pub inband_markers: bool,
}

impl AppConfig {
    /// Scheduler tick interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("profiles_path", &self.profiles_path)
            .field("discord_token", &"[redacted]")
            .field("discord_api_base", &self.discord_api_base)
            .field("parent_channel", &self.parent_channel)
            .field("feed_base_url", &self.feed_base_url)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("download_attempts", &self.download_attempts)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("max_dimension", &self.max_dimension)
            .field("size_limit_bytes", &self.size_limit_bytes)
            .field("inband_markers", &self.inband_markers)
            .finish()
    }
}
