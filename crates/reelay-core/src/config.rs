use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation are decoupled from the real environment so tests can
/// drive them with a plain `HashMap`.
///
/// # Errors
///
/// Returns `ConfigError` if required values are missing or any value is invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        match lookup(var) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(ConfigError::MissingEnvVar(var.to_string())),
        }
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let discord_token = require("REELAY_DISCORD_TOKEN")?;
    let parent_channel = require("REELAY_PARENT_CHANNEL")?;
    let feed_base_url = require("REELAY_FEED_BASE_URL")?;

    let env = parse_environment(&or_default("REELAY_ENV", "development"))?;
    let log_level = or_default("REELAY_LOG_LEVEL", env.default_log_level());
    let profiles_path = PathBuf::from(or_default(
        "REELAY_PROFILES_PATH",
        "./config/profiles.yaml",
    ));
    let discord_api_base = or_default("REELAY_DISCORD_API_BASE", "https://discord.com/api/v10");

    let poll_interval_secs = parse_u64("REELAY_POLL_INTERVAL_SECS", "900")?;
    if poll_interval_secs == 0 {
        return Err(invalid(
            "REELAY_POLL_INTERVAL_SECS",
            "must be greater than zero".to_string(),
        ));
    }

    let request_timeout_secs = parse_u64("REELAY_REQUEST_TIMEOUT_SECS", "60")?;
    let user_agent = or_default("REELAY_USER_AGENT", "reelay/0.1 (content-relay)");

    let download_attempts = parse_u32("REELAY_DOWNLOAD_ATTEMPTS", "4")?;
    if download_attempts == 0 {
        return Err(invalid(
            "REELAY_DOWNLOAD_ATTEMPTS",
            "at least one attempt is required".to_string(),
        ));
    }
    let retry_backoff_base_ms = parse_u64("REELAY_RETRY_BACKOFF_BASE_MS", "500")?;

    let ffmpeg_path = PathBuf::from(or_default("REELAY_FFMPEG_PATH", "ffmpeg"));
    let max_dimension = parse_u32("REELAY_MAX_DIMENSION", "1920")?;
    if max_dimension < 2 {
        return Err(invalid(
            "REELAY_MAX_DIMENSION",
            "must be at least 2".to_string(),
        ));
    }
    let size_limit_bytes = parse_u64("REELAY_SIZE_LIMIT_BYTES", "26214400")?;
    let inband_markers = parse_bool("REELAY_INBAND_MARKERS", "true")?;

    Ok(AppConfig {
        env,
        log_level,
        profiles_path,
        discord_token,
        discord_api_base,
        parent_channel,
        feed_base_url,
        poll_interval_secs,
        request_timeout_secs,
        user_agent,
        download_attempts,
        retry_backoff_base_ms,
        ffmpeg_path,
        max_dimension,
        size_limit_bytes,
        inband_markers,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "REELAY_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
