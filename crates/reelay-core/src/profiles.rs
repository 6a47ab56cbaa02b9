//! Tracked source profiles and their on-disk store.
//!
//! The store follows a "load all, mutate, write all back" model: every save
//! rewrites the whole YAML document atomically so a crash never leaves a
//! half-written file behind.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One tracked source whose feed is relayed into its own destination thread.
///
/// `user_id` and `thread` start out empty and are filled in at most once;
/// after that they are treated as immutable facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub tag: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upload: Option<DateTime<Utc>>,
}

impl Profile {
    #[must_use]
    pub fn new(tag: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            username: username.into(),
            user_id: None,
            thread: None,
            last_upload: None,
        }
    }

    /// Only posts created strictly after this instant are requested.
    ///
    /// A profile that has never been synced resumes from the Unix epoch.
    #[must_use]
    pub fn resume_after(&self) -> DateTime<Utc> {
        self.last_upload.unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Advance the watermark, never moving it backwards.
    ///
    /// Returns `true` if the stored value changed.
    pub fn advance_watermark(&mut self, observed: DateTime<Utc>) -> bool {
        match self.last_upload {
            Some(current) if current >= observed => false,
            _ => {
                self.last_upload = Some(observed);
                true
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

/// Persistence seam for profile state.
///
/// `save` must be synchronous and durable before it returns: callers rely on
/// it happening-before the next step that depends on the saved field. It is
/// a blocking call; async callers should move it off the worker thread (the
/// relay does so with `tokio::task::block_in_place`).
pub trait ProfileStore {
    /// Snapshot of every profile, in configuration order.
    fn profiles(&self) -> Vec<Profile>;

    /// Replace the stored record that has the same `username` and persist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProfile`] if no record matches, or a
    /// write error if persisting fails.
    fn save(&mut self, profile: &Profile) -> Result<(), ConfigError>;
}

/// [`ProfileStore`] backed by a YAML document on disk.
#[derive(Debug)]
pub struct YamlProfileStore {
    path: PathBuf,
    file: ProfilesFile,
}

impl YamlProfileStore {
    /// Load and validate the profile store at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ProfilesFileIo {
            path: path.display().to_string(),
            source: e,
        })?;

        let file: ProfilesFile =
            serde_yaml::from_str(&content).map_err(ConfigError::ProfilesFileParse)?;

        validate_profiles(&file)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole document to a sibling temp file, then rename it into place.
    fn write_back(&self) -> Result<(), ConfigError> {
        let write_err = |reason: String| ConfigError::ProfilesFileWrite {
            path: self.path.display().to_string(),
            reason,
        };

        let rendered = serde_yaml::to_string(&self.file).map_err(|e| write_err(e.to_string()))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_err(e.to_string()))?;
        tmp.write_all(rendered.as_bytes())
            .map_err(|e| write_err(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| write_err(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| write_err(e.error.to_string()))?;
        Ok(())
    }
}

impl ProfileStore for YamlProfileStore {
    fn profiles(&self) -> Vec<Profile> {
        self.file.profiles.clone()
    }

    fn save(&mut self, profile: &Profile) -> Result<(), ConfigError> {
        let slot = self
            .file
            .profiles
            .iter_mut()
            .find(|p| p.username.eq_ignore_ascii_case(&profile.username))
            .ok_or_else(|| ConfigError::UnknownProfile(profile.username.clone()))?;
        *slot = profile.clone();
        self.write_back()
    }
}

fn validate_profiles(file: &ProfilesFile) -> Result<(), ConfigError> {
    let mut seen_usernames = HashSet::new();
    let mut seen_tags = HashSet::new();

    for profile in &file.profiles {
        if profile.tag.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "profile '{}' has an empty tag",
                profile.username
            )));
        }

        if profile.username.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "profile '{}' has an empty username",
                profile.tag
            )));
        }

        if !seen_usernames.insert(profile.username.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate username: '{}'",
                profile.username
            )));
        }

        if !seen_tags.insert(profile.tag.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate tag: '{}'",
                profile.tag
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "profiles_test.rs"]
mod tests;
