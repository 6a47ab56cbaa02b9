//! Shared data model and configuration for the reelay workspace.

pub mod app_config;
pub mod config;
pub mod error;
pub mod profiles;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::ConfigError;
pub use profiles::{Profile, ProfileStore, ProfilesFile, YamlProfileStore};
