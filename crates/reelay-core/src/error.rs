use thiserror::Error;

/// Errors raised while loading configuration or persisting profile state.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read profiles file {path}: {source}")]
    ProfilesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse profiles file: {0}")]
    ProfilesFileParse(#[source] serde_yaml::Error),

    #[error("failed to write profiles file {path}: {reason}")]
    ProfilesFileWrite { path: String, reason: String },

    #[error("profile validation failed: {0}")]
    Validation(String),

    #[error("no profile with username '{0}' in the store")]
    UnknownProfile(String),
}
