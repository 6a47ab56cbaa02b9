use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to create output file in {dir}: {source}")]
    OutputFile {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The encoder exited unsuccessfully. `output` is everything it printed.
    #[error("err: {status}\nout: {output}")]
    Failed { status: String, output: String },

    #[error("encoder timed out after {0:?}")]
    TimedOut(Duration),

    #[error("failed to open converted file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
