//! Video normalisation: re-encodes downloaded clips to size-bounded H.264/AAC.

pub mod error;
pub mod scale;
pub mod transcoder;

pub use error::TranscodeError;
pub use scale::{output_suffix, scale_filter, scaled_dimensions, DEFAULT_MAX_DIMENSION};
pub use transcoder::{ConvertedFile, FfmpegTranscoder, Transcode};
