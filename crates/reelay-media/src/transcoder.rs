//! External encoder invocation.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempPath;
use tokio::process::Command;

use crate::error::TranscodeError;
use crate::scale::{output_suffix, scale_filter, DEFAULT_MAX_DIMENSION};

/// Encodes of short clips finish in seconds; this only catches a wedged encoder.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Re-encodes a source video into a new file inside a work directory.
#[async_trait]
pub trait Transcode: Send + Sync {
    /// Converts `source`, writing the result into `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError`] when the output file cannot be created, the
    /// encoder cannot be started, exits unsuccessfully, or runs past its timeout.
    async fn convert(&self, source: &Path, work_dir: &Path)
        -> Result<ConvertedFile, TranscodeError>;
}

/// A transcoded file on disk. Dropping it deletes the file.
#[derive(Debug)]
pub struct ConvertedFile {
    path: TempPath,
    len: u64,
}

impl ConvertedFile {
    /// Takes ownership of `path`, recording its current size.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError::Open`] if the file metadata cannot be read.
    pub async fn from_temp_path(path: TempPath) -> Result<Self, TranscodeError> {
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|source| TranscodeError::Open {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            path,
            len: meta.len(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes at the time the encoder finished.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the whole file.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError::Open`] on any read failure.
    pub async fn read(&self) -> Result<Vec<u8>, TranscodeError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| TranscodeError::Open {
                path: self.path.display().to_string(),
                source,
            })
    }
}

/// [`Transcode`] backed by an `ffmpeg` binary: H.264 video, AAC audio, fast
/// preset, long side bounded to `max_dimension` pixels.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    max_dimension: u32,
    timeout: Duration,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new(PathBuf::from("ffmpeg"), DEFAULT_MAX_DIMENSION)
    }
}

impl FfmpegTranscoder {
    #[must_use]
    pub fn new(program: PathBuf, max_dimension: u32) -> Self {
        Self {
            program,
            max_dimension,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the maximum wall-clock time a single encode may take.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn program_name(&self) -> String {
        self.program.file_name().map_or_else(
            || self.program.to_string_lossy().into_owned(),
            |n| n.to_string_lossy().into_owned(),
        )
    }

    fn build_args(&self, source: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_owned(),
            "-i".to_owned(),
            source.to_string_lossy().into_owned(),
            "-vf".to_owned(),
            scale_filter(self.max_dimension, self.max_dimension),
            "-vcodec".to_owned(),
            "libx264".to_owned(),
            "-acodec".to_owned(),
            "aac".to_owned(),
            "-preset".to_owned(),
            "fast".to_owned(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Transcode for FfmpegTranscoder {
    async fn convert(
        &self,
        source: &Path,
        work_dir: &Path,
    ) -> Result<ConvertedFile, TranscodeError> {
        let output = tempfile::Builder::new()
            .suffix(&format!("_reelay{}", output_suffix(source)))
            .tempfile_in(work_dir)
            .map_err(|source| TranscodeError::OutputFile {
                dir: work_dir.display().to_string(),
                source,
            })?
            .into_temp_path();

        let args = self.build_args(source, &output);
        tracing::debug!(
            program = %self.program.display(),
            source = %source.display(),
            output = %output.display(),
            "transcoder: starting encode"
        );

        let spawn_err = |source: std::io::Error| TranscodeError::Spawn {
            program: self.program_name(),
            source,
        };

        // Both streams share one pipe so the output keeps the encoder's own ordering.
        let (reader, writer) = std::io::pipe().map_err(spawn_err)?;
        let stderr_writer = writer.try_clone().map_err(spawn_err)?;
        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer)
            .kill_on_drop(true);
        let mut child = command.spawn().map_err(spawn_err)?;
        // The command still owns the parent's write ends; the reader sees EOF
        // only once they are closed.
        drop(command);

        let collect = tokio::task::spawn_blocking(move || read_all(reader));
        let run = async move {
            let status = child.wait().await?;
            let log = collect.await.map_err(std::io::Error::other)??;
            Ok::<_, std::io::Error>((status, log))
        };

        // On timeout `run` is dropped, which drops and kills the child.
        let (status, log) = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_elapsed| TranscodeError::TimedOut(self.timeout))?
            .map_err(spawn_err)?;

        if !status.success() {
            tracing::warn!(
                status = %status,
                source = %source.display(),
                "transcoder: encoder exited unsuccessfully"
            );
            return Err(TranscodeError::Failed {
                status: status.to_string(),
                output: String::from_utf8_lossy(&log).into_owned(),
            });
        }

        let converted = ConvertedFile::from_temp_path(output).await?;
        tracing::debug!(
            bytes = converted.len(),
            output = %converted.path().display(),
            "transcoder: encode finished"
        );
        Ok(converted)
    }
}

fn read_all(mut reader: std::io::PipeReader) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}
