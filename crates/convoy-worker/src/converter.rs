//! MP4 to MP3 conversion.

use anyhow::Context;
use async_trait::async_trait;
use convoy_core::UploadTask;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;

const INPUT_FILE: &str = "input.mp4";
const OUTPUT_FILE: &str = "output.mp3";
const MAX_STDERR_CHARS: usize = 2000;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Conversion failed: {0}")]
    Failed(String),

    #[error("Conversion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Conversion I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output of a successful conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedArtifact {
    pub data: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

impl ConvertedArtifact {
    /// MP3 artifact named after the task's original file
    pub fn mp3(task: &UploadTask, data: Vec<u8>) -> Self {
        Self {
            data,
            filename: mp3_filename(&task.original_filename),
            content_type: "audio/mpeg".to_string(),
        }
    }
}

/// `clip.mp4` -> `clip.mp3`; names without a stem fall back to `audio.mp3`.
pub fn mp3_filename(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("audio");
    format!("{}.mp3", stem)
}

/// Last `MAX_STDERR_CHARS` characters of ffmpeg's stderr, where the error is.
fn stderr_tail(stderr: &str) -> &str {
    let start = stderr
        .char_indices()
        .rev()
        .nth(MAX_STDERR_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    stderr[start..].trim()
}

#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert the source bytes of `task`. Errors are final for this input.
    async fn convert(
        &self,
        task: &UploadTask,
        input: Vec<u8>,
    ) -> Result<ConvertedArtifact, ConversionError>;
}

/// Extracts the audio track with an ffmpeg subprocess
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    ffmpeg_path: String,
}

impl FfmpegConverter {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Check that the configured binary runs.
    pub async fn verify(&self) -> anyhow::Result<()> {
        let status = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("Failed to execute '{}'", self.ffmpeg_path))?;

        if !status.success() {
            anyhow::bail!("'{} -version' exited with {}", self.ffmpeg_path, status);
        }
        Ok(())
    }

    async fn run(&self, input_path: &Path, output_path: &Path) -> Result<(), ConversionError> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-nostdin")
            .arg("-y")
            .arg("-i")
            .arg(input_path)
            .args(["-vn", "-codec:a", "libmp3lame", "-q:a", "2", "-f", "mp3"])
            .arg(output_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConversionError::Failed(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&stderr)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    #[tracing::instrument(skip(self, task, input), fields(source = %task.source_blob_id, size_bytes = input.len()))]
    async fn convert(
        &self,
        task: &UploadTask,
        input: Vec<u8>,
    ) -> Result<ConvertedArtifact, ConversionError> {
        let temp_dir = TempDir::new()?;
        let input_path = temp_dir.path().join(INPUT_FILE);
        let output_path = temp_dir.path().join(OUTPUT_FILE);

        tokio::fs::write(&input_path, &input).await?;
        drop(input);

        let start = std::time::Instant::now();
        self.run(&input_path, &output_path).await?;

        let data = tokio::fs::read(&output_path).await?;
        if data.is_empty() {
            return Err(ConversionError::Failed(
                "ffmpeg produced no audio output".to_string(),
            ));
        }

        tracing::info!(
            output_bytes = data.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "ffmpeg conversion finished"
        );

        Ok(ConvertedArtifact::mp3(task, data))
    }
}
