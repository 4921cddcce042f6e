//! Audio normalization for playback into a call.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::{run_tool, scratch_file, AudioError};

/// Silence appended to every file so the tail is not cut off.
pub const TRAILING_SILENCE: Duration = Duration::from_millis(500);

/// baresip drops audio files shorter than this.
pub const MINIMUM_LENGTH: Duration = Duration::from_secs(3);

/// A WAV file ready for `/ausrc aufile,`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedAudio {
    pub path: PathBuf,
    pub duration: Duration,
}

/// Resamples arbitrary audio to the call format.
#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Convert `source` to a `frame_rate` Hz, `channels`-channel WAV padded
    /// with [`TRAILING_SILENCE`] and to at least [`MINIMUM_LENGTH`].
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be decoded or the output written.
    async fn convert(
        &self,
        source: &Path,
        frame_rate: u32,
        channels: u16,
    ) -> Result<ConvertedAudio, AudioError>;
}

/// [`AudioConverter`] backed by the `ffmpeg` command.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    binary: String,
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegConverter {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// The ffmpeg argument list for one conversion.
    #[must_use]
    pub fn arguments(source: &Path, output: &Path, frame_rate: u32, channels: u16) -> Vec<String> {
        let filter = format!(
            "apad=pad_dur={},apad=whole_dur={}",
            TRAILING_SILENCE.as_secs_f64(),
            MINIMUM_LENGTH.as_secs_f64()
        );
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            source.display().to_string(),
            "-af".to_string(),
            filter,
            "-ar".to_string(),
            frame_rate.to_string(),
            "-ac".to_string(),
            channels.to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            output.display().to_string(),
        ]
    }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn convert(
        &self,
        source: &Path,
        frame_rate: u32,
        channels: u16,
    ) -> Result<ConvertedAudio, AudioError> {
        let output = scratch_file("call-audio", "wav")?;
        tracing::debug!(
            source = %source.display(),
            output = %output.display(),
            frame_rate,
            channels,
            "Converting audio"
        );
        run_tool(
            &self.binary,
            Self::arguments(source, &output, frame_rate, channels),
        )
        .await?;

        let duration = wav_duration(&output)?;
        Ok(ConvertedAudio {
            path: output,
            duration,
        })
    }
}

/// Playing time of a WAV file.
///
/// # Errors
///
/// Returns an error if the file is not a readable WAV.
pub fn wav_duration(path: &Path) -> Result<Duration, AudioError> {
    let reader = hound::WavReader::open(path)?;
    let rate = reader.spec().sample_rate;
    if rate == 0 {
        return Ok(Duration::ZERO);
    }
    Ok(Duration::from_secs_f64(
        f64::from(reader.duration()) / f64::from(rate),
    ))
}
