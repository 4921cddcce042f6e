//! Text-to-speech.

use std::path::Path;

use async_trait::async_trait;

use super::{run_tool, AudioError};

/// Turns text into an audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if synthesis fails.
    async fn synthesize(&self, text: &str, output: &Path) -> Result<(), AudioError>;
}

/// [`SpeechSynthesizer`] running a command line engine such as `espeak-ng`.
///
/// The engine is invoked as `<binary> -w <output> <text>`.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    binary: String,
}

impl Default for CommandSpeech {
    fn default() -> Self {
        Self::new("espeak-ng")
    }
}

impl CommandSpeech {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSpeech {
    async fn synthesize(&self, text: &str, output: &Path) -> Result<(), AudioError> {
        tracing::debug!(engine = %self.binary, chars = text.len(), "Synthesizing speech");
        run_tool(
            &self.binary,
            [
                std::ffi::OsStr::new("-w"),
                output.as_os_str(),
                std::ffi::OsStr::new(text),
            ],
        )
        .await
    }
}
