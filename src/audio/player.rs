//! Local audio playback through the speakers.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Child;
use tokio::sync::Mutex;

use super::AudioError;

/// Plays audio files locally, outside any call.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play `path`. With `blocking` this returns when playback ends,
    /// otherwise playback continues in the background until [`stop`](Self::stop).
    ///
    /// # Errors
    ///
    /// Returns an error if the player cannot be started or fails.
    async fn play(&self, path: &Path, blocking: bool) -> Result<(), AudioError>;

    /// Stop background playback, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the player process cannot be killed.
    async fn stop(&self) -> Result<(), AudioError>;
}

/// [`AudioPlayer`] running `aplay <file>` or another command of that shape.
#[derive(Debug)]
pub struct LocalPlayer {
    program: String,
    current: Mutex<Option<Child>>,
}

impl Default for LocalPlayer {
    fn default() -> Self {
        Self::new("aplay")
    }
}

impl LocalPlayer {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            current: Mutex::new(None),
        }
    }

    fn command(&self, path: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> AudioError {
        match e.kind() {
            std::io::ErrorKind::NotFound => AudioError::ToolNotFound(self.program.clone()),
            _ => AudioError::Io(e),
        }
    }

    /// Whether background playback is still running.
    pub async fn is_playing(&self) -> bool {
        let mut current = self.current.lock().await;
        match current.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

#[async_trait]
impl AudioPlayer for LocalPlayer {
    async fn play(&self, path: &Path, blocking: bool) -> Result<(), AudioError> {
        self.stop().await?;
        tracing::info!(file = %path.display(), blocking, "Playing audio locally");

        if blocking {
            let output = self
                .command(path)
                .output()
                .await
                .map_err(|e| self.spawn_error(e))?;
            if !output.status.success() {
                return Err(AudioError::ToolFailed {
                    tool: self.program.clone(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            return Ok(());
        }

        let child = self.command(path).spawn().map_err(|e| self.spawn_error(e))?;
        *self.current.lock().await = Some(child);
        Ok(())
    }

    async fn stop(&self) -> Result<(), AudioError> {
        let child = self.current.lock().await.take();
        if let Some(mut child) = child {
            if matches!(child.try_wait(), Ok(None)) {
                tracing::debug!(pid = ?child.id(), "Stopping local playback");
                child.kill().await?;
            }
        }
        Ok(())
    }
}
