//! Audio collaborators used by the phone.
//!
//! Each concern sits behind a small trait with a default implementation
//! that shells out to a common tool or writes WAV data with `hound`.

mod convert;
mod player;
mod speech;
mod tones;

pub use convert::*;
pub use player::*;
pub use speech::*;
pub use tones::*;

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Errors from audio conversion, synthesis and playback.
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    /// The external tool is not installed.
    #[error("{0} not found")]
    ToolNotFound(String),
    /// The external tool ran but reported failure.
    #[error("{tool} failed: {stderr}")]
    ToolFailed { tool: String, stderr: String },
    /// The WAV data could not be read or written.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    /// A character that has no DTMF tone.
    #[error("No DTMF tone for {0:?}")]
    InvalidDigit(char),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fresh file path in the driver's scratch directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn scratch_file(stem: &str, extension: &str) -> std::io::Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("baresip-driver-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    Ok(dir.join(format!("{stem}-{n}.{extension}")))
}

/// Run an external tool to completion.
async fn run_tool<I, S>(program: &str, args: I) -> Result<(), AudioError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AudioError::ToolNotFound(program.to_string()),
            _ => AudioError::Io(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AudioError::ToolFailed {
            tool: program.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(())
}
