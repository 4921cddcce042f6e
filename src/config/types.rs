//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{expand_home, Identity};

/// Audio format baresip plays into calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz. 8 kHz is what every gateway accepts.
    pub frame_rate: u32,
    /// Channel count. Mono for the same reason.
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            frame_rate: 8000,
            channels: 1,
        }
    }
}

/// What to do with baresip's bundled sounds (ring tones and the like).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sounds {
    /// `true` leaves the config alone, `false` disables sounds.
    Enabled(bool),
    /// Load sounds from this directory instead.
    Directory(PathBuf),
}

impl Default for Sounds {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

/// How baresip itself is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaresipSettings {
    /// Executable name or path.
    pub binary: String,
    /// Directory passed to `baresip -f`.
    pub config_dir: PathBuf,
    pub sounds: Sounds,
    /// How long one read waits before the loop re-checks for shutdown.
    pub read_timeout_ms: u64,
}

fn default_config_dir() -> PathBuf {
    expand_home(PathBuf::from("~/.baresipy"))
}

impl Default for BaresipSettings {
    fn default() -> Self {
        Self {
            binary: "baresip".to_string(),
            config_dir: default_config_dir(),
            sounds: Sounds::default(),
            read_timeout_ms: 1000,
        }
    }
}

impl BaresipSettings {
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// The config directory with a leading `~` expanded.
    #[must_use]
    pub fn resolved_config_dir(&self) -> PathBuf {
        expand_home(self.config_dir.clone())
    }
}

/// Default reactions the session applies on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Quit when registration fails.
    pub quit_on_login_failure: bool,
    /// Hang up when the audio source device cannot be opened. This is
    /// usually a voicemail box that never opens a media stream.
    pub hang_up_on_audio_failure: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            quit_on_login_failure: true,
            hang_up_on_audio_failure: true,
        }
    }
}

/// Configuration for the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub identity: Identity,
    pub audio: AudioConfig,
    pub baresip: BaresipSettings,
    pub policy: SessionPolicy,
}
