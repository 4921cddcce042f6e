//! The baresip `config` file the driver launches with.
//!
//! The file is loaded from the baresip config directory, or seeded from
//! [`DEFAULT_BARESIP_CONFIG`]. If the driver has to change it, the original
//! text is written to `config.bak` and put back by [`BaresipConfig::restore`].

use std::path::{Path, PathBuf};

use regex::Regex;

use super::{ConfigError, Sounds};

/// Config written when the directory has none.
pub const DEFAULT_BARESIP_CONFIG: &str = "\
#
# baresip configuration
#

# Call
call_local_timeout\t120
call_max_calls\t\t4

# Audio
#audio_path\t\t/usr/share/baresip
audio_player\t\talsa,default
audio_source\t\talsa,default
audio_alert\t\talsa,default
audio_level\t\tno
ausrc_format\t\ts16
auplay_format\t\ts16

# Modules
module_path\t\t/usr/lib/baresip/modules
module\t\t\tstdio.so
module\t\t\tg711.so
module\t\t\talsa.so
module\t\t\taufile.so
module\t\t\tstun.so
module\t\t\tice.so

module_app\t\taccount.so
module_app\t\tmenu.so
";

/// The commented-out default sounds line baresip ships with.
const AUDIO_PATH_LINE: &str = r"(?m)^#audio_path[ \t]+/usr/share/baresip[ \t]*$";

/// Sounds directory that does not exist, which silences baresip.
const DISABLED_AUDIO_PATH: &str = "/dont/load";

/// A baresip config file and the text it started with.
#[derive(Debug, Clone)]
pub struct BaresipConfig {
    dir: PathBuf,
    original: String,
    content: String,
    modified: bool,
    restored: bool,
}

impl BaresipConfig {
    /// Load `<dir>/config`, creating the directory and falling back to the
    /// default config when there is no file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be read.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::WriteError {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = dir.join("config");
        if path.is_file() {
            let content =
                std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
                    path: path.clone(),
                    source: e,
                })?;
            tracing::info!(path = %path.display(), "Loaded baresip config");
            Ok(Self {
                dir: dir.to_path_buf(),
                original: content.clone(),
                content,
                modified: false,
                restored: false,
            })
        } else {
            tracing::info!(path = %path.display(), "No baresip config, using default");
            Ok(Self {
                dir: dir.to_path_buf(),
                original: DEFAULT_BARESIP_CONFIG.to_string(),
                content: DEFAULT_BARESIP_CONFIG.to_string(),
                modified: true,
                restored: false,
            })
        }
    }

    /// Load, apply the sounds setting and write the result.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn prepare(dir: &Path, sounds: &Sounds) -> Result<Self, ConfigError> {
        let mut config = Self::load(dir)?;
        config.apply_sounds(sounds)?;
        config.persist()?;
        Ok(config)
    }

    /// Point baresip's `audio_path` according to `sounds`.
    ///
    /// Only the stock commented-out line is rewritten; a config that already
    /// sets `audio_path` is left alone, and so is a sounds directory that
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the line pattern fails to compile.
    pub fn apply_sounds(&mut self, sounds: &Sounds) -> Result<(), ConfigError> {
        let target = match sounds {
            Sounds::Enabled(true) => return Ok(()),
            Sounds::Enabled(false) => DISABLED_AUDIO_PATH.to_string(),
            Sounds::Directory(dir) if dir.is_dir() => dir.display().to_string(),
            Sounds::Directory(dir) => {
                tracing::warn!(dir = %dir.display(), "Sounds directory does not exist, ignoring");
                return Ok(());
            }
        };

        let line = Regex::new(AUDIO_PATH_LINE)?;
        if !line.is_match(&self.content) {
            tracing::debug!("No stock audio_path line in baresip config");
            return Ok(());
        }
        let replacement = format!("audio_path\t\t{target}");
        self.content = line
            .replace(&self.content, regex::NoExpand(&replacement))
            .into_owned();
        self.modified = true;
        Ok(())
    }

    /// Write `config.bak` with the original text and `config` with the
    /// current text. Does nothing for an unmodified config.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn persist(&self) -> Result<(), ConfigError> {
        if !self.modified {
            return Ok(());
        }
        write_file(&self.backup_path(), &self.original)?;
        tracing::info!(path = %self.config_path().display(), "Saving baresip config");
        write_file(&self.config_path(), &self.content)
    }

    /// Put the original text back if this session changed it.
    ///
    /// Returns whether anything was written. Only the first call writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn restore(&mut self) -> Result<bool, ConfigError> {
        if !self.modified || self.restored {
            return Ok(false);
        }
        tracing::info!(path = %self.config_path().display(), "Restoring original baresip config");
        write_file(&self.config_path(), &self.original)?;
        self.restored = true;
        Ok(true)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dir.join("config")
    }

    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.dir.join("config.bak")
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), ConfigError> {
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}
