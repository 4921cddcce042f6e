//! Commands understood by the baresip console.

use std::fmt;
use std::path::PathBuf;

/// Audio source device used when no file is being played into a call.
pub const LIVE_AUDIO_SOURCE: &str = "alsa,default";

/// A single line of input for baresip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Register a new user agent from a SIP URI.
    NewUserAgent(String),
    /// Place a call.
    Dial(String),
    /// Hang up the current call.
    Hangup,
    /// Put the current call on hold.
    Hold,
    /// Resume a held call.
    Resume,
    /// Toggle the microphone. baresip has no separate unmute verb.
    Mute,
    /// Accept the incoming call.
    Accept,
    /// Reject the incoming call (baresip's `b` key).
    Reject,
    /// Print active calls.
    ListCalls,
    /// Print call status.
    CallStatus,
    /// Exit baresip.
    Quit,
    /// Switch the call's audio source to a WAV file.
    AudioSourceFile(PathBuf),
    /// Switch the call's audio source back to the live input device.
    AudioSourceLive,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewUserAgent(uri) => write!(f, "/uanew {uri}"),
            Self::Dial(number) => write!(f, "/dial {number}"),
            Self::Hangup => f.write_str("/hangup"),
            Self::Hold => f.write_str("/hold"),
            Self::Resume => f.write_str("/resume"),
            Self::Mute => f.write_str("/mute"),
            Self::Accept => f.write_str("/accept"),
            Self::Reject => f.write_str("b"),
            Self::ListCalls => f.write_str("/listcalls"),
            Self::CallStatus => f.write_str("/callstat"),
            Self::Quit => f.write_str("/quit"),
            Self::AudioSourceFile(path) => write!(f, "/ausrc aufile,{}", path.display()),
            Self::AudioSourceLive => write!(f, "/ausrc {LIVE_AUDIO_SOURCE}"),
        }
    }
}
