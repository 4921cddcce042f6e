//! Event types recognized in baresip console output.
//!
//! baresip has no machine-readable output mode, so each printed line is
//! mapped to exactly one of these events by the [`Classifier`](super::Classifier).

use serde::{Deserialize, Serialize};

/// One classified line of baresip output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// baresip finished loading its modules.
    Ready,
    /// No user agent is configured yet.
    NoAccounts,
    /// The user agent registered with the gateway.
    LoginSuccess,
    /// Registration was rejected or timed out.
    LoginFailure {
        /// The raw line reporting the failure.
        line: String,
    },
    /// A remote party is calling.
    IncomingCall {
        /// Caller address as printed by baresip.
        number: String,
    },
    /// baresip rejected an incoming call on its own.
    CallRejected {
        /// Caller address.
        number: String,
    },
    /// The remote end is ringing (SIP 180).
    Ringing,
    /// An outgoing call is being set up.
    Connecting {
        /// Dialed address.
        number: String,
    },
    /// Media is flowing in both directions.
    Established,
    /// The call was put on hold.
    Hold {
        /// Rest of the hold line.
        detail: String,
    },
    /// A call ended and baresip reported its duration.
    Terminated {
        /// Duration text, e.g. `00:01:23`.
        duration: String,
    },
    /// The microphone was muted.
    Muted,
    /// The microphone was un-muted.
    Unmuted,
    /// The SIP session was closed.
    SessionClosed {
        /// Reason given by baresip.
        reason: String,
    },
    /// A call listing reported no calls.
    NoActiveCalls,
    /// A `/callstat` dump with a status we do not model.
    DebugStatus {
        /// Status text inside the parentheses.
        status: String,
    },
    /// Elapsed time of the tracked call from a `/listcalls` listing.
    CallTimestamp {
        /// Timestamp text.
        time: String,
    },
    /// baresip could not open the audio source device.
    AudioSourceFailure,
    /// baresip is exiting.
    ProcessTerminated,
    /// A DTMF digit arrived from the remote end.
    DtmfReceived {
        /// The digit.
        digit: char,
        /// Tone duration in milliseconds.
        duration_ms: u32,
    },
    /// Anything else baresip prints.
    Unrecognized {
        /// The raw line.
        line: String,
    },
}

impl Event {
    /// Returns true if this event carries no session meaning.
    #[must_use]
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Self::Unrecognized { .. })
    }
}
