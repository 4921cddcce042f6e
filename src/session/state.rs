//! Call state machine.
//!
//! The machine owns everything the reader loop learns from baresip. It
//! never performs I/O: [`CallStateMachine::apply`] returns the hook
//! notifications to fire and the follow-up action for the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::baresip::Event;
use crate::config::SessionPolicy;

/// Error text reported when baresip cannot open the audio source.
pub const AUDIO_SOURCE_FAILURE: &str = "failed to set audio-source (No such device)";

/// Lifecycle status of the current call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    #[default]
    None,
    Incoming,
    Outgoing,
    Ringing,
    Established,
    OnHold,
    Disconnected,
    Unknown,
}

impl CallStatus {
    /// Whether a call is in progress in this status.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Incoming | Self::Outgoing | Self::Ringing | Self::Established | Self::OnHold
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Incoming => "INCOMING",
            Self::Outgoing => "OUTGOING",
            Self::Ringing => "RINGING",
            Self::Established => "ESTABLISHED",
            Self::OnHold => "ON_HOLD",
            Self::Disconnected => "DISCONNECTED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hook invocation requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Ready,
    LoginSuccess,
    LoginFailure,
    IncomingCall(String),
    CallRejected(String),
    CallRinging { has_active_call: bool },
    CallStarted { has_active_call: bool },
    CallEstablished,
    CallEnded(String),
    CallStatusChanged { previous: CallStatus, new: CallStatus },
    CallTimestamp(String),
    MicMuted,
    MicUnmuted,
    DtmfReceived { digit: char, duration_ms: u32 },
    Error(String),
}

/// What the session has to do after an event, besides firing hooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventAction {
    /// Keep reading.
    #[default]
    Continue,
    /// Register the configured account with baresip.
    CreateAccount,
    /// Quit the session.
    Shutdown,
    /// Hang up the current call.
    HangUp,
    /// baresip is exiting; stop reading.
    Stop,
}

/// Result of applying one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub notifications: Vec<Notification>,
    pub action: EventAction,
}

impl Outcome {
    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub running: bool,
    pub ready: bool,
    pub aborted: bool,
    pub mic_muted: bool,
    pub current_call: Option<String>,
    pub call_status: CallStatus,
    pub previous_call_status: CallStatus,
}

/// Session state driven by classified baresip output.
#[derive(Debug, Clone, Default)]
pub struct CallStateMachine {
    running: bool,
    ready: bool,
    aborted: bool,
    mic_muted: bool,
    current_call: Option<String>,
    call_status: CallStatus,
    previous_call_status: CallStatus,
    last_line: String,
    last_timestamp: Option<String>,
}

impl CallStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `status`, remembering the status it replaces.
    ///
    /// Leaving the active statuses forgets the tracked call.
    pub fn transition(&mut self, status: CallStatus) -> Notification {
        self.previous_call_status = self.call_status;
        self.call_status = status;
        if !status.is_active() {
            self.current_call = None;
        }
        tracing::debug!(
            from = %self.previous_call_status,
            to = %self.call_status,
            "Call status transition"
        );
        Notification::CallStatusChanged {
            previous: self.previous_call_status,
            new: self.call_status,
        }
    }

    /// Apply one classified event.
    pub fn apply(&mut self, event: &Event, policy: &SessionPolicy) -> Outcome {
        let mut out = Outcome::default();
        match event {
            Event::Ready => {
                tracing::info!("baresip is ready for instructions");
                out.notify(Notification::Ready);
            }
            Event::NoAccounts => {
                tracing::debug!("No accounts in baresip, creating one");
                out.action = EventAction::CreateAccount;
            }
            Event::LoginSuccess => {
                self.ready = true;
                tracing::info!("Logged in");
                out.notify(Notification::LoginSuccess);
            }
            Event::LoginFailure { line } => {
                tracing::error!(line = %line, "Login failed");
                out.notify(Notification::Error(line.clone()));
                out.notify(Notification::LoginFailure);
                if policy.quit_on_login_failure {
                    out.action = EventAction::Shutdown;
                }
            }
            Event::IncomingCall { number } => {
                tracing::info!(number = %number, "Incoming call");
                self.current_call = Some(number.clone());
                out.notify(self.transition(CallStatus::Incoming));
                out.notify(Notification::IncomingCall(number.clone()));
            }
            Event::CallRejected { number } => {
                tracing::info!(number = %number, "Rejected incoming call");
                out.notify(Notification::CallRejected(number.clone()));
            }
            Event::Ringing => {
                let has_active_call = self.log_call_phase("Ringing");
                out.notify(Notification::CallRinging { has_active_call });
                out.notify(self.transition(CallStatus::Ringing));
            }
            Event::Connecting { number } => {
                self.current_call = Some(number.clone());
                let has_active_call = self.log_call_phase("Calling");
                out.notify(Notification::CallStarted { has_active_call });
                out.notify(self.transition(CallStatus::Outgoing));
            }
            Event::Established => {
                out.notify(self.transition(CallStatus::Established));
                out.notify(Notification::CallEstablished);
            }
            Event::Hold { detail } => {
                tracing::info!(detail = %detail, "Call on hold");
                out.notify(self.transition(CallStatus::OnHold));
            }
            Event::Terminated { duration } => {
                out.notify(self.transition(CallStatus::Disconnected));
                out.notify(Notification::CallTimestamp(duration.clone()));
                self.mic_muted = false;
            }
            Event::Muted => {
                self.mic_muted = true;
                out.notify(Notification::MicMuted);
            }
            Event::Unmuted => {
                self.mic_muted = false;
                out.notify(Notification::MicUnmuted);
            }
            Event::SessionClosed { reason } => {
                out.notify(self.transition(CallStatus::Disconnected));
                out.notify(Notification::CallEnded(reason.clone()));
                self.mic_muted = false;
            }
            Event::NoActiveCalls => {
                out.notify(self.transition(CallStatus::Disconnected));
            }
            Event::DebugStatus { status } => {
                tracing::warn!(status = %status, "Unmodelled call status, treating as unknown");
                out.notify(self.transition(CallStatus::Unknown));
            }
            Event::CallTimestamp { time } => {
                if self.last_timestamp.as_deref() != Some(time.as_str()) {
                    self.last_timestamp = Some(time.clone());
                    out.notify(Notification::CallTimestamp(time.clone()));
                }
            }
            Event::AudioSourceFailure => {
                out.notify(Notification::Error(AUDIO_SOURCE_FAILURE.to_string()));
                if policy.hang_up_on_audio_failure {
                    out.action = EventAction::HangUp;
                }
            }
            Event::ProcessTerminated => {
                self.running = false;
                out.action = EventAction::Stop;
            }
            Event::DtmfReceived { digit, duration_ms } => {
                out.notify(Notification::DtmfReceived {
                    digit: *digit,
                    duration_ms: *duration_ms,
                });
            }
            Event::Unrecognized { .. } => {}
        }
        out
    }

    fn log_call_phase(&self, phase: &str) -> bool {
        if let Some(ref number) = self.current_call {
            tracing::info!(number = %number, "{phase}");
            true
        } else {
            tracing::error!("{phase} without a tracked call");
            false
        }
    }

    /// Forget the current call after a local hang up.
    pub fn hang_up(&mut self) {
        self.current_call = None;
        self.transition(CallStatus::None);
    }

    /// Clear the session when it shuts down.
    pub fn reset(&mut self) {
        self.running = false;
        self.ready = false;
        self.aborted = true;
        self.mic_muted = false;
        self.current_call = None;
        self.transition(CallStatus::None);
    }

    /// Record `line` as the lookback for the next one.
    pub fn remember_line(&mut self, line: &str) {
        line.clone_into(&mut self.last_line);
    }

    #[must_use]
    pub fn last_line(&self) -> &str {
        &self.last_line
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    #[must_use]
    pub fn is_mic_muted(&self) -> bool {
        self.mic_muted
    }

    #[must_use]
    pub fn current_call(&self) -> Option<&str> {
        self.current_call.as_deref()
    }

    #[must_use]
    pub fn call_status(&self) -> CallStatus {
        self.call_status
    }

    #[must_use]
    pub fn previous_call_status(&self) -> CallStatus {
        self.previous_call_status
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            running: self.running,
            ready: self.ready,
            aborted: self.aborted,
            mic_muted: self.mic_muted,
            current_call: self.current_call.clone(),
            call_status: self.call_status,
            previous_call_status: self.previous_call_status,
        }
    }
}
