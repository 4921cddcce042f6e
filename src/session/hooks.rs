//! Callbacks fired as the call progresses.

use async_trait::async_trait;

use super::{CallStatus, Notification, Phone};

/// Reactions to session events.
///
/// Every method has a no-op default, so implementors override only what
/// they need. Hooks run on the reader task after the session state has
/// been updated, and may issue commands through the [`Phone`]. A hook
/// that blocks delays every later event.
#[async_trait]
pub trait CallHooks: Send + Sync {
    /// baresip finished starting up.
    async fn on_ready(&self, _phone: &Phone) {}

    /// The account registered; commands are accepted from now on.
    async fn on_login_success(&self, _phone: &Phone) {}

    /// Registration failed.
    async fn on_login_failure(&self, _phone: &Phone) {}

    /// A remote party is calling. Use [`Phone::accept`] or [`Phone::reject`].
    async fn on_incoming_call(&self, _phone: &Phone, _number: &str) {}

    /// baresip rejected a call by itself.
    async fn on_call_rejected(&self, _phone: &Phone, _number: &str) {}

    async fn on_call_ringing(&self, _phone: &Phone, _has_active_call: bool) {}

    async fn on_call_started(&self, _phone: &Phone, _has_active_call: bool) {}

    async fn on_call_established(&self, _phone: &Phone) {}

    async fn on_call_ended(&self, _phone: &Phone, _reason: &str) {}

    async fn on_call_status_changed(
        &self,
        _phone: &Phone,
        _previous: CallStatus,
        _new: CallStatus,
    ) {
    }

    /// Elapsed or final call time as printed by baresip.
    async fn on_call_timestamp(&self, _phone: &Phone, _time: &str) {}

    async fn on_mic_muted(&self, _phone: &Phone) {}

    async fn on_mic_unmuted(&self, _phone: &Phone) {}

    async fn on_dtmf_received(&self, _phone: &Phone, _digit: char, _duration_ms: u32) {}

    async fn on_error(&self, _phone: &Phone, _message: &str) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl CallHooks for NoopHooks {}

/// Invoke the hook matching `notification`.
pub async fn dispatch(hooks: &dyn CallHooks, phone: &Phone, notification: &Notification) {
    match notification {
        Notification::Ready => hooks.on_ready(phone).await,
        Notification::LoginSuccess => hooks.on_login_success(phone).await,
        Notification::LoginFailure => hooks.on_login_failure(phone).await,
        Notification::IncomingCall(number) => hooks.on_incoming_call(phone, number).await,
        Notification::CallRejected(number) => hooks.on_call_rejected(phone, number).await,
        Notification::CallRinging { has_active_call } => {
            hooks.on_call_ringing(phone, *has_active_call).await;
        }
        Notification::CallStarted { has_active_call } => {
            hooks.on_call_started(phone, *has_active_call).await;
        }
        Notification::CallEstablished => hooks.on_call_established(phone).await,
        Notification::CallEnded(reason) => hooks.on_call_ended(phone, reason).await,
        Notification::CallStatusChanged { previous, new } => {
            hooks.on_call_status_changed(phone, *previous, *new).await;
        }
        Notification::CallTimestamp(time) => hooks.on_call_timestamp(phone, time).await,
        Notification::MicMuted => hooks.on_mic_muted(phone).await,
        Notification::MicUnmuted => hooks.on_mic_unmuted(phone).await,
        Notification::DtmfReceived { digit, duration_ms } => {
            hooks.on_dtmf_received(phone, *digit, *duration_ms).await;
        }
        Notification::Error(message) => hooks.on_error(phone, message).await,
    }
}
