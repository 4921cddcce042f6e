//! The loop that turns baresip output into session updates.

use std::sync::Arc;

use crate::baresip::{Event, LineContext, ReadError};

use super::{dispatch, CallHooks, EventAction, Notification, Phone};

/// Reads baresip output until the session stops.
pub struct ReaderLoop {
    phone: Phone,
    hooks: Arc<dyn CallHooks>,
}

impl ReaderLoop {
    #[must_use]
    pub fn new(phone: Phone, hooks: Arc<dyn CallHooks>) -> Self {
        phone.attach_hooks(Arc::clone(&hooks));
        Self { phone, hooks }
    }

    /// Read and handle lines until baresip exits or the session is shut
    /// down, then quit.
    pub async fn run(self) {
        let timeout = self.phone.read_timeout();
        let abort = self.phone.abort_token().clone();
        tracing::debug!(timeout = ?timeout, "Reader started");

        while self.phone.is_running() {
            let read = tokio::select! {
                biased;

                () = abort.cancelled() => {
                    tracing::debug!("Reader cancelled");
                    break;
                }
                read = self.phone.transport().read_line(timeout) => read,
            };

            match read {
                Ok(line) => {
                    self.handle_line(&line).await;
                }
                Err(ReadError::Timeout) => {}
                Err(ReadError::EndOfStream) => {
                    tracing::info!("baresip closed its output");
                    self.phone.state().set_running(false);
                }
            }
        }

        self.phone.quit().await;
        tracing::debug!("Reader stopped");
    }

    /// Handle one raw output line.
    ///
    /// Returns the classified event, or `None` for a blank line or an
    /// exact repeat of the previous one.
    pub async fn handle_line(&self, raw: &str) -> Option<Event> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }

        let (event, outcome) = {
            let mut state = self.phone.state();
            if line == state.last_line() {
                return None;
            }
            tracing::debug!("baresip> {line}");

            let event = {
                let ctx = LineContext::new(line)
                    .with_previous(state.last_line())
                    .with_call(state.current_call());
                self.phone.classifier().classify(&ctx)
            };
            if !event.is_unrecognized() {
                tracing::debug!(event = ?event, "Classified line");
            }
            state.remember_line(line);
            let outcome = state.apply(&event, self.phone.policy());
            (event, outcome)
        };

        for notification in &outcome.notifications {
            if *notification == Notification::CallEstablished {
                let delay = self.phone.settle_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            dispatch(self.hooks.as_ref(), &self.phone, notification).await;
        }

        self.perform(outcome.action).await;
        Some(event)
    }

    async fn perform(&self, action: EventAction) {
        match action {
            EventAction::Continue => {}
            EventAction::CreateAccount => self.phone.create_user_agent(),
            EventAction::Shutdown => {
                tracing::error!("Login failed, shutting down");
                self.phone.quit().await;
            }
            EventAction::HangUp => self.phone.hang(),
            EventAction::Stop => tracing::info!("baresip is exiting"),
        }
    }
}
