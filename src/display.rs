//! Colored CLI display utilities for call progress.
//!
//! Used by the `baresip-driver` binary to print a timestamped line per
//! call event.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::session::CallStatus;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to at most `max_len` characters, adding an ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// `PREVIOUS -> NEW`.
#[must_use]
pub fn format_transition(previous: CallStatus, new: CallStatus) -> String {
    format!("{previous} -> {new}")
}

fn line(tag: &str, message: &str) {
    println!("{} {} {}", timestamp().dimmed(), tag, message);
    let _ = io::stdout().flush();
}

/// Print that baresip is up.
pub fn print_ready() {
    line(&"[READY]".blue().bold().to_string(), "baresip is ready");
}

/// Print the registration result.
pub fn print_login(account: &str, success: bool) {
    if success {
        line(
            &"[LOGIN]".green().bold().to_string(),
            &format!("registered {}", account.cyan()),
        );
    } else {
        line(
            &"[LOGIN]".red().bold().to_string(),
            &format!("registration failed for {}", account.cyan()),
        );
    }
}

/// Print an incoming call.
pub fn print_incoming_call(number: &str) {
    line(
        &"[INCOMING]".yellow().bold().to_string(),
        &truncate(number, 80).cyan().to_string(),
    );
}

/// Print a call that is being set up.
pub fn print_call_started(number: Option<&str>) {
    line(
        &"[CALL]".cyan().bold().to_string(),
        &format!("calling {}", number.unwrap_or("<unknown>").cyan()),
    );
}

/// Print a generic call event.
pub fn print_call_event(message: &str) {
    line(&"[CALL]".cyan().bold().to_string(), message);
}

/// Print a call that ended.
pub fn print_call_ended(reason: &str) {
    line(
        &"[HANGUP]".magenta().bold().to_string(),
        &truncate(reason, 120).dimmed().to_string(),
    );
}

/// Print a call status transition.
pub fn print_status_change(previous: CallStatus, new: CallStatus) {
    let text = format_transition(previous, new);
    let colored = if new == CallStatus::Established {
        text.green().to_string()
    } else if new.is_active() {
        text.to_string()
    } else {
        text.dimmed().to_string()
    };
    line(&"[STATUS]".blue().bold().to_string(), &colored);
}

/// Print elapsed call time.
pub fn print_call_time(time: &str) {
    line(&"[TIME]".dimmed().to_string(), time);
}

/// Print the microphone state.
pub fn print_mic(muted: bool) {
    let state = if muted { "muted" } else { "unmuted" };
    line(&"[MIC]".yellow().bold().to_string(), state);
}

/// Print a received DTMF digit.
pub fn print_dtmf(digit: char, duration_ms: u32) {
    line(
        &"[DTMF]".magenta().bold().to_string(),
        &format!("{} ({duration_ms} ms)", digit.bold()),
    );
}

/// Print an error message.
pub fn print_error(message: &str) {
    line(&"[ERROR]".red().bold().to_string(), &truncate(message, 200).red().to_string());
}
