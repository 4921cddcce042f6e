//! Line classifier for baresip console output.
//!
//! The rules below are the de-facto grammar of baresip's human-oriented
//! log. They are evaluated in order and the first match wins: several
//! triggers are broader than the ones before them, so reordering the table
//! changes behavior.

use std::sync::LazyLock;

use regex::Regex;

use crate::baresip::Event;

/// Header printed by `/listcalls` when exactly one call is up.
pub const SINGLE_CALL_LIST_HEADER: &str = "--- List of active calls (1): ---";

static DTMF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"received DTMF: '(.)' \(duration=(\d+)\)").expect("DTMF pattern is valid")
});

const LOGIN_FAILURE_MARKERS: [&str; 4] = [
    "ua: SIP register failed:",
    "401 Unauthorized",
    "Register: Destination address required",
    "Register: Connection timed out",
];

/// A line together with the context some rules look back at.
#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    /// The current, trimmed line.
    pub line: &'a str,
    /// The previous non-duplicate line.
    pub previous: &'a str,
    /// The remote party of the tracked call, if any.
    pub current_call: Option<&'a str>,
}

impl<'a> LineContext<'a> {
    /// Context for a line with no history and no tracked call.
    #[must_use]
    pub fn new(line: &'a str) -> Self {
        Self {
            line,
            previous: "",
            current_call: None,
        }
    }

    /// Set the previous line.
    #[must_use]
    pub fn with_previous(mut self, previous: &'a str) -> Self {
        self.previous = previous;
        self
    }

    /// Set the tracked call.
    #[must_use]
    pub fn with_call(mut self, current_call: Option<&'a str>) -> Self {
        self.current_call = current_call;
        self
    }
}

type Matcher = fn(&Classifier, &LineContext<'_>) -> Option<Event>;

/// A single named classification rule.
struct Rule {
    name: &'static str,
    matcher: Matcher,
}

const RULES: &[Rule] = &[
    Rule { name: "ready", matcher: ready },
    Rule { name: "no_accounts", matcher: no_accounts },
    Rule { name: "login_success", matcher: login_success },
    Rule { name: "login_failure", matcher: login_failure },
    Rule { name: "incoming_call", matcher: incoming_call },
    Rule { name: "call_rejected", matcher: call_rejected },
    Rule { name: "ringing", matcher: ringing },
    Rule { name: "connecting", matcher: connecting },
    Rule { name: "established", matcher: established },
    Rule { name: "hold", matcher: hold },
    Rule { name: "terminated", matcher: terminated },
    Rule { name: "muted", matcher: muted },
    Rule { name: "unmuted", matcher: unmuted },
    Rule { name: "session_closed", matcher: session_closed },
    Rule { name: "no_active_calls", matcher: no_active_calls },
    Rule { name: "debug_status", matcher: debug_status },
    Rule { name: "call_timestamp", matcher: call_timestamp },
    Rule { name: "audio_source_failure", matcher: audio_source_failure },
    Rule { name: "process_terminated", matcher: process_terminated },
    Rule { name: "dtmf_received", matcher: dtmf_received },
];

/// Maps raw baresip lines to [`Event`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier;

impl Classifier {
    /// Create a classifier with the built-in rule table.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Classify one line. Always yields exactly one event.
    #[must_use]
    pub fn classify(&self, ctx: &LineContext<'_>) -> Event {
        let matched = RULES
            .iter()
            .find_map(|rule| (rule.matcher)(self, ctx).map(|event| (rule.name, event)));
        match matched {
            Some((rule, event)) => {
                tracing::trace!(rule, "Line matched");
                event
            }
            None => Event::Unrecognized {
                line: ctx.line.to_string(),
            },
        }
    }
}

/// Text after the first `start`, up to the first following `end`.
///
/// Takes the rest of the line when `end` never appears.
fn between<'a>(line: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let rest = after(line, start)?;
    Some(rest.find(end).map_or(rest, |idx| &rest[..idx]))
}

/// Text after the first `marker`.
fn after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker).map(|idx| &line[idx + marker.len()..])
}

/// `s` without its last character.
fn drop_last_char(s: &str) -> &str {
    let mut chars = s.chars();
    chars.next_back();
    chars.as_str()
}

fn ready(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    ctx.line.contains("baresip is ready.").then_some(Event::Ready)
}

fn no_accounts(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    ctx.line
        .contains("account: No SIP accounts found")
        .then_some(Event::NoAccounts)
}

fn login_success(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    ctx.line
        .contains("All 1 useragent registered successfully!")
        .then_some(Event::LoginSuccess)
}

fn login_failure(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    LOGIN_FAILURE_MARKERS
        .iter()
        .any(|marker| ctx.line.contains(marker))
        .then(|| Event::LoginFailure {
            line: ctx.line.to_string(),
        })
}

fn incoming_call(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    between(ctx.line, "Incoming call from: ", " - (press 'a' to accept)").map(|number| {
        Event::IncomingCall {
            number: number.trim().to_string(),
        }
    })
}

fn call_rejected(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    between(ctx.line, "call: rejecting incoming call from ", " ").map(|number| {
        Event::CallRejected {
            number: number.trim().to_string(),
        }
    })
}

fn ringing(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    ctx.line
        .contains("call: SIP Progress: 180 Ringing")
        .then_some(Event::Ringing)
}

fn connecting(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    between(ctx.line, "call: connecting to '", "'").map(|number| Event::Connecting {
        number: number.to_string(),
    })
}

fn established(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    ctx.line
        .contains("Call established:")
        .then_some(Event::Established)
}

fn hold(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    after(ctx.line, "call: hold ").map(|detail| Event::Hold {
        detail: detail.to_string(),
    })
}

fn terminated(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    if !ctx.line.contains("Call with ") {
        return None;
    }
    after(ctx.line, "terminated (duration: ").map(|rest| Event::Terminated {
        duration: drop_last_char(rest).to_string(),
    })
}

fn muted(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    ctx.line.contains("call muted").then_some(Event::Muted)
}

fn unmuted(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    ctx.line.contains("call un-muted").then_some(Event::Unmuted)
}

fn session_closed(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    after(ctx.line, "session closed:").map(|reason| Event::SessionClosed {
        reason: reason.trim().to_string(),
    })
}

fn no_active_calls(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    ctx.line
        .contains("(no active calls)")
        .then_some(Event::NoActiveCalls)
}

fn debug_status(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    if !ctx.line.contains("===== Call debug ") {
        return None;
    }
    between(ctx.line, "(", ")").map(|status| Event::DebugStatus {
        status: status.to_string(),
    })
}

fn call_timestamp(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    if !ctx.previous.contains(SINGLE_CALL_LIST_HEADER) {
        return None;
    }
    let call = ctx.current_call?;
    if !ctx.line.contains("ESTABLISHED") || !ctx.line.contains(call) {
        return None;
    }
    let head = &ctx.line[..ctx.line.find("ESTABLISHED")?];
    after(head, "[line 1]").map(|time| Event::CallTimestamp {
        time: time.trim().to_string(),
    })
}

fn audio_source_failure(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    ctx.line
        .contains("failed to set audio-source (No such device)")
        .then_some(Event::AudioSourceFailure)
}

fn process_terminated(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    (ctx.line.contains("terminated by signal") || ctx.line.contains("ua: stop all"))
        .then_some(Event::ProcessTerminated)
}

fn dtmf_received(_: &Classifier, ctx: &LineContext<'_>) -> Option<Event> {
    let caps = DTMF_PATTERN.captures(ctx.line)?;
    let digit = caps.get(1)?.as_str().chars().next()?;
    let duration_ms = caps.get(2)?.as_str().parse().ok()?;
    Some(Event::DtmfReceived { digit, duration_ms })
}
