//! Classification of real baresip console lines.

use baresip_driver::baresip::{Classifier, Event, LineContext, SINGLE_CALL_LIST_HEADER};

fn classify(line: &str) -> Event {
    Classifier::new().classify(&LineContext::new(line))
}

#[test]
fn startup_and_registration() {
    assert_eq!(classify("baresip is ready."), Event::Ready);
    assert_eq!(
        classify("account: No SIP accounts found - check your config"),
        Event::NoAccounts
    );
    assert_eq!(
        classify("All 1 useragent registered successfully! (420 ms)"),
        Event::LoginSuccess
    );
}

#[test]
fn login_failures_keep_raw_line() {
    for line in [
        "ua: SIP register failed: 401 Unauthorized",
        "reg: sip:alice@gw: 401 Unauthorized",
        "Register: Destination address required",
        "Register: Connection timed out",
    ] {
        assert_eq!(
            classify(line),
            Event::LoginFailure {
                line: line.to_string()
            },
            "line: {line}"
        );
    }
}

#[test]
fn incoming_call_number() {
    assert_eq!(
        classify("Incoming call from: 5551234 - (press 'a' to accept)"),
        Event::IncomingCall {
            number: "5551234".to_string()
        }
    );
    assert_eq!(
        classify("ua: Incoming call from: sip:bob@example.com "),
        Event::IncomingCall {
            number: "sip:bob@example.com".to_string()
        }
    );
}

#[test]
fn rejected_call_number() {
    assert_eq!(
        classify("call: rejecting incoming call from sip:eve@example.com (already in a call)"),
        Event::CallRejected {
            number: "sip:eve@example.com".to_string()
        }
    );
}

#[test]
fn outgoing_call_progress() {
    assert_eq!(
        classify("call: connecting to 'sip:bob@example.com'.."),
        Event::Connecting {
            number: "sip:bob@example.com".to_string()
        }
    );
    assert_eq!(
        classify("sip:alice@gw: call: SIP Progress: 180 Ringing (Ringing)"),
        Event::Ringing
    );
    assert_eq!(
        classify("sip:alice@gw: Call established: sip:bob@example.com"),
        Event::Established
    );
}

#[test]
fn hold_keeps_remainder() {
    assert_eq!(
        classify("call: hold sip:bob@example.com"),
        Event::Hold {
            detail: "sip:bob@example.com".to_string()
        }
    );
}

#[test]
fn terminated_drops_closing_parenthesis() {
    assert_eq!(
        classify("sip:alice@gw: Call with sip:bob@example.com terminated (duration: 00:01:23)"),
        Event::Terminated {
            duration: "00:01:23".to_string()
        }
    );
}

#[test]
fn mute_toggles() {
    assert_eq!(classify("call muted"), Event::Muted);
    assert_eq!(classify("call un-muted"), Event::Unmuted);
}

#[test]
fn session_closed_reason() {
    assert_eq!(
        classify("sip:bob@example.com: session closed: Connection reset by peer"),
        Event::SessionClosed {
            reason: "Connection reset by peer".to_string()
        }
    );
}

#[test]
fn call_listing_and_status() {
    assert_eq!(classify("(no active calls)"), Event::NoActiveCalls);
    assert_eq!(
        classify("===== Call debug (EARLY) ====="),
        Event::DebugStatus {
            status: "EARLY".to_string()
        }
    );
}

#[test]
fn timestamp_needs_listing_header_and_tracked_call() {
    let classifier = Classifier::new();
    let line = "[line 1]  0:00:42  ESTABLISHED  sip:bob@example.com";

    let ctx = LineContext::new(line)
        .with_previous(SINGLE_CALL_LIST_HEADER)
        .with_call(Some("sip:bob@example.com"));
    assert_eq!(
        classifier.classify(&ctx),
        Event::CallTimestamp {
            time: "0:00:42".to_string()
        }
    );

    // Wrong call: falls through to the later rules.
    let other = LineContext::new(line)
        .with_previous(SINGLE_CALL_LIST_HEADER)
        .with_call(Some("sip:carol@example.com"));
    assert!(classifier.classify(&other).is_unrecognized());

    // No header on the previous line.
    let no_header = LineContext::new(line).with_call(Some("sip:bob@example.com"));
    assert!(classifier.classify(&no_header).is_unrecognized());
}

#[test]
fn listing_header_does_not_swallow_other_events() {
    let ctx = LineContext::new("ua: stop all")
        .with_previous(SINGLE_CALL_LIST_HEADER)
        .with_call(Some("sip:bob@example.com"));
    assert_eq!(Classifier::new().classify(&ctx), Event::ProcessTerminated);
}

#[test]
fn audio_failure_and_shutdown() {
    assert_eq!(
        classify("ausrc: failed to set audio-source (No such device)"),
        Event::AudioSourceFailure
    );
    assert_eq!(classify("terminated by signal 15"), Event::ProcessTerminated);
    assert_eq!(classify("ua: stop all"), Event::ProcessTerminated);
}

#[test]
fn dtmf_digit_and_duration() {
    assert_eq!(
        classify("call: received DTMF: '5' (duration=120)"),
        Event::DtmfReceived {
            digit: '5',
            duration_ms: 120
        }
    );
    assert_eq!(
        classify("call: received DTMF: '#' (duration=80)"),
        Event::DtmfReceived {
            digit: '#',
            duration_ms: 80
        }
    );
}

#[test]
fn earlier_rules_win() {
    // Both a login failure and a shutdown marker; rule 4 comes first.
    let line = "ua: SIP register failed: ua: stop all";
    assert!(matches!(classify(line), Event::LoginFailure { .. }));
    // A mute line mentioning a hold is still a hold.
    assert!(matches!(classify("call: hold call muted"), Event::Hold { .. }));
}

#[test]
fn unknown_lines_are_unrecognized() {
    assert_eq!(
        classify("Local network address: IPv4=eth0:10.0.0.2"),
        Event::Unrecognized {
            line: "Local network address: IPv4=eth0:10.0.0.2".to_string()
        }
    );
    assert!(classify("").is_unrecognized());
}

#[test]
fn classification_is_pure() {
    let classifier = Classifier::new();
    let lines = [
        "Incoming call from: 5551234 - (press 'a' to accept)",
        "call: received DTMF: '1' (duration=100)",
        "[line 1]  0:00:01  ESTABLISHED  bob",
        "whatever",
    ];
    for line in lines {
        let ctx = LineContext::new(line)
            .with_previous(SINGLE_CALL_LIST_HEADER)
            .with_call(Some("bob"));
        assert_eq!(classifier.classify(&ctx), classifier.classify(&ctx));
        assert_eq!(classifier.classify(&ctx), Classifier::new().classify(&ctx));
    }
}
