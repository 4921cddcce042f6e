//! Call state tracking, driven through the public state machine and the
//! reader.

use baresip_driver::baresip::Event;
use baresip_driver::config::SessionPolicy;
use baresip_driver::session::{CallStateMachine, CallStatus, EventAction, Notification};

use super::{manual_session, Recorder, LOGIN_OK};

fn events() -> Vec<Event> {
    vec![
        Event::Ready,
        Event::LoginSuccess,
        Event::IncomingCall {
            number: "5551234".to_string(),
        },
        Event::Established,
        Event::Muted,
        Event::Hold {
            detail: "5551234".to_string(),
        },
        Event::Terminated {
            duration: "00:00:10".to_string(),
        },
        Event::Connecting {
            number: "sip:bob@example.com".to_string(),
        },
        Event::Ringing,
        Event::Established,
        Event::SessionClosed {
            reason: "Connection reset by peer".to_string(),
        },
        Event::NoActiveCalls,
        Event::DebugStatus {
            status: "EARLY".to_string(),
        },
    ]
}

#[test]
fn call_is_only_tracked_while_active() {
    let policy = SessionPolicy::default();
    let mut machine = CallStateMachine::new();
    for event in events() {
        machine.apply(&event, &policy);
        if !machine.call_status().is_active() {
            assert_eq!(machine.current_call(), None, "after {event:?}");
        }
    }
}

#[test]
fn previous_status_follows_every_transition() {
    let policy = SessionPolicy::default();
    let mut machine = CallStateMachine::new();
    let mut last = machine.call_status();
    for event in events() {
        let out = machine.apply(&event, &policy);
        for notification in out.notifications {
            if let Notification::CallStatusChanged { previous, new } = notification {
                assert_eq!(previous, last);
                last = new;
            }
        }
        assert_eq!(machine.call_status(), last);
    }
}

#[test]
fn repeated_status_still_notifies() {
    let policy = SessionPolicy::default();
    let mut machine = CallStateMachine::new();
    machine.apply(&Event::NoActiveCalls, &policy);
    let out = machine.apply(&Event::NoActiveCalls, &policy);
    assert_eq!(
        out.notifications,
        vec![Notification::CallStatusChanged {
            previous: CallStatus::Disconnected,
            new: CallStatus::Disconnected,
        }]
    );
}

#[test]
fn policy_can_keep_session_alive() {
    let policy = SessionPolicy {
        quit_on_login_failure: false,
        hang_up_on_audio_failure: false,
    };
    let mut machine = CallStateMachine::new();
    let out = machine.apply(
        &Event::LoginFailure {
            line: "Register: Connection timed out".to_string(),
        },
        &policy,
    );
    assert_eq!(out.action, EventAction::Continue);
    let out = machine.apply(&Event::AudioSourceFailure, &policy);
    assert_eq!(out.action, EventAction::Continue);
}

#[tokio::test]
async fn established_then_terminated_notifies_in_order() {
    let hooks = Recorder::new();
    let (_transport, phone, reader) = manual_session(hooks.clone());

    reader.handle_line(LOGIN_OK).await;
    reader
        .handle_line("sip:alice@gw: Call established: sip:bob@example.com")
        .await;
    reader.handle_line("call muted").await;
    reader
        .handle_line("sip:alice@gw: Call with sip:bob@example.com terminated (duration: 00:01:23)")
        .await;

    assert_eq!(
        hooks.calls(),
        vec![
            "login_success",
            "status:NONE->ESTABLISHED",
            "established",
            "muted",
            "status:ESTABLISHED->DISCONNECTED",
            "timestamp:00:01:23",
        ]
    );
    assert_eq!(phone.call_status(), CallStatus::Disconnected);
    assert_eq!(phone.previous_call_status(), CallStatus::Established);
    assert!(!phone.is_mic_muted());
}

#[tokio::test]
async fn outgoing_call_notifies_before_status_change() {
    let hooks = Recorder::new();
    let (transport, phone, reader) = manual_session(hooks.clone());

    reader.handle_line(LOGIN_OK).await;
    phone.dial("sip:bob@example.com");
    reader
        .handle_line("call: connecting to 'sip:bob@example.com'..")
        .await;
    reader
        .handle_line("sip:alice@gw: call: SIP Progress: 180 Ringing (Ringing)")
        .await;
    reader
        .handle_line("sip:bob@example.com: session closed: Connection reset by peer")
        .await;

    assert_eq!(transport.sent(), vec!["/dial sip:bob@example.com"]);
    assert_eq!(
        hooks.calls(),
        vec![
            "login_success",
            "started:true",
            "status:NONE->OUTGOING",
            "ringing:true",
            "status:OUTGOING->RINGING",
            "status:RINGING->DISCONNECTED",
            "ended:Connection reset by peer",
        ]
    );
    assert_eq!(phone.current_call(), None);
}

#[tokio::test]
async fn duplicate_lines_are_handled_once() {
    let hooks = Recorder::new();
    let (_transport, _phone, reader) = manual_session(hooks.clone());

    let line = "call: received DTMF: '5' (duration=120)";
    assert!(reader.handle_line(line).await.is_some());
    assert!(reader.handle_line(line).await.is_none());
    assert!(reader.handle_line(&format!("{line}\r\n")).await.is_none());
    assert!(reader.handle_line("").await.is_none());
    // Blank lines do not reset the lookback.
    assert!(reader.handle_line(line).await.is_none());

    reader.handle_line("call: received DTMF: '6' (duration=90)").await;
    reader.handle_line(line).await;
    assert_eq!(
        hooks.calls(),
        vec!["dtmf:5:120", "dtmf:6:90", "dtmf:5:120"]
    );
}

#[tokio::test]
async fn incoming_call_is_tracked_and_announced() {
    let hooks = Recorder::new();
    let (transport, phone, reader) = manual_session(hooks.clone());
    reader.handle_line(LOGIN_OK).await;

    reader
        .handle_line("Incoming call from: 5551234 - (press 'a' to accept)")
        .await;
    assert_eq!(phone.current_call().as_deref(), Some("5551234"));
    assert_eq!(phone.call_status(), CallStatus::Incoming);
    assert_eq!(
        hooks.calls()[1..],
        ["status:NONE->INCOMING", "incoming:5551234"]
    );
    // Nothing is answered on its own.
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn hooks_can_answer_calls() {
    let hooks = Recorder::answering();
    let (transport, phone, reader) = manual_session(hooks.clone());
    reader.handle_line(LOGIN_OK).await;

    reader
        .handle_line("Incoming call from: 5551234 - (press 'a' to accept)")
        .await;
    assert_eq!(transport.sent(), vec!["/accept"]);
    assert!(phone.is_call_established());
    assert_eq!(
        hooks.calls(),
        vec![
            "login_success",
            "status:NONE->INCOMING",
            "incoming:5551234",
            "status:INCOMING->ESTABLISHED",
        ]
    );
}

#[tokio::test]
async fn call_timestamps_are_reported_once_each() {
    let hooks = Recorder::new();
    let (_transport, _phone, reader) = manual_session(hooks.clone());
    reader.handle_line(LOGIN_OK).await;
    reader
        .handle_line("Incoming call from: bob - (press 'a' to accept)")
        .await;

    let header = baresip_driver::baresip::SINGLE_CALL_LIST_HEADER;
    reader.handle_line(header).await;
    reader.handle_line("[line 1]  0:00:42  ESTABLISHED  bob").await;
    reader.handle_line(header).await;
    reader.handle_line("[line 1]  0:00:42  ESTABLISHED  bob").await;
    reader.handle_line(header).await;
    reader.handle_line("[line 1]  0:00:43  ESTABLISHED  bob").await;

    assert_eq!(hooks.count("timestamp:"), 2);
    assert_eq!(
        hooks
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("timestamp:"))
            .collect::<Vec<_>>(),
        vec!["timestamp:0:00:42", "timestamp:0:00:43"]
    );
}

#[tokio::test]
async fn audio_source_failure_hangs_up() {
    let hooks = Recorder::new();
    let (transport, phone, reader) = manual_session(hooks.clone());
    reader.handle_line(LOGIN_OK).await;
    reader
        .handle_line("Incoming call from: 5551234 - (press 'a' to accept)")
        .await;

    reader
        .handle_line("ausrc: failed to set audio-source (No such device)")
        .await;
    assert_eq!(transport.sent(), vec!["/hangup"]);
    assert_eq!(phone.current_call(), None);
    assert_eq!(hooks.count("error:"), 1);
}

#[tokio::test]
async fn no_accounts_registers_identity() {
    let hooks = Recorder::new();
    let (transport, phone, reader) = manual_session(hooks.clone());

    reader.handle_line("baresip is ready.").await;
    assert!(!phone.is_ready());
    reader
        .handle_line("account: No SIP accounts found - check your config")
        .await;

    assert!(!phone.is_ready());
    assert_eq!(hooks.calls(), vec!["ready"]);
    assert_eq!(
        transport.sent(),
        vec!["/uanew sip:alice@sip.example.com:5060;auth_pass=secret"]
    );
}
