//! End-to-end runs against a scripted stand-in for baresip.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use baresip_driver::config::{Sounds, DEFAULT_BARESIP_CONFIG};
use baresip_driver::session::{CallStatus, Phone};

use super::{eventually, test_config, FakeConverter, FakeSpeech, Recorder};

const WAIT: Duration = Duration::from_secs(5);

/// Answers the commands the driver sends the way baresip does. `$2` is the
/// config directory from `-f`.
const FAKE_BARESIP: &str = r#"#!/bin/sh
stty -echo
cp "$2/config" "$2/seen-config"
echo "baresip is ready."
echo "account: No SIP accounts found - check your config"
while read -r line; do
  echo "$line" >> "$2/commands.log"
  case "$line" in
    /uanew*)
      echo "All 1 useragent registered successfully! (10 ms)" ;;
    "/dial "*)
      n="${line#/dial }"
      echo "call: connecting to '$n'.."
      echo "sip:alice@gw: call: SIP Progress: 180 Ringing (Ringing)"
      echo "sip:alice@gw: Call established: $n" ;;
    /hangup)
      echo "sip:alice@gw: Call with bob terminated (duration: 00:01:23)" ;;
    /quit)
      echo "ua: stop all"
      exit 0 ;;
  esac
done
"#;

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-baresip");
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn spawn_phone(script: &Path, config_dir: &Path) -> Phone {
    let mut config = test_config();
    config.baresip.binary = script.display().to_string();
    config.baresip.config_dir = config_dir.to_path_buf();
    config.baresip.sounds = Sounds::Enabled(false);
    Phone::builder(config)
        .converter(Arc::new(FakeConverter {
            duration: Duration::from_millis(600),
        }))
        .speech(Arc::new(FakeSpeech))
        .settle_delay(Duration::ZERO)
        .build()
        .unwrap()
}

fn commands(config_dir: &Path) -> Vec<String> {
    std::fs::read_to_string(config_dir.join("commands.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn registers_calls_and_restores_config() {
    let bin = tempfile::tempdir().unwrap();
    let conf = tempfile::tempdir().unwrap();
    let script = write_script(bin.path(), FAKE_BARESIP);

    let hooks = Recorder::new();
    let phone = spawn_phone(&script, conf.path());
    phone.start(hooks.clone()).unwrap();

    let ready = tokio::time::timeout(WAIT, phone.wait_until_ready())
        .await
        .unwrap();
    assert!(ready);
    assert_eq!(
        commands(conf.path()),
        vec!["/uanew sip:alice@sip.example.com:5060;auth_pass=secret"]
    );

    // baresip saw the rewritten config
    let seen = std::fs::read_to_string(conf.path().join("seen-config")).unwrap();
    assert!(seen.contains("audio_path\t\t/dont/load"));
    assert!(!seen.contains("#audio_path"));

    phone.dial("bob");
    eventually("established call", || phone.is_call_established()).await;
    assert_eq!(phone.previous_call_status(), CallStatus::Ringing);

    phone.hang();
    eventually("call end", || phone.call_status() == CallStatus::Disconnected).await;
    eventually("hangup logged", || commands(conf.path()).len() == 3).await;
    assert_eq!(commands(conf.path())[1..], ["/dial bob", "/hangup"]);

    phone.quit().await;
    tokio::time::timeout(WAIT, phone.join()).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(conf.path().join("config")).unwrap(),
        DEFAULT_BARESIP_CONFIG
    );
    assert_eq!(
        std::fs::read_to_string(conf.path().join("config.bak")).unwrap(),
        DEFAULT_BARESIP_CONFIG
    );

    let calls = hooks.calls();
    assert_eq!(calls[..2], ["ready", "login_success"]);
    assert!(calls.contains(&"established".to_string()));
    assert!(calls.contains(&"timestamp:00:01:23".to_string()));
    assert!(!phone.is_running());
}

#[tokio::test]
async fn exiting_baresip_stops_the_session() {
    let bin = tempfile::tempdir().unwrap();
    let conf = tempfile::tempdir().unwrap();
    let script = write_script(
        bin.path(),
        "#!/bin/sh\necho \"baresip is ready.\"\necho \"terminated by signal 15\"\n",
    );

    let hooks = Recorder::new();
    let phone = spawn_phone(&script, conf.path());
    phone.start(hooks.clone()).unwrap();

    tokio::time::timeout(WAIT, phone.stopped()).await.unwrap();
    tokio::time::timeout(WAIT, phone.join()).await.unwrap();

    assert!(!phone.is_running());
    assert!(!phone.is_ready());
    assert!(phone.is_aborted());
    assert_eq!(hooks.calls(), vec!["ready"]);
    assert_eq!(
        std::fs::read_to_string(conf.path().join("config")).unwrap(),
        DEFAULT_BARESIP_CONFIG
    );
}

#[tokio::test]
async fn existing_config_survives_a_session() {
    let bin = tempfile::tempdir().unwrap();
    let conf = tempfile::tempdir().unwrap();
    let original = "module_path\t\t/usr/lib/baresip/modules\n#audio_path\t\t/usr/share/baresip\n";
    std::fs::write(conf.path().join("config"), original).unwrap();
    let script = write_script(bin.path(), "#!/bin/sh\necho \"ua: stop all\"\n");

    let phone = spawn_phone(&script, conf.path());
    phone.start(Recorder::new()).unwrap();
    tokio::time::timeout(WAIT, phone.join()).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(conf.path().join("config")).unwrap(),
        original
    );
}
