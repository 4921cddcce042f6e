//! Command façade over a running baresip.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::audio::{
    scratch_file, AudioConverter, AudioPlayer, CommandSpeech, DtmfToneGenerator,
    FfmpegConverter, LocalPlayer, SpeechSynthesizer, ToneSynthesizer,
};
use crate::baresip::{Classifier, Command, PtyCommand, PtyProcess, SpawnError, Transport};
use crate::config::{AudioConfig, BaresipConfig, ConfigError, DriverConfig, Identity, SessionPolicy};

use super::{dispatch, CallHooks, CallStateMachine, CallStatus, ReaderLoop, SessionSnapshot};

/// How often [`Phone::wait_until_ready`] checks the ready flag.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pause between an established call and its hook, so media can settle.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Time left off the end of played audio, and the pause after speech.
const AUDIO_TAIL: Duration = Duration::from_millis(500);

/// Time given to baresip to answer `/callstat`.
const CALL_STATUS_DELAY: Duration = Duration::from_millis(100);

/// Errors creating or starting a session.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("Failed to start baresip: {0}")]
    Spawn(#[from] SpawnError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Session already started")]
    AlreadyStarted,
}

/// Whether `digits` can be sent as DTMF.
///
/// Only `0` to `8` are accepted; `9` is rejected like the tone tool
/// this driver has always been used with.
#[must_use]
pub fn is_valid_dtmf(digits: &str) -> bool {
    !digits.is_empty() && digits.chars().all(|c| matches!(c, '0'..='8'))
}

struct Inner {
    identity: Identity,
    audio: AudioConfig,
    policy: SessionPolicy,
    read_timeout: Duration,
    settle_delay: Duration,
    classifier: Classifier,
    transport: Arc<dyn Transport>,
    state: Mutex<CallStateMachine>,
    abort: CancellationToken,
    baresip_config: Mutex<Option<BaresipConfig>>,
    converter: Arc<dyn AudioConverter>,
    tones: Arc<dyn ToneSynthesizer>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    player: Arc<dyn AudioPlayer>,
    reader: Mutex<Option<JoinHandle<()>>>,
    hooks: Mutex<Option<Arc<dyn CallHooks>>>,
    started: AtomicBool,
    quitting: AtomicBool,
}

/// Handle to one baresip session.
///
/// Cheap to clone; every clone drives the same session. Commands that
/// need a registered account are dropped with a warning until the
/// session is ready.
#[derive(Clone)]
pub struct Phone {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Phone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phone")
            .field("account", &self.inner.identity.address())
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Phone`].
#[must_use]
pub struct PhoneBuilder {
    config: DriverConfig,
    transport: Option<Arc<dyn Transport>>,
    converter: Arc<dyn AudioConverter>,
    tones: Arc<dyn ToneSynthesizer>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    player: Arc<dyn AudioPlayer>,
    settle_delay: Duration,
}

impl PhoneBuilder {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            transport: None,
            converter: Arc::new(FfmpegConverter::default()),
            tones: Arc::new(DtmfToneGenerator::default()),
            speech: Some(Arc::new(CommandSpeech::default())),
            player: Arc::new(LocalPlayer::default()),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Talk to an already running baresip instead of spawning one.
    ///
    /// The baresip config file is left untouched in this case.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn converter(mut self, converter: Arc<dyn AudioConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn tones(mut self, tones: Arc<dyn ToneSynthesizer>) -> Self {
        self.tones = tones;
        self
    }

    pub fn speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn without_speech(mut self) -> Self {
        self.speech = None;
        self
    }

    pub fn player(mut self, player: Arc<dyn AudioPlayer>) -> Self {
        self.player = player;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Prepare the baresip config, spawn baresip and build the phone.
    ///
    /// The reader is not running yet; call [`Phone::start`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be prepared or baresip
    /// cannot be spawned.
    pub fn build(self) -> Result<Phone, DriverError> {
        let (transport, baresip_config) = match self.transport {
            Some(transport) => (transport, None),
            None => spawn_baresip(&self.config)?,
        };

        if !self.config.identity.is_complete() {
            tracing::warn!("Identity has no user or gateway, registration will fail");
        }

        Ok(Phone {
            inner: Arc::new(Inner {
                identity: self.config.identity,
                audio: self.config.audio,
                policy: self.config.policy,
                read_timeout: self.config.baresip.read_timeout(),
                settle_delay: self.settle_delay,
                classifier: Classifier::new(),
                transport,
                state: Mutex::new(CallStateMachine::new()),
                abort: CancellationToken::new(),
                baresip_config: Mutex::new(baresip_config),
                converter: self.converter,
                tones: self.tones,
                speech: self.speech,
                player: self.player,
                reader: Mutex::new(None),
                hooks: Mutex::new(None),
                started: AtomicBool::new(false),
                quitting: AtomicBool::new(false),
            }),
        })
    }
}

fn spawn_baresip(
    config: &DriverConfig,
) -> Result<(Arc<dyn Transport>, Option<BaresipConfig>), DriverError> {
    let dir = config.baresip.resolved_config_dir();
    let mut baresip_config = BaresipConfig::prepare(&dir, &config.baresip.sounds)?;

    let command = PtyCommand::baresip(config.baresip.binary.clone(), &dir);
    match PtyProcess::start(&command) {
        Ok(process) => {
            let transport: Arc<dyn Transport> = Arc::new(process);
            Ok((transport, Some(baresip_config)))
        }
        Err(e) => {
            if let Err(restore_err) = baresip_config.restore() {
                tracing::warn!(error = %restore_err, "Failed to restore baresip config");
            }
            Err(e.into())
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Phone {
    /// Spawn baresip with default collaborators.
    ///
    /// # Errors
    ///
    /// See [`PhoneBuilder::build`].
    pub fn create(config: DriverConfig) -> Result<Self, DriverError> {
        PhoneBuilder::new(config).build()
    }

    pub fn builder(config: DriverConfig) -> PhoneBuilder {
        PhoneBuilder::new(config)
    }

    /// Start the reader task that feeds baresip output to `hooks`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::AlreadyStarted`] on a second call.
    pub fn start(&self, hooks: Arc<dyn CallHooks>) -> Result<(), DriverError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(DriverError::AlreadyStarted);
        }
        self.state().set_running(true);
        let reader = ReaderLoop::new(self.clone(), hooks);
        let handle = tokio::spawn(reader.run());
        *lock(&self.inner.reader) = Some(handle);
        tracing::info!(account = %self.inner.identity.address(), "Session started");
        Ok(())
    }

    /// Wait for the reader task to finish.
    pub async fn join(&self) {
        let handle = lock(&self.inner.reader).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Reader task failed");
            }
        }
    }

    /// Resolves once the session has been shut down.
    pub async fn stopped(&self) {
        self.inner.abort.cancelled().await;
    }

    /// Send a command, provided the session is ready.
    ///
    /// Returns whether the command was written.
    pub fn do_command(&self, command: &Command) -> bool {
        if !self.is_ready() {
            tracing::warn!(command = %command, "Not ready, command not executed");
            return false;
        }
        self.send_raw(&command.to_string())
    }

    /// Write a line to baresip regardless of readiness.
    pub fn send_raw(&self, line: &str) -> bool {
        tracing::debug!(line, "Sending to baresip");
        self.write_line(line)
    }

    fn write_line(&self, line: &str) -> bool {
        match self.inner.transport.send_line(line) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to write to baresip");
                false
            }
        }
    }

    /// Register the configured account with baresip.
    pub fn create_user_agent(&self) {
        tracing::info!(account = %self.inner.identity.address(), "Adding account to baresip");
        self.write_line(&Command::NewUserAgent(self.inner.identity.sip()).to_string());
    }

    pub fn dial(&self, number: &str) {
        tracing::info!(number, "Dialing");
        self.do_command(&Command::Dial(number.to_string()));
    }

    /// Hang up the current call and forget it.
    pub fn hang(&self) {
        let Some(number) = self.current_call() else {
            tracing::error!("No active call to hang up");
            return;
        };
        tracing::info!(number = %number, "Hanging up");
        self.do_command(&Command::Hangup);
        self.state().hang_up();
    }

    pub fn hold(&self) {
        let Some(number) = self.current_call() else {
            tracing::error!("No active call to hold");
            return;
        };
        tracing::info!(number = %number, "Holding");
        self.do_command(&Command::Hold);
    }

    pub fn resume(&self) {
        let Some(number) = self.current_call() else {
            tracing::error!("No active call to resume");
            return;
        };
        tracing::info!(number = %number, "Resuming");
        self.do_command(&Command::Resume);
    }

    /// Mute the microphone. The mute flag changes when baresip confirms.
    pub fn mute(&self) {
        if !self.is_call_established() {
            tracing::error!("Cannot mute microphone while not in a call");
            return;
        }
        if self.is_mic_muted() {
            tracing::info!("Microphone already muted");
            return;
        }
        tracing::info!("Muting microphone");
        self.do_command(&Command::Mute);
    }

    pub fn unmute(&self) {
        if !self.is_call_established() {
            tracing::error!("Cannot unmute microphone while not in a call");
            return;
        }
        if !self.is_mic_muted() {
            tracing::info!("Microphone already unmuted");
            return;
        }
        tracing::info!("Unmuting microphone");
        self.do_command(&Command::Mute);
    }

    /// Play DTMF tones for `digits` into the call.
    pub async fn send_dtmf(&self, digits: &str) {
        if !is_valid_dtmf(digits) {
            tracing::error!(digits, "Invalid DTMF tone");
            return;
        }
        tracing::info!(digits, "Sending DTMF tones");

        let path = match scratch_file("dtmf", "wav") {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(error = %e, "No scratch space for DTMF tones");
                return;
            }
        };
        let tones = Arc::clone(&self.inner.tones);
        let (owned_digits, output) = (digits.to_string(), path.clone());
        match tokio::task::spawn_blocking(move || tones.render(&owned_digits, &output)).await {
            Ok(Ok(())) => self.send_audio(&path).await,
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to render DTMF tones"),
            Err(e) => tracing::error!(error = %e, "DTMF rendering task failed"),
        }
        let _ = tokio::fs::remove_file(&path).await;
    }

    /// Play an audio file into the established call.
    ///
    /// Returns once the file has (nearly) finished playing.
    pub async fn send_audio(&self, path: &Path) {
        if !self.is_call_established() {
            tracing::error!("Can't send audio without an active call");
            return;
        }
        let converted = match self
            .inner
            .converter
            .convert(path, self.inner.audio.frame_rate, self.inner.audio.channels)
            .await
        {
            Ok(converted) => converted,
            Err(e) => {
                tracing::error!(error = %e, file = %path.display(), "Failed to convert audio");
                return;
            }
        };

        tracing::info!(
            file = %converted.path.display(),
            duration = ?converted.duration,
            "Transmitting audio"
        );
        self.do_command(&Command::AudioSourceFile(converted.path.clone()));
        let wait = converted.duration.saturating_sub(AUDIO_TAIL);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        // baresip exits if the file source runs dry
        self.do_command(&Command::AudioSourceLive);
    }

    /// Speak `text` into the established call.
    pub async fn speak(&self, text: &str) {
        if !self.is_call_established() {
            tracing::error!("Speaking without an active call");
            return;
        }
        let Some(path) = self.synthesize(text).await else {
            return;
        };
        tracing::info!(text, "Sending speech");
        self.send_audio(&path).await;
        tokio::time::sleep(AUDIO_TAIL).await;
        let _ = tokio::fs::remove_file(&path).await;
    }

    /// Speak `text` through the local speakers.
    pub async fn say(&self, text: &str) {
        if !self.is_call_established() {
            tracing::warn!("Speaking locally without an active call");
        }
        let Some(path) = self.synthesize(text).await else {
            return;
        };
        if let Err(e) = self.inner.player.play(&path, true).await {
            tracing::error!(error = %e, "Local playback failed");
        }
        let _ = tokio::fs::remove_file(&path).await;
    }

    async fn synthesize(&self, text: &str) -> Option<std::path::PathBuf> {
        let Some(ref speech) = self.inner.speech else {
            tracing::error!("No speech synthesizer configured");
            return None;
        };
        let path = match scratch_file("speech", "wav") {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(error = %e, "No scratch space for speech");
                return None;
            }
        };
        match speech.synthesize(text, &path).await {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::error!(error = %e, "Speech synthesis failed");
                None
            }
        }
    }

    /// Play a file through the local speakers. Anything that is not a WAV
    /// file is converted first.
    pub async fn play(&self, path: &Path, blocking: bool) {
        let is_wav = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        let playable = if is_wav {
            path.to_path_buf()
        } else {
            match self
                .inner
                .converter
                .convert(path, self.inner.audio.frame_rate, self.inner.audio.channels)
                .await
            {
                Ok(converted) => converted.path,
                Err(e) => {
                    tracing::error!(error = %e, file = %path.display(), "Failed to convert audio");
                    return;
                }
            }
        };
        if let Err(e) = self.inner.player.play(&playable, blocking).await {
            tracing::error!(error = %e, "Local playback failed");
        }
    }

    pub async fn stop_playing(&self) {
        if let Err(e) = self.inner.player.stop().await {
            tracing::warn!(error = %e, "Failed to stop local playback");
        }
    }

    /// Answer the incoming call.
    ///
    /// The move to `Established` is reported to the hooks like any
    /// transition seen in baresip's output.
    pub async fn accept(&self) {
        tracing::info!("Accepting call");
        if !self.do_command(&Command::Accept) {
            return;
        }
        let notification = self.state().transition(CallStatus::Established);
        let hooks = lock(&self.inner.hooks).clone();
        if let Some(hooks) = hooks {
            dispatch(hooks.as_ref(), self, &notification).await;
        }
    }

    /// Reject the incoming call.
    pub fn reject(&self) {
        tracing::info!("Rejecting call");
        self.do_command(&Command::Reject);
    }

    pub fn list_calls(&self) {
        self.do_command(&Command::ListCalls);
    }

    /// Ask baresip for the call status and return the tracked status
    /// shortly after.
    pub async fn check_call_status(&self) -> CallStatus {
        self.do_command(&Command::CallStatus);
        tokio::time::sleep(CALL_STATUS_DELAY).await;
        self.call_status()
    }

    /// Wait until the account has registered.
    ///
    /// Returns `false` if the session shut down first.
    pub async fn wait_until_ready(&self) -> bool {
        loop {
            if self.is_ready() {
                return true;
            }
            tokio::select! {
                () = self.inner.abort.cancelled() => return self.is_ready(),
                () = tokio::time::sleep(READY_POLL_INTERVAL) => {}
            }
        }
    }

    /// Shut the session down and kill baresip.
    ///
    /// Hangs up an active call and asks baresip to quit first. Only the
    /// first call does anything.
    pub async fn quit(&self) {
        if self.inner.quitting.swap(true, Ordering::SeqCst) {
            tracing::debug!("Quit already in progress");
            return;
        }
        tracing::info!("Exiting");

        if self.is_running() {
            if self.current_call().is_some() {
                self.hang();
            }
            self.send_raw(&Command::Quit.to_string());
        }

        if let Some(config) = lock(&self.inner.baresip_config).as_mut() {
            if let Err(e) = config.restore() {
                tracing::error!(error = %e, "Failed to restore baresip config");
            }
        }

        self.state().reset();
        self.inner.abort.cancel();
        lock(&self.inner.hooks).take();

        if let Err(e) = self.inner.transport.terminate().await {
            tracing::warn!(error = %e, "Failed to terminate baresip");
        }
    }

    /// Hooks that façade-driven transitions are reported to.
    pub(crate) fn attach_hooks(&self, hooks: Arc<dyn CallHooks>) {
        *lock(&self.inner.hooks) = Some(hooks);
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, CallStateMachine> {
        lock(&self.inner.state)
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub(crate) fn abort_token(&self) -> &CancellationToken {
        &self.inner.abort
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.inner.classifier
    }

    #[must_use]
    pub fn policy(&self) -> &SessionPolicy {
        &self.inner.policy
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.inner.read_timeout
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        self.inner.settle_delay
    }

    #[must_use]
    pub fn call_status(&self) -> CallStatus {
        self.state().call_status()
    }

    #[must_use]
    pub fn previous_call_status(&self) -> CallStatus {
        self.state().previous_call_status()
    }

    #[must_use]
    pub fn current_call(&self) -> Option<String> {
        self.state().current_call().map(str::to_string)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    #[must_use]
    pub fn is_mic_muted(&self) -> bool {
        self.state().is_mic_muted()
    }

    #[must_use]
    pub fn is_call_established(&self) -> bool {
        self.call_status() == CallStatus::Established
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.inner.abort.is_cancelled()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot()
    }
}
