//! baresip driver - scripted SIP calls through the baresip console.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use baresip_driver::config::ConfigLoader;
use baresip_driver::display;
use baresip_driver::session::{CallHooks, CallStatus, Phone};

#[derive(Parser)]
#[command(
    name = "baresip-driver",
    about = "Place and answer SIP calls through baresip",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dial a number, play something into the call and hang up.
    Call {
        /// Number or SIP address to dial.
        number: String,
        /// DTMF digits to send once connected.
        #[arg(long)]
        dtmf: Option<String>,
        /// Audio file to play into the call.
        #[arg(long)]
        audio: Option<PathBuf>,
        /// Text to speak into the call.
        #[arg(long)]
        say: Option<String>,
        /// Seconds to wait for the call to be answered.
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
    /// Answer every incoming call until interrupted.
    Answer,
}

/// Prints call progress and optionally answers incoming calls.
struct ConsoleHooks {
    auto_answer: bool,
}

#[async_trait]
impl CallHooks for ConsoleHooks {
    async fn on_ready(&self, _phone: &Phone) {
        display::print_ready();
    }

    async fn on_login_success(&self, phone: &Phone) {
        display::print_login(&phone.identity().address(), true);
    }

    async fn on_login_failure(&self, phone: &Phone) {
        display::print_login(&phone.identity().address(), false);
    }

    async fn on_incoming_call(&self, phone: &Phone, number: &str) {
        display::print_incoming_call(number);
        if self.auto_answer {
            phone.accept().await;
        } else {
            phone.reject();
        }
    }

    async fn on_call_rejected(&self, _phone: &Phone, number: &str) {
        display::print_call_event(&format!("rejected {number}"));
    }

    async fn on_call_started(&self, phone: &Phone, _has_active_call: bool) {
        display::print_call_started(phone.current_call().as_deref());
    }

    async fn on_call_ringing(&self, _phone: &Phone, _has_active_call: bool) {
        display::print_call_event("ringing");
    }

    async fn on_call_established(&self, _phone: &Phone) {
        display::print_call_event("established");
    }

    async fn on_call_ended(&self, _phone: &Phone, reason: &str) {
        display::print_call_ended(reason);
    }

    async fn on_call_status_changed(&self, _phone: &Phone, previous: CallStatus, new: CallStatus) {
        display::print_status_change(previous, new);
    }

    async fn on_call_timestamp(&self, _phone: &Phone, time: &str) {
        display::print_call_time(time);
    }

    async fn on_mic_muted(&self, _phone: &Phone) {
        display::print_mic(true);
    }

    async fn on_mic_unmuted(&self, _phone: &Phone) {
        display::print_mic(false);
    }

    async fn on_dtmf_received(&self, _phone: &Phone, digit: char, duration_ms: u32) {
        display::print_dtmf(digit, duration_ms);
    }

    async fn on_error(&self, _phone: &Phone, message: &str) {
        display::print_error(message);
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Wait until the call is established or gone.
async fn wait_for_answer(phone: &Phone, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut seen_call = false;
    while tokio::time::Instant::now() < deadline && !phone.is_aborted() {
        let status = phone.call_status();
        if status == CallStatus::Established {
            return true;
        }
        if status.is_active() {
            seen_call = true;
        } else if seen_call {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

async fn place_call(
    phone: &Phone,
    number: &str,
    dtmf: Option<String>,
    audio: Option<PathBuf>,
    say: Option<String>,
    timeout: Duration,
) -> bool {
    phone.dial(number);
    if !wait_for_answer(phone, timeout).await {
        display::print_error(&format!("{number} did not answer"));
        return false;
    }
    if let Some(digits) = dtmf {
        phone.send_dtmf(&digits).await;
    }
    if let Some(path) = audio {
        phone.send_audio(&path).await;
    }
    if let Some(text) = say {
        phone.speak(&text).await;
    }
    phone.hang();
    true
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli.config.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    match loader.find_config_file() {
        Some(path) => tracing::info!(path = %path.display(), "Using config file"),
        None => tracing::info!(searched = ?loader.search_paths(), "No config file, using defaults"),
    }
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let auto_answer = matches!(cli.command, Commands::Answer);
    let phone = match Phone::create(config) {
        Ok(phone) => phone,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = phone.start(Arc::new(ConsoleHooks { auto_answer })) {
        display::print_error(&e.to_string());
        return ExitCode::FAILURE;
    }

    if !phone.wait_until_ready().await {
        display::print_error("baresip stopped before the account registered");
        phone.quit().await;
        phone.join().await;
        return ExitCode::FAILURE;
    }

    let success = match cli.command {
        Commands::Call {
            number,
            dtmf,
            audio,
            say,
            timeout,
        } => {
            tracing::info!(number = %number, "Placing call");
            place_call(&phone, &number, dtmf, audio, say, Duration::from_secs(timeout)).await
        }
        Commands::Answer => {
            tracing::info!("Answering incoming calls, press Ctrl-C to stop");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                () = phone.stopped() => {}
            }
            true
        }
    };

    phone.quit().await;
    phone.join().await;
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
