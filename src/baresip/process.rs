//! baresip process spawning and control.
//!
//! baresip only behaves like its interactive self when attached to a
//! terminal, so it is spawned on a pseudo-terminal. A dedicated thread
//! splits the terminal output into lines and hands them over a bounded
//! channel; input is written straight to the PTY master.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;

/// Default number of output lines buffered between the PTY thread and the reader.
pub const DEFAULT_LINE_BUFFER: usize = 256;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Program not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// The pseudo-terminal could not be set up.
    #[error("Pseudo-terminal error: {0}")]
    Pty(String),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Why no line was returned by [`Transport::read_line`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// Nothing arrived within the timeout. Not fatal, retry.
    #[error("Timed out waiting for output")]
    Timeout,
    /// The process closed its output.
    #[error("End of output stream")]
    EndOfStream,
}

/// Line-oriented connection to a running baresip.
///
/// [`PtyProcess`] is the real implementation; the trait exists so the
/// session layer can be driven by anything that speaks lines.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one line of input. The line terminator is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn send_line(&self, line: &str) -> io::Result<()>;

    /// Wait up to `timeout` for the next line of output.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Timeout`] or [`ReadError::EndOfStream`].
    async fn read_line(&self, timeout: Duration) -> Result<String, ReadError>;

    /// Forcefully stop the process and release its resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be killed or reaped.
    async fn terminate(&self) -> io::Result<()>;
}

/// Builder for the command line run on the pseudo-terminal.
#[derive(Debug, Clone, Default)]
pub struct PtyCommand {
    program: String,
    args: Vec<String>,
}

impl PtyCommand {
    /// Create a command for the given program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// The usual baresip invocation: `<binary> -f <config_dir>`.
    #[must_use]
    pub fn baresip(binary: impl Into<String>, config_dir: &Path) -> Self {
        Self::new(binary)
            .arg("-f")
            .arg(config_dir.display().to_string())
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Get the program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the arguments.
    #[must_use]
    pub fn build_args(&self) -> &[String] {
        &self.args
    }
}

/// A program running on a pseudo-terminal.
pub struct PtyProcess {
    pid: Option<u32>,
    child: Mutex<Option<Box<dyn Child + Send + Sync>>>,
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    lines: tokio::sync::Mutex<mpsc::Receiver<String>>,
}

impl std::fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyProcess")
            .field("pid", &self.pid)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl PtyProcess {
    /// Spawn the command on a fresh pseudo-terminal.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the program cannot be found or launched.
    pub fn start(command: &PtyCommand) -> Result<Self, SpawnError> {
        let program = resolve_program(&command.program)?;

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: 24,
                cols: 200,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SpawnError::Pty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&program);
        cmd.args(&command.args);

        let mut child = pair.slave.spawn_command(cmd).map_err(|e| {
            match e.downcast_ref::<io::Error>().map(io::Error::kind) {
                Some(io::ErrorKind::NotFound) => SpawnError::NotFound(command.program.clone()),
                Some(io::ErrorKind::PermissionDenied) => SpawnError::PermissionDenied,
                _ => SpawnError::Pty(e.to_string()),
            }
        })?;
        // The child holds its own copy; ours would keep the output open forever.
        drop(pair.slave);

        let pid = child.process_id();
        let io_handles = pair
            .master
            .try_clone_reader()
            .and_then(|reader| pair.master.take_writer().map(|writer| (reader, writer)));
        let (reader, writer) = match io_handles {
            Ok(handles) => handles,
            Err(e) => {
                let _ = child.kill();
                return Err(SpawnError::Pty(e.to_string()));
            }
        };

        let (tx, rx) = mpsc::channel(DEFAULT_LINE_BUFFER);
        std::thread::Builder::new()
            .name("baresip-pty".to_string())
            .spawn(move || pump_lines(reader, &tx))?;

        tracing::info!(
            pid = ?pid,
            program = %program.display(),
            args = ?command.args,
            "Spawned process on pseudo-terminal"
        );

        Ok(Self {
            pid,
            child: Mutex::new(Some(child)),
            master: Mutex::new(Some(pair.master)),
            writer: Mutex::new(Some(writer)),
            lines: tokio::sync::Mutex::new(rx),
        })
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        if self.is_alive() {
            self.pid
        } else {
            None
        }
    }

    /// Whether the process has not been terminated or exited.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        lock(&self.child)
            .as_mut()
            .is_some_and(|child| matches!(child.try_wait(), Ok(None)))
    }

    /// Write `text` followed by a newline to the process input.
    ///
    /// A no-op once the process has been terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if the pseudo-terminal write fails.
    pub fn send_line(&self, text: &str) -> io::Result<()> {
        let mut guard = lock(&self.writer);
        let Some(writer) = guard.as_mut() else {
            tracing::debug!(line = text, "Process not running, dropping input");
            return Ok(());
        };
        writer.write_all(text.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Wait up to `timeout` for the next output line.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Timeout`] when nothing arrived in time and
    /// [`ReadError::EndOfStream`] once the process closed its output.
    pub async fn read_line(&self, timeout: Duration) -> Result<String, ReadError> {
        let mut lines = self.lines.lock().await;
        match tokio::time::timeout(timeout, lines.recv()).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(ReadError::EndOfStream),
            Err(_) => Err(ReadError::Timeout),
        }
    }

    /// Kill the process with no graceful negotiation and release the terminal.
    ///
    /// Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent or the child
    /// cannot be reaped.
    pub async fn terminate(&self) -> io::Result<()> {
        drop(lock(&self.writer).take());

        let child = lock(&self.child).take();
        if let Some(mut child) = child {
            kill_child(&mut *child, self.pid)?;
            let status = tokio::task::spawn_blocking(move || child.wait())
                .await
                .map_err(io::Error::other)??;
            tracing::debug!(pid = ?self.pid, status = ?status, "Process reaped");
        }

        drop(lock(&self.master).take());
        Ok(())
    }
}

#[async_trait]
impl Transport for PtyProcess {
    fn send_line(&self, line: &str) -> io::Result<()> {
        PtyProcess::send_line(self, line)
    }

    async fn read_line(&self, timeout: Duration) -> Result<String, ReadError> {
        PtyProcess::read_line(self, timeout).await
    }

    async fn terminate(&self) -> io::Result<()> {
        PtyProcess::terminate(self).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Find the program on `PATH` unless it is already a path.
fn resolve_program(program: &str) -> Result<PathBuf, SpawnError> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(SpawnError::NotFound(program.to_string()))
        };
    }

    std::env::var_os("PATH")
        .iter()
        .flat_map(std::env::split_paths)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
        .ok_or_else(|| SpawnError::NotFound(program.to_string()))
}

/// Forward PTY output to the channel one line at a time until it closes.
fn pump_lines(reader: Box<dyn Read + Send>, tx: &mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                // baresip pads its output with blank lines; so does the
                // terminal when the child goes away.
                if line.trim().is_empty() {
                    continue;
                }
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                // Linux reports EIO on the master once the child side closes.
                tracing::debug!(error = %e, "Pseudo-terminal read ended");
                break;
            }
        }
    }
}

#[cfg(unix)]
fn kill_child(child: &mut (dyn Child + Send + Sync), pid: Option<u32>) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return child.kill();
    };
    let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
    match kill(nix_pid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

#[cfg(not(unix))]
fn kill_child(child: &mut (dyn Child + Send + Sync), _pid: Option<u32>) -> io::Result<()> {
    child.kill()
}
