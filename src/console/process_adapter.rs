//! Real interactive shells running as OS processes.
//!
//! A [`ProcessAdapter`] owns one child process exclusively. Around it run four small tasks:
//!
//! - a writer draining client input into the child's stdin,
//! - one pump per output stream (stdout, stderr) turning reads into [`BackendEvent::Output`],
//! - a supervisor that waits for the child, or terminates it on request, and then reports
//!   exactly one [`BackendEvent::Exit`] or [`BackendEvent::Error`] after both pumps drained.
//!
//! stderr text is wrapped in red SGR sequences before it reaches the client. Both streams feed
//! the same bounded event channel, so the client sees them interleaved in arrival order. When
//! the channel is full the pumps stop reading and the shell blocks on its own output.

use log::{debug, info, warn};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::console::backend::{BackendEvent, EventSender, ShellBackend};
use crate::error_handling::types::SessionError;
use crate::session_management::SessionMode;

const READ_BUFFER_SIZE: usize = 4096;
/// How long a terminated shell gets between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(2);
/// Upper bound on waiting for output pumps once the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const STDERR_PREFIX: &str = "\x1b[31m";
const SGR_RESET: &str = "\x1b[0m";

/// Program, arguments and extra environment of a shell to spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ShellCommand {
    /// `<lxc> exec <target> -- <shell..>` with the terminal environment exported.
    pub fn lxc_exec(
        lxc_binary: &str,
        target: &str,
        shell: &[String],
        term: &str,
        cols: u16,
        rows: u16,
    ) -> Self {
        let mut args = vec!["exec".to_string(), target.to_string(), "--".to_string()];
        args.extend(shell.iter().cloned());
        Self {
            program: lxc_binary.to_string(),
            args,
            env: vec![
                ("TERM".to_string(), term.to_string()),
                ("COLUMNS".to_string(), cols.to_string()),
                ("LINES".to_string(), rows.to_string()),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

pub struct ProcessAdapter {
    target: String,
    pid: Option<u32>,
    input: Option<mpsc::UnboundedSender<Vec<u8>>>,
    shutdown: Option<oneshot::Sender<()>>,
    startup_timeout: Duration,
}

impl ProcessAdapter {
    /// Spawns `command` and wires its streams to `events`.
    ///
    /// Errors with [`SessionError::SpawnFailed`] when the OS refuses to start the process.
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        target: &str,
        command: &ShellCommand,
        startup_timeout: Duration,
        events: EventSender,
    ) -> Result<Self, SessionError> {
        debug!(
            "Spawning shell for {}: {} {:?}",
            target, command.program, command.args
        );

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::SpawnFailed(format!("{}: {}", command.program, e)))?;

        let pid = child.id();
        info!("Shell for container {} started (pid {:?})", target, pid);

        if let Err(e) = events.try_send(BackendEvent::Notice(format!(
            "\r\n\x1b[32mConnecting to container: {}...\x1b[0m\r\n",
            target
        ))) {
            debug!("Connecting notice for {} not queued: {}", target, e);
        }

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        if let Some(stdin) = child.stdin.take() {
            tokio::spawn(feed_stdin(target.to_string(), stdin, input_rx));
        }

        let stdout = child
            .stdout
            .take()
            .map(|s| tokio::spawn(pump(s, StreamKind::Stdout, events.clone())));
        let stderr = child
            .stderr
            .take()
            .map(|s| tokio::spawn(pump(s, StreamKind::Stderr, events.clone())));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(supervise(
            target.to_string(),
            child,
            shutdown_rx,
            [stdout, stderr],
            events,
        ));

        Ok(Self {
            target: target.to_string(),
            pid,
            input: Some(input_tx),
            shutdown: Some(shutdown_tx),
            startup_timeout,
        })
    }
}

impl ShellBackend for ProcessAdapter {
    fn mode(&self) -> SessionMode {
        SessionMode::Real
    }

    fn write(&mut self, data: &str) {
        let delivered = self
            .input
            .as_ref()
            .map(|input| input.send(data.as_bytes().to_vec()).is_ok())
            .unwrap_or(false);
        if !delivered {
            debug!(
                "Dropping {} bytes for {}: shell input is closed",
                data.len(),
                self.target
            );
        }
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        debug!("Resize for {} to {}x{}", self.target, cols, rows);
        if let Some(pid) = self.pid {
            if let Err(e) = send_signal(pid, Signal::SIGWINCH) {
                warn!("Error sending SIGWINCH to {}: {}", self.target, e);
            }
        }
    }

    fn startup_timeout(&self) -> Option<Duration> {
        Some(self.startup_timeout)
    }

    fn terminate(&mut self) {
        self.input.take();
        if let Some(shutdown) = self.shutdown.take() {
            // The supervisor is gone once the child exited on its own.
            let _ = shutdown.send(());
        }
    }
}

impl Drop for ProcessAdapter {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn send_signal(pid: u32, signal: Signal) -> nix::Result<()> {
    let pid = i32::try_from(pid).map_err(|_| nix::errno::Errno::ESRCH)?;
    kill(Pid::from_raw(pid), signal)
}

async fn feed_stdin(
    target: String,
    mut stdin: tokio::process::ChildStdin,
    mut input: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(bytes) = input.recv().await {
        if let Err(e) = stdin.write_all(&bytes).await {
            warn!("Write to shell of {} failed: {}", target, e);
            break;
        }
        if let Err(e) = stdin.flush().await {
            warn!("Flush of shell input for {} failed: {}", target, e);
            break;
        }
    }
    debug!("stdin writer ended for {}", target);
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, kind: StreamKind, events: EventSender) {
    let mut decoder = Utf8Decoder::default();
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        let text = match reader.read(&mut buffer).await {
            Ok(0) | Err(_) => decoder.finish(),
            Ok(n) => decoder.decode(&buffer[..n]),
        };

        if !text.is_empty() {
            let text = match kind {
                StreamKind::Stdout => text,
                StreamKind::Stderr => {
                    warn!("Terminal stderr: {}", text.trim_end());
                    format!("{}{}{}", STDERR_PREFIX, text, SGR_RESET)
                }
            };
            if events.send(BackendEvent::Output(text)).await.is_err() {
                break;
            }
        }

        if decoder.is_finished() {
            break;
        }
    }
    debug!("{:?} pump ended", kind);
}

async fn supervise(
    target: String,
    mut child: Child,
    shutdown: oneshot::Receiver<()>,
    pumps: [Option<JoinHandle<()>>; 2],
    events: EventSender,
) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = shutdown => None,
    };

    let status = match exited {
        Some(status) => status,
        None => {
            debug!("Terminating shell for {}", target);
            if let Some(pid) = child.id() {
                if let Err(e) = send_signal(pid, Signal::SIGTERM) {
                    warn!("Error sending SIGTERM to shell of {}: {}", target, e);
                }
            }
            match tokio::time::timeout(KILL_GRACE, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!("Shell of {} ignored SIGTERM, killing it", target);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill shell of {}: {}", target, e);
                    }
                    child.wait().await
                }
            }
        }
    };

    for pump in pumps.into_iter().flatten() {
        if tokio::time::timeout(DRAIN_GRACE, pump).await.is_err() {
            warn!("Output of {} did not drain after exit", target);
        }
    }

    let event = match status {
        Ok(status) => {
            info!(
                "Terminal process for {} exited with code: {:?}",
                target,
                status.code()
            );
            BackendEvent::Exit(status.code())
        }
        Err(e) => {
            warn!("Terminal process error for {}: {}", target, e);
            BackendEvent::Error(e.to_string())
        }
    };
    let _ = events.send(event).await;
}

/// Incremental UTF-8 decoding across read boundaries.
///
/// A multi-byte sequence cut by a read is held back until the next chunk completes it.
/// Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
    finished: bool,
}

impl Utf8Decoder {
    pub(crate) fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut input: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    input = &[];
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }

        let remaining = input.to_vec();
        self.pending = remaining;
        out
    }

    /// Flushes whatever is still held back. The decoder accepts no more input afterwards.
    pub(crate) fn finish(&mut self) -> String {
        self.finished = true;
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }
}
