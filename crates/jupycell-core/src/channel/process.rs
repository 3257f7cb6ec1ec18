//! Kernel channels backed by a child process.
//!
//! The default kernel is a Python interpreter running the bundled driver
//! script, which speaks the line protocol from [`super::protocol`].

use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::message::Message;

use super::protocol::{KernelRequest, read_message, write_message};
use super::{ChannelFactory, MessageChannel};

/// Python driver executed by the default kernel command.
const PYTHON_DRIVER: &str = include_str!("../../kernel/driver.py");

/// How long a kernel gets to exit after a shutdown request.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Program and arguments used to launch a kernel process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl KernelCommand {
    /// Run the bundled driver with the given Python interpreter.
    pub fn python(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            program: interpreter.into(),
            args: vec!["-u".to_string(), "-c".to_string(), PYTHON_DRIVER.to_string()],
        }
    }

    /// Run the bundled driver with the first Python interpreter found.
    ///
    /// Looks in the following order:
    /// 1. `JUPYCELL_PYTHON` environment variable
    /// 2. `python3` on PATH
    /// 3. `python` on PATH
    pub fn discover() -> Result<Self> {
        if let Ok(path) = std::env::var("JUPYCELL_PYTHON") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Self::python(path));
            }
            tracing::warn!(
                "JUPYCELL_PYTHON points to missing file {}, searching PATH",
                path.display()
            );
        }

        for name in ["python3", "python"] {
            if let Ok(path) = which::which(name) {
                return Ok(Self::python(path));
            }
        }

        Err(Error::ChannelUnavailable(
            "Could not find a Python interpreter. Set JUPYCELL_PYTHON or ensure python3 is in PATH."
                .to_string(),
        ))
    }
}

/// Starts a [`ProcessChannel`] per kernel.
#[derive(Debug, Clone)]
pub struct ProcessChannelFactory {
    command: Option<KernelCommand>,
}

impl ProcessChannelFactory {
    /// Launch kernels with a fixed command.
    pub fn new(command: KernelCommand) -> Self {
        Self {
            command: Some(command),
        }
    }

    /// Discover the interpreter each time a kernel is started.
    pub fn discover() -> Self {
        Self { command: None }
    }
}

impl ChannelFactory for ProcessChannelFactory {
    fn start(&self) -> Result<Box<dyn MessageChannel>> {
        let command = match &self.command {
            Some(command) => command.clone(),
            None => KernelCommand::discover()?,
        };
        Ok(Box::new(ProcessChannel::spawn(&command)?))
    }
}

/// Channel to a kernel running as a child process.
///
/// A reader thread decodes the kernel's stdout into a queue so that
/// [`MessageChannel::poll`] can wait with a timeout.
pub struct ProcessChannel {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    messages: Receiver<Message>,
    reader: Option<JoinHandle<()>>,
    closed: bool,
}

impl ProcessChannel {
    /// Spawn a kernel process.
    pub fn spawn(command: &KernelCommand) -> Result<Self> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // Let kernel stderr pass through for debugging
            .spawn()
            .map_err(|e| {
                Error::ChannelUnavailable(format!(
                    "Failed to spawn kernel process '{}': {}",
                    command.program.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::ChannelUnavailable("Failed to get kernel stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ChannelUnavailable("Failed to get kernel stdout".to_string()))?;

        let pid = child.id();
        let (tx, rx) = mpsc::channel();
        let reader = thread::Builder::new()
            .name(format!("kernel-{}-reader", pid))
            .spawn(move || {
                let mut stdout = BufReader::new(stdout);
                loop {
                    match read_message::<_, Message>(&mut stdout) {
                        Ok(Some(message)) => {
                            if tx.send(message).is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(Error::Serialization(e)) => {
                            tracing::warn!("Kernel {} sent an unreadable line: {}", pid, e);
                        }
                        Err(e) => {
                            tracing::warn!("Kernel {} stdout closed: {}", pid, e);
                            break;
                        }
                    }
                }
                tracing::debug!("Kernel {} reader exiting", pid);
            })?;

        tracing::info!(
            "Started kernel process {} ({})",
            pid,
            command.program.display()
        );

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            messages: rx,
            reader: Some(reader),
            closed: false,
        })
    }

    /// Process ID of the kernel.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Check if the kernel process is still running.
    pub fn is_alive(&mut self) -> bool {
        if self.closed {
            return false;
        }
        matches!(self.child.try_wait(), Ok(None))
    }

    fn send(&mut self, request: &KernelRequest) -> Result<()> {
        if self.closed {
            return Err(Error::Channel("Kernel has been shut down".to_string()));
        }
        write_message(&mut self.stdin, request)
    }
}

impl MessageChannel for ProcessChannel {
    fn execute(&mut self, code: &str) -> Result<String> {
        let msg_id = uuid::Uuid::new_v4().to_string();
        self.send(&KernelRequest::ExecuteRequest {
            msg_id: msg_id.clone(),
            code: code.to_string(),
        })?;
        Ok(msg_id)
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<Message>> {
        match self.messages.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Channel("Kernel output stream closed".to_string()))
            }
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        // Ask nicely first, then make sure
        let _ = self.send(&KernelRequest::ShutdownRequest);
        self.closed = true;
        thread::sleep(SHUTDOWN_GRACE);

        if matches!(self.child.try_wait(), Ok(None)) {
            if let Err(e) = self.child.kill() {
                tracing::warn!("Failed to kill kernel {}: {}", self.child.id(), e);
            }
        }
        let status = self.child.wait()?;
        tracing::info!("Kernel process {} exited ({})", self.child.id(), status);

        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        Ok(())
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
