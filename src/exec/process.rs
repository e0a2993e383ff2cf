// src/exec/process.rs

//! Real OS process handle.

use std::future::Future;
use std::os::unix::process::ExitStatusExt;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::batch::Command;
use crate::errors::{Result, XbatchError};

use super::backend::{ExitState, ProcessHandle};
use super::output::OutputMux;

/// One launched child process plus the task copying its output.
///
/// stdout and stderr share the write end of a single pipe, so the reader sees
/// one merged stream in the order the child wrote it. The child leads its own
/// process group; signals go to the whole group so that anything it forked
/// and that still holds the pipe is stopped with it.
#[derive(Debug)]
pub struct OsProcess {
    child: Child,
    pid: Option<u32>,
    slot: usize,
    exit_code: Option<i32>,
    reader: Option<JoinHandle<()>>,
}

impl OsProcess {
    pub fn spawn(
        command: &Command,
        slot: usize,
        prefixed: bool,
        output: OutputMux,
    ) -> Result<Self> {
        let (tx, rx) = pipe::pipe()?;
        let stdout_end = tx.into_blocking_fd()?;
        let stderr_end = stdout_end.try_clone()?;

        let mut cmd = tokio::process::Command::new(command.program());
        cmd.args(command.args())
            .stdin(Stdio::inherit())
            .stdout(stdout_end)
            .stderr(stderr_end)
            .process_group(0)
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| XbatchError::Spawn {
            program: command.program().to_string(),
            source,
        })?;
        // The command still owns our copies of the write end; the reader only
        // sees EOF once they are closed.
        drop(cmd);

        let pid = child.id();
        info!(slot, pid, cmd = %command, "spawned process");

        let (marker, prefix) = if prefixed { (slot, pid) } else { (0, None) };
        let reader = tokio::spawn(forward_output(rx, slot, marker, prefix, output));

        Ok(Self {
            child,
            pid,
            slot,
            exit_code: None,
            reader: Some(reader),
        })
    }

    /// Signal the process group. The group id outlives the leader's exit
    /// for as long as any member is alive, and is not reused meanwhile.
    fn signal_group(&mut self, sig: Signal) -> Result<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        match signal::killpg(Pid::from_raw(pid as i32), sig) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(std::io::Error::from(e).into()),
        }
    }
}

impl ProcessHandle for OsProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn slot(&self) -> usize {
        self.slot
    }

    fn poll(&mut self) -> Result<ExitState> {
        if let Some(code) = self.exit_code {
            return Ok(ExitState::Exited(code));
        }
        match self.child.try_wait()? {
            Some(status) => {
                let code = exit_code(status);
                self.exit_code = Some(code);
                debug!(slot = self.slot, pid = self.pid, exit_code = code, "process exited");
                Ok(ExitState::Exited(code))
            }
            None => Ok(ExitState::Running),
        }
    }

    /// Running, or exited while something it forked still holds the output
    /// pipe open.
    fn is_active(&mut self) -> Result<bool> {
        if self.poll()? == ExitState::Running {
            return Ok(true);
        }
        Ok(self.reader.as_ref().is_some_and(|reader| !reader.is_finished()))
    }

    fn terminate(&mut self) -> Result<()> {
        if !self.is_active()? {
            return Ok(());
        }
        debug!(slot = self.slot, pid = self.pid, "sending SIGTERM to process group");
        self.signal_group(Signal::SIGTERM)
    }

    fn kill(&mut self) -> Result<()> {
        if !self.is_active()? {
            return Ok(());
        }
        debug!(slot = self.slot, pid = self.pid, "sending SIGKILL to process group");
        self.signal_group(Signal::SIGKILL)
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + '_>> {
        Box::pin(async move {
            let code = match self.exit_code {
                Some(code) => code,
                None => {
                    let code = exit_code(self.child.wait().await?);
                    self.exit_code = Some(code);
                    code
                }
            };

            // Awaited by reference: if this future is dropped, the next
            // wait() still finds the reader and flushes the rest.
            if let Some(reader) = self.reader.as_mut() {
                if let Err(e) = reader.await {
                    warn!(slot = self.slot, error = %e, "output reader task failed");
                }
                self.reader = None;
            }

            Ok(code)
        })
    }
}

/// Copy the child's merged output into the multiplexer, one line at a time.
async fn forward_output(
    rx: pipe::Receiver,
    slot: usize,
    marker: usize,
    prefix: Option<u32>,
    output: OutputMux,
) {
    let mut reader = BufReader::new(rx);
    let mut buf = Vec::with_capacity(256);
    let mut sink_failed = false;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if sink_failed {
                    // Keep draining so the child never blocks on a full pipe.
                    continue;
                }
                let line = String::from_utf8_lossy(&buf);
                if let Err(e) = output.emit(marker, &line, prefix) {
                    warn!(slot, error = %e, "failed to write process output; discarding the rest");
                    sink_failed = true;
                }
            }
            Err(e) => {
                warn!(slot, error = %e, "failed to read process output");
                break;
            }
        }
    }

    debug!(slot, "output reader finished");
}

/// Numeric exit code; death by signal N maps to `128 + N`.
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}
