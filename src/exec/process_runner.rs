// src/exec/process_runner.rs

//! Single script process runner.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::config::ExecLimits;
use crate::exec::command::ScriptCommand;
use crate::exec::event::{OutputEvent, StreamSource, Termination};

const EVENT_BUFFER: usize = 64;
const CHUNK_SIZE: usize = 8 * 1024;

/// Spawn `command` on a background Tokio task and return the receiving end
/// of its event stream.
///
/// The stream yields `Started`, then `Chunk`s from both pipes, and always
/// ends with exactly one `Terminal` event.
pub fn spawn_runner(command: ScriptCommand, limits: ExecLimits) -> mpsc::Receiver<OutputEvent> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(async move {
        run_process(command, limits, tx).await;
    });
    rx
}

/// Run a single process to completion, emitting events on `tx`.
///
/// Any failure to spawn or wait on the child is converted into a
/// `Termination::Failed` rather than returned, so the caller always sees a
/// terminal event.
pub async fn run_process(
    command: ScriptCommand,
    limits: ExecLimits,
    tx: mpsc::Sender<OutputEvent>,
) {
    let termination = match run_process_inner(&command, limits, &tx).await {
        Ok(termination) => termination,
        Err(err) => {
            error!(cmd = %command, error = %format!("{err:#}"), "script execution error");
            Termination::failed(format!("{err:#}"))
        }
    };

    if tx.send(OutputEvent::Terminal(termination)).await.is_err() {
        debug!(cmd = %command, "event receiver dropped before terminal event");
    }
}

async fn run_process_inner(
    command: &ScriptCommand,
    limits: ExecLimits,
    tx: &mpsc::Sender<OutputEvent>,
) -> Result<Termination> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref dir) = command.working_dir {
        cmd.current_dir(dir);
    }

    // Own process group, so termination also reaches grandchildren.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning '{}'", command))?;

    let pid = child.id();
    info!(cmd = %command, pid = ?pid, timeout = ?limits.timeout, "script process started");
    let _ = tx.send(OutputEvent::Started { pid }).await;

    let mut pumps = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        pumps.push(spawn_pump(stdout, StreamSource::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(spawn_pump(stderr, StreamSource::Stderr, tx.clone()));
    }

    let (status, timed_out) = wait_with_timeout(&mut child, command, limits).await?;
    drain_pumps(pumps, limits.kill_grace).await;

    let termination = termination_from_status(status, timed_out);
    info!(cmd = %command, pid = ?pid, ?termination, "script process exited");
    Ok(termination)
}

/// Wait for the child, enforcing the timeout.
///
/// On timeout the child gets SIGTERM; if it is still alive after
/// `kill_grace` it gets SIGKILL. The timer future is dropped on every path.
async fn wait_with_timeout(
    child: &mut Child,
    command: &ScriptCommand,
    limits: ExecLimits,
) -> Result<(ExitStatus, bool)> {
    let timer = sleep(limits.timeout);
    tokio::pin!(timer);

    tokio::select! {
        status = child.wait() => {
            let status = status.with_context(|| format!("waiting for '{}'", command))?;
            return Ok((status, false));
        }
        _ = &mut timer => {}
    }

    warn!(cmd = %command, timeout = ?limits.timeout, "script timed out; sending SIGTERM");
    terminate(child, command);

    match timeout(limits.kill_grace, child.wait()).await {
        Ok(status) => {
            let status = status.with_context(|| format!("waiting for '{}'", command))?;
            Ok((status, true))
        }
        Err(_) => {
            warn!(
                cmd = %command,
                kill_grace = ?limits.kill_grace,
                "script ignored SIGTERM; killing"
            );
            force_kill(child, command);
            let status = child
                .wait()
                .await
                .with_context(|| format!("waiting for killed '{}'", command))?;
            Ok((status, true))
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child, command: &ScriptCommand) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!(cmd = %command, pid, error = %e, "failed to send SIGTERM; killing");
                force_kill(child, command);
            }
        }
        None => debug!(cmd = %command, "process already reaped before SIGTERM"),
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child, command: &ScriptCommand) {
    force_kill(child, command);
}

fn force_kill(child: &mut Child, command: &ScriptCommand) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
    }

    if let Err(e) = child.start_kill() {
        debug!(cmd = %command, error = %e, "start_kill failed; process likely gone");
    }
}

fn spawn_pump<R>(mut reader: R, source: StreamSource, tx: mpsc::Sender<OutputEvent>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let event = OutputEvent::Chunk {
                        source,
                        data: buf[..n].to_vec(),
                    };
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(%source, error = %e, "error reading child pipe");
                    break;
                }
            }
        }
    })
}

/// Wait for the pipe readers to hit EOF.
///
/// A detached grandchild can keep a pipe open after the child has exited, so
/// readers still running after `grace` are aborted.
async fn drain_pumps(pumps: Vec<JoinHandle<()>>, grace: Duration) {
    let deadline = Instant::now() + grace;
    for pump in pumps {
        let abort = pump.abort_handle();
        if timeout_at(deadline, pump).await.is_err() {
            warn!("child pipe still open after exit; abandoning reader");
            abort.abort();
        }
    }
}

fn termination_from_status(status: ExitStatus, timed_out: bool) -> Termination {
    Termination::Exited {
        exit_code: status.code(),
        signal: signal_of(&status),
        timed_out,
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(signal_name)
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<String> {
    None
}

#[cfg(unix)]
fn signal_name(signo: i32) -> String {
    nix::sys::signal::Signal::try_from(signo)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("SIG{signo}"))
}
