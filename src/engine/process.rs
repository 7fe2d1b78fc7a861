use super::EngineInvocation;
use anyhow::{anyhow, Context, Result};
use std::io::{IsTerminal, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long to keep reading output after the converter is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub enum ProcessExit {
    Exited {
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// Killed, with everything it started, after the deadline passed.
    TimedOut { after: Duration, stderr: Vec<u8> },
}

/// Spawn the converter and wait for it, killing its whole process tree once
/// `timeout` elapses. Spawn failures (missing binary, permissions) are errors.
pub fn run(inv: &EngineInvocation, timeout: Option<Duration>) -> Result<ProcessExit> {
    debug!(
        "spawn {} {:?} timeout={:?}",
        inv.program.display(),
        inv.args,
        timeout
    );
    let mut cmd = Command::new(&inv.program);
    cmd.args(&inv.args);
    for (k, v) in &inv.env {
        cmd.env(k, v);
    }
    cmd.stdin(if inv.stdin {
        Stdio::inherit()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    // A background process group reading a terminal would be stopped by SIGTTIN.
    if !(inv.stdin && std::io::stdin().is_terminal()) {
        own_process_group(&mut cmd);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning converter: {}", inv.program.display()))?;

    // Drain pipes while waiting so a chatty converter can't block on a full
    // stdout/stderr buffer.
    let stdout_rx = drain(child.stdout.take(), "stdout");
    let stderr_rx = drain(child.stderr.take(), "stderr");

    let waited = wait_with_deadline(&mut child, timeout);
    if waited.is_err() {
        kill_tree(&mut child);
        let _ = child.wait();
    }
    // Descendants that outlive the converter may hold the pipes open; don't
    // wait on them indefinitely.
    let stdout = collect(stdout_rx, "stdout")?;
    let stderr = collect(stderr_rx, "stderr")?;

    match waited? {
        Some(status) => Ok(ProcessExit::Exited {
            status,
            stdout,
            stderr,
        }),
        None => Ok(ProcessExit::TimedOut {
            after: timeout.unwrap_or_default(),
            stderr,
        }),
    }
}

/// `None` means the deadline passed and the converter tree was killed.
fn wait_with_deadline(child: &mut Child, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child
            .wait()
            .map(Some)
            .with_context(|| "waiting for converter");
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            return Ok(Some(status));
        }

        if start.elapsed() >= timeout {
            warn!(
                "converter timed out after {:?}; killing pid {} and its children",
                timeout,
                child.id()
            );
            kill_tree(child);
            child.wait().with_context(|| "wait after kill")?;
            return Ok(None);
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// Must run before the converter is reaped so its pid can't be reused.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        // The converter leads its own group: pgid == pid.
        let pgid = child.id() as libc::pid_t;
        // SAFETY: killpg only sends a signal; no memory is shared.
        if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
            debug!("killpg {pgid}: {}", std::io::Error::last_os_error());
        }
    }

    #[cfg(windows)]
    {
        let pid = child.id().to_string();
        let _ = Command::new("taskkill")
            .args(["/PID", &pid, "/T", "/F"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }

    if let Err(e) = child.kill() {
        // Already gone, e.g. taken down with its group.
        debug!("kill: {e}");
    }
}

fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    name: &'static str,
) -> Receiver<Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let res = match pipe {
            Some(mut pipe) => pipe
                .read_to_end(&mut buf)
                .map(|_| buf)
                .with_context(|| format!("read {name}")),
            None => Ok(buf),
        };
        // The receiver is gone if we stopped waiting.
        let _ = tx.send(res);
    });
    rx
}

fn collect(rx: Receiver<Result<Vec<u8>>>, name: &str) -> Result<Vec<u8>> {
    match rx.recv_timeout(DRAIN_GRACE) {
        Ok(res) => res,
        Err(RecvTimeoutError::Timeout) => {
            warn!("converter {name} still held open by a leftover process; not waiting for it");
            Ok(Vec::new())
        }
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("{name} reader thread panicked")),
    }
}
