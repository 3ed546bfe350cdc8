//! Command execution substrate (C1, §4.1): a safe, shell-aware command
//! runner with templated interpolation, environment injection,
//! timeouts, and process-group teardown. Every other component invokes
//! external tools exclusively through this module.

mod parser;
mod process;
mod template;

use anyhow::Result;
use depsync_common::error::CoreError;
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Everything one `run()` call needs, gathered so call sites don't pass
/// six positional arguments around (teacher's `ShellConfig` plays the
/// same "inputs bundle" role for `execute_command`).
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub commands: String,
    pub env: HashMap<String, String>,
    pub dir: std::path::PathBuf,
    pub timeout_seconds: u64,
    pub substitutions: HashMap<String, String>,
}

/// Dependency-injection seam for C1 (§9 "Executor abstraction"). The
/// orchestrator, fetcher, applier, and system-test runner all take an
/// `&dyn Executor` so tests can supply a [`FakeExecutor`] instead of
/// touching real subprocesses.
pub trait Executor: Send + Sync {
    fn run(&self, request: &ExecRequest, cancel: &CancellationToken) -> Result<Vec<u8>>;
}

/// Real executor: substitutes, parses into command groups, and runs
/// each group through the user's login shell.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        ShellExecutor
    }

    fn resolve_shell() -> String {
        std::env::var("SHELL").unwrap_or_else(|_| default_shell().to_string())
    }
}

#[cfg(unix)]
fn default_shell() -> &'static str {
    "/bin/sh"
}

#[cfg(not(unix))]
fn default_shell() -> &'static str {
    "cmd.exe"
}

impl Executor for ShellExecutor {
    fn run(&self, request: &ExecRequest, cancel: &CancellationToken) -> Result<Vec<u8>> {
        run(request, cancel)
    }
}

/// The C1 contract: `run(commands, env, dir, timeout_seconds,
/// substitutions, cancel) -> (stdout_bytes, err)`, modeled in Rust as
/// `Result<Vec<u8>>` with the error carrying a [`CoreError`].
pub fn run(request: &ExecRequest, cancel: &CancellationToken) -> Result<Vec<u8>> {
    if request.commands.trim().is_empty() {
        return Err(CoreError::Exec {
            exit_info: "empty command".into(),
            detail: "command block was empty or whitespace-only".into(),
        }
        .into());
    }

    let expanded_env: HashMap<String, String> = request
        .env
        .iter()
        .map(|(k, v)| (k.clone(), depsync_common::text::expand_env_vars(v)))
        .collect();

    let substituted = template::substitute(&request.commands, &request.substitutions);
    let groups = parser::split_into_groups(&substituted);

    if groups.is_empty() {
        return Err(CoreError::Exec {
            exit_info: "empty command".into(),
            detail: "command block had no runnable groups".into(),
        }
        .into());
    }

    let shell = ShellExecutor::resolve_shell();
    let mut last_stdout = Vec::new();

    for group in &groups {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled.into());
        }

        let joined = group.joined();
        let outcome = process::run_group(
            &shell,
            &joined,
            &request.dir,
            &expanded_env,
            request.timeout_seconds,
            cancel,
        )?;

        match outcome {
            process::WaitOutcome::Completed(out) => {
                if !out.success {
                    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
                    let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
                    let detail = if !stderr.is_empty() { stderr } else { stdout };
                    let exit_info = match out.code {
                        Some(code) => format!("command exited with status {code}"),
                        None => "command terminated by signal".to_string(),
                    };
                    return Err(CoreError::Exec { exit_info, detail }.into());
                }
                last_stdout = out.stdout;
            }
            process::WaitOutcome::TimedOut { seconds } => {
                log::warn!(
                    target: "depsync::exec",
                    "command group killed after {seconds}s timeout: {joined}",
                );
                return Err(CoreError::Timeout { seconds }.into());
            }
            process::WaitOutcome::Cancelled => {
                return Err(CoreError::Cancelled.into());
            }
        }
    }

    Ok(last_stdout)
}

/// Strip a leading UTF-8 BOM, used before parsing fetcher output (§4.3).
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}

/// A scripted executor for unit/integration tests (§9): returns queued
/// results in call order instead of spawning anything, and records every
/// request it was asked to run so assertions can inspect call order,
/// substitutions, and working directories.
#[derive(Default)]
pub struct FakeExecutor {
    pub responses: std::sync::Mutex<std::collections::VecDeque<Result<Vec<u8>, String>>>,
    pub calls: std::sync::Mutex<Vec<ExecRequest>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, stdout: impl Into<Vec<u8>>) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(stdout.into()));
        self
    }

    pub fn push_err(&self, message: impl Into<String>) -> &Self {
        self.responses.lock().unwrap().push_back(Err(message.into()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Executor for FakeExecutor {
    fn run(&self, request: &ExecRequest, _cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(message)) => Err(CoreError::Exec {
                exit_info: "fake executor error".into(),
                detail: message,
            }
            .into()),
            None => Err(CoreError::Exec {
                exit_info: "fake executor exhausted".into(),
                detail: "no queued response for this call".into(),
            }
            .into()),
        }
    }
}

pub fn resolve_dir_or<'a>(dir: Option<&'a Path>, fallback: &'a Path) -> &'a Path {
    dir.unwrap_or(fallback)
}
