//! System-test runner (C9, §4.9): preflight and validation cadences
//! around a suite of named command blocks.

use crate::exec::{ExecRequest, Executor};
use anyhow::Result;
use depsync_common::config::{SystemTestCfg, SystemTestsConfig};
use depsync_common::error::CoreError;
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub struct TestResult {
    pub name: String,
    pub ok: bool,
    pub error: Option<String>,
}

pub struct SuiteOutcome {
    pub results: Vec<TestResult>,
    /// True when at least one test without `continue_on_fail` failed.
    pub failed: bool,
}

impl SuiteOutcome {
    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.ok)
    }
}

/// Runs once before any update, when enabled, and blocks all updates on
/// failure (§4.9 "Preflight failure blocks all updates").
pub fn run_preflight(
    config: &SystemTestsConfig,
    dir: &Path,
    executor: &dyn Executor,
    cancel: &CancellationToken,
) -> Result<()> {
    if !config.run_preflight {
        return Ok(());
    }

    let outcome = run_suite(&config.tests, config.stop_on_fail, dir, executor, cancel);
    if outcome.failed {
        let failed_names: Vec<&str> = outcome.failures().map(|r| r.name.as_str()).collect();
        return Err(CoreError::Apply(format!(
            "preflight system tests failed ({}); use --skip-system-tests or --dry-run to bypass",
            failed_names.join(", ")
        ))
        .into());
    }
    Ok(())
}

/// Runs the configured validation suite (the caller interprets
/// `run_mode` to decide cadence — `after_each` per group, `after_all`
/// once at the end; §4.9, §4.10).
pub fn run_validation(
    config: &SystemTestsConfig,
    dir: &Path,
    executor: &dyn Executor,
    cancel: &CancellationToken,
) -> SuiteOutcome {
    run_suite(&config.tests, config.stop_on_fail, dir, executor, cancel)
}

fn run_suite(
    tests: &[SystemTestCfg],
    stop_on_fail: bool,
    dir: &Path,
    executor: &dyn Executor,
    cancel: &CancellationToken,
) -> SuiteOutcome {
    let mut results = Vec::new();
    let mut failed = false;

    for test in tests {
        let request = ExecRequest {
            commands: test.commands.clone(),
            env: test.env.clone(),
            dir: dir.to_path_buf(),
            timeout_seconds: test.timeout_seconds,
            substitutions: HashMap::new(),
        };

        let run_result = executor.run(&request, cancel);
        let ok = run_result.is_ok();
        let error = run_result.err().map(|e| e.to_string());

        if !ok && !test.continue_on_fail {
            failed = true;
        }

        let should_stop = !ok && stop_on_fail;
        results.push(TestResult {
            name: test.name.clone(),
            ok,
            error,
        });

        if should_stop {
            break;
        }
    }

    SuiteOutcome { results, failed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeExecutor;

    fn test_cfg(name: &str, continue_on_fail: bool) -> SystemTestCfg {
        SystemTestCfg {
            name: name.to_string(),
            commands: "echo ok".to_string(),
            timeout_seconds: 30,
            continue_on_fail,
            env: HashMap::new(),
        }
    }

    #[test]
    fn preflight_disabled_is_a_noop() {
        let config = SystemTestsConfig {
            run_preflight: false,
            tests: vec![test_cfg("smoke", false)],
            ..Default::default()
        };
        let fake = FakeExecutor::new();
        let cancel = CancellationToken::new();
        run_preflight(&config, Path::new("."), &fake, &cancel).unwrap();
        assert_eq!(fake.call_count(), 0);
    }

    #[test]
    fn preflight_failure_blocks_and_hints_bypass_flags() {
        let config = SystemTestsConfig {
            run_preflight: true,
            tests: vec![test_cfg("smoke", false)],
            ..Default::default()
        };
        let fake = FakeExecutor::new();
        fake.push_err("exit 1");
        let cancel = CancellationToken::new();
        let err = run_preflight(&config, Path::new("."), &fake, &cancel).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("--skip-system-tests"));
        assert!(message.contains("--dry-run"));
    }

    #[test]
    fn continue_on_fail_does_not_count_toward_aggregate_failure() {
        let config = SystemTestsConfig {
            run_preflight: true,
            tests: vec![test_cfg("flaky", true)],
            ..Default::default()
        };
        let fake = FakeExecutor::new();
        fake.push_err("exit 1");
        let cancel = CancellationToken::new();
        run_preflight(&config, Path::new("."), &fake, &cancel).unwrap();
    }

    #[test]
    fn stop_on_fail_skips_remaining_tests() {
        let config = SystemTestsConfig {
            run_preflight: false,
            stop_on_fail: true,
            tests: vec![test_cfg("first", false), test_cfg("second", false)],
        };
        let fake = FakeExecutor::new();
        fake.push_err("exit 1");
        let cancel = CancellationToken::new();
        let outcome = run_validation(&config, Path::new("."), &fake, &cancel);
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.failed);
    }

    #[test]
    fn without_stop_on_fail_all_tests_run() {
        let config = SystemTestsConfig {
            run_preflight: false,
            stop_on_fail: false,
            tests: vec![test_cfg("first", false), test_cfg("second", false)],
        };
        let fake = FakeExecutor::new();
        fake.push_err("exit 1");
        fake.push_ok(Vec::new());
        let cancel = CancellationToken::new();
        let outcome = run_validation(&config, Path::new("."), &fake, &cancel);
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.failed);
    }
}
