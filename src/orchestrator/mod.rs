//! Orchestrator (C10, §4.10): the five-phase driver — Plan, Present,
//! Execute, Validate, Report — that ties C1–C9 together into one run.

mod execute;
mod plan;
mod report;

pub use report::{PackageReport, PackageStatus, Report};

use crate::exec::Executor;
use anyhow::Result;
use depsync_common::config::{RootConfig, SystemTestRunMode};
use depsync_common::error::CoreError;
use depsync_common::model::{Scope, UpdatePlan};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// `--type prod|dev|all` (§6 CLI surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    Prod,
    Dev,
    All,
}

/// `--name`, `--group`, `--type`, `--rule` (§6 CLI surface). All are
/// optional; an absent filter admits everything.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub name: Option<String>,
    pub group: Option<String>,
    pub dep_type: Option<TypeFilter>,
    pub rule: Option<String>,
}

/// `--dry-run` is the one Plan-phase output the orchestrator itself
/// must honor, not something a caller can simulate by skipping the
/// call (that would also skip Plan/Present validation); §4.10
/// "dry-run short-circuit".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Apply,
    DryRun,
}

/// The run-scoped knobs an external CLI collects (§6 "CLI surface");
/// the core only needs these, never a config file path or output
/// format.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: ExecutionMode,
    /// Skip the confirmation prompt in Present (§4.10 phase 2).
    pub yes: bool,
    pub scope_override: Option<Scope>,
    pub skip_lock: bool,
    pub continue_on_fail: bool,
    pub no_timeout: bool,
    pub skip_system_tests: bool,
    pub system_test_mode_override: Option<SystemTestRunMode>,
    pub filters: Filters,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            mode: ExecutionMode::Apply,
            yes: false,
            scope_override: None,
            skip_lock: false,
            continue_on_fail: false,
            no_timeout: false,
            skip_system_tests: false,
            system_test_mode_override: None,
            filters: Filters::default(),
        }
    }
}

/// Phase 2 ("Present", §4.10): rendering the plan and obtaining
/// confirmation are delegated to an external collaborator (§1
/// Non-goals, §6). The orchestrator only needs the two calls below.
pub trait Presenter: Send + Sync {
    fn present(&self, plan: &UpdatePlan);
    fn confirm(&self) -> bool;
}

/// A `Presenter` that renders nothing and answers confirmation with a
/// fixed value — the shape `--yes` and test callers need; an
/// interactive CLI renderer is expected to provide its own.
pub struct FixedPresenter {
    pub confirmed: bool,
}

impl Presenter for FixedPresenter {
    fn present(&self, _plan: &UpdatePlan) {}

    fn confirm(&self) -> bool {
        self.confirmed
    }
}

pub struct Orchestrator {
    root: PathBuf,
    config: Arc<RootConfig>,
    executor: Arc<dyn Executor>,
    presenter: Arc<dyn Presenter>,
}

impl Orchestrator {
    pub fn new(
        root: impl Into<PathBuf>,
        config: Arc<RootConfig>,
        executor: Arc<dyn Executor>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Orchestrator {
            root: root.into(),
            config,
            executor,
            presenter,
        }
    }

    /// Phase 1 only, exposed directly for callers that want to render a
    /// plan without running it (e.g. a `--dry-run` preview UI that
    /// wants the plan before deciding whether to call `run`).
    pub async fn plan(&self, options: &RunOptions, cancel: &CancellationToken) -> plan::PlanOutput {
        plan::build(&self.root, Arc::clone(&self.config), Arc::clone(&self.executor), options, cancel).await
    }

    /// Runs all five phases. Configuration and rollback errors bubble
    /// out directly (§7); everything else resolves into a per-package
    /// entry in the returned [`Report`].
    pub async fn run(&self, options: RunOptions, cancel: &CancellationToken) -> Result<Report> {
        if !options.skip_system_tests {
            crate::systest::run_preflight(&self.config.system_tests, &self.root, self.executor.as_ref(), cancel)?;
        }

        let plan_output = self.plan(&options, cancel).await;

        let mut packages: Vec<PackageReport> = plan_output
            .statuses
            .into_iter()
            .map(|(pkg, status)| PackageReport {
                rule: pkg.rule,
                name: pkg.name,
                group: pkg.group,
                status,
            })
            .collect();

        let dry_run = matches!(options.mode, ExecutionMode::DryRun);

        if plan_output.plan.updates.is_empty() {
            return Ok(Report { packages, scan_errors: plan_output.scan_errors, dry_run });
        }

        if !dry_run && !options.yes {
            self.presenter.present(&plan_output.plan);
            if !self.presenter.confirm() {
                return Err(CoreError::Cancelled.into());
            }
        } else {
            self.presenter.present(&plan_output.plan);
        }

        if dry_run {
            for update in &plan_output.plan.updates {
                packages.push(PackageReport {
                    rule: update.package.rule.clone(),
                    name: update.package.name.clone(),
                    group: update.group.clone(),
                    status: PackageStatus::Succeeded {
                        from: update.from_version.clone(),
                        to: update.to_version.clone(),
                    },
                });
            }
            return Ok(Report { packages, scan_errors: plan_output.scan_errors, dry_run });
        }

        let exec_output = execute::run(
            &self.config,
            &plan_output.plan.updates,
            self.executor.as_ref(),
            options.continue_on_fail,
            options.skip_system_tests,
            options.system_test_mode_override,
            &self.root,
            cancel,
        );

        for (update, status) in exec_output.results {
            packages.push(PackageReport {
                rule: update.package.rule,
                name: update.package.name,
                group: update.group,
                status,
            });
        }

        Ok(Report { packages, scan_errors: plan_output.scan_errors, dry_run: false })
    }
}
