//! Phase 1 ("Plan", §4.10): scan → lock-resolve → fetch → filter →
//! select, producing an [`UpdatePlan`] plus a status for every package
//! that did not make it into the plan (up-to-date, ignored, floating,
//! or errored).
//!
//! Per-package fetch/filter/select work runs on `tokio::task::JoinSet`
//! (§9 "Concurrency mapping"): each invocation is pure given its
//! inputs, so packages within a rule — and across rules — can be
//! evaluated concurrently. Results are merged back in scan order so the
//! resulting plan listing stays deterministic (§5 "Plan construction
//! MAY be parallel ... merged in input order").

use super::{Filters, PackageStatus, RunOptions, TypeFilter};
use crate::exec::Executor;
use crate::{fetch, filter, lock, scan, select, version};
use depsync_common::config::RootConfig;
use depsync_common::model::{
    DependencyType, LockOutcome, Package, PackageUpdate, Scope, UpdatePlan,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct PlanOutput {
    pub plan: UpdatePlan,
    /// Non-plan statuses keyed by scan order, reported alongside the
    /// plan (§4.10 phase 5 "up-to-date, ignored, floating").
    pub statuses: Vec<(Package, PackageStatus)>,
    /// Manifest scan errors (§4.6 "a single manifest's parse failure is
    /// attached to its path rather than aborting the whole scan").
    pub scan_errors: Vec<(PathBuf, String)>,
}

fn matches_filters(pkg: &Package, filters: &Filters) -> bool {
    if let Some(name) = &filters.name {
        if &pkg.name != name {
            return false;
        }
    }
    if let Some(group) = &filters.group {
        if pkg.group.as_deref() != Some(group.as_str()) {
            return false;
        }
    }
    if let Some(rule) = &filters.rule {
        if &pkg.rule != rule {
            return false;
        }
    }
    match filters.dep_type {
        None | Some(TypeFilter::All) => true,
        Some(TypeFilter::Prod) => pkg.dependency_type == DependencyType::Prod,
        Some(TypeFilter::Dev) => pkg.dependency_type == DependencyType::Dev,
    }
}

/// Build the plan for one scan root against `config`.
pub async fn build(
    root: &Path,
    config: Arc<RootConfig>,
    executor: Arc<dyn Executor>,
    options: &RunOptions,
    cancel: &CancellationToken,
) -> PlanOutput {
    let scan_result = scan::scan(root, &config.rules);
    let scan_errors = scan_result
        .errors
        .into_iter()
        .map(|(path, err)| (path, err.to_string()))
        .collect();

    let eligible: Vec<Package> = scan_result
        .packages
        .into_iter()
        .filter(|p| p.is_updatable())
        .filter(|p| matches_filters(p, &options.filters))
        .collect();

    // Lock artifacts are resolved once per (rule, manifest directory)
    // up front — cheap, mostly file reads, and shared across every
    // package declared in that manifest — rather than redone inside
    // each package's parallel task.
    let mut artifacts: HashMap<(String, PathBuf), Option<depsync_common::model::LockArtifact>> =
        HashMap::new();
    if !options.skip_lock {
        for pkg in &eligible {
            let Some(dir) = pkg.source.parent().map(Path::to_path_buf) else {
                continue;
            };
            let key = (pkg.rule.clone(), dir.clone());
            if artifacts.contains_key(&key) {
                continue;
            }
            let Some(rule) = config.rules.get(&pkg.rule) else {
                continue;
            };
            let resolved = if rule.lock_files.is_empty() {
                None
            } else {
                lock::resolve_artifact(rule, &dir, executor.as_ref(), cancel).ok()
            };
            artifacts.insert(key, resolved);
        }
    }

    let mut join_set = tokio::task::JoinSet::new();
    for (index, pkg) in eligible.into_iter().enumerate() {
        let Some(rule) = config.rules.get(&pkg.rule).cloned() else {
            continue;
        };
        let dir = pkg.source.parent().map(Path::to_path_buf).unwrap_or_default();
        let artifact = artifacts.get(&(pkg.rule.clone(), dir.clone())).cloned().flatten();
        let lock_configured = !rule.lock_files.is_empty();
        let executor = Arc::clone(&executor);
        let cancel = cancel.clone();
        let scope_override = options.scope_override;
        let no_timeout = options.no_timeout;
        let security = config.security.clone();

        join_set.spawn_blocking(move || {
            let outcome = lock::outcome_for(&pkg, artifact.as_ref(), lock_configured);
            let result = plan_one(&pkg, &rule, &outcome, scope_override, no_timeout, &security, executor.as_ref(), &cancel);
            (index, pkg, result)
        });
    }

    let mut slots: Vec<Option<(Package, PlannedOutcome)>> = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        let Ok((index, pkg, result)) = joined else {
            continue;
        };
        if slots.len() <= index {
            slots.resize_with(index + 1, || None);
        }
        slots[index] = Some((pkg, result));
    }

    let mut updates = Vec::new();
    let mut statuses = Vec::new();
    for slot in slots.into_iter().flatten() {
        let (pkg, outcome) = slot;
        match outcome {
            PlannedOutcome::Update {
                from_version,
                to_version,
                scope,
            } => {
                let group = pkg.group.clone();
                updates.push(PackageUpdate {
                    package: pkg,
                    from_version,
                    to_version,
                    scope,
                    group,
                });
            }
            PlannedOutcome::Status(status) => statuses.push((pkg, status)),
        }
    }

    PlanOutput {
        plan: UpdatePlan::sorted(updates),
        statuses,
        scan_errors,
    }
}

enum PlannedOutcome {
    Update {
        from_version: String,
        to_version: String,
        scope: Scope,
    },
    Status(PackageStatus),
}

#[allow(clippy::too_many_arguments)]
fn plan_one(
    pkg: &Package,
    rule: &depsync_common::config::RuleConfig,
    lock_outcome: &LockOutcome,
    scope_override: Option<Scope>,
    no_timeout: bool,
    security: &depsync_common::config::SecurityConfig,
    executor: &dyn Executor,
    cancel: &CancellationToken,
) -> PlannedOutcome {
    match lock_outcome {
        LockOutcome::Ignored => return PlannedOutcome::Status(PackageStatus::Ignored),
        LockOutcome::Floating => return PlannedOutcome::Status(PackageStatus::Floating),
        _ => {}
    }

    let mut resolved = pkg.clone();
    if let LockOutcome::Found(v) = lock_outcome {
        resolved.installed_version = Some(v.clone());
    }

    let manifest_dir = resolved.source.parent().unwrap_or_else(|| Path::new("."));
    let override_cfg = rule.package_overrides.get(&resolved.name);
    let effective = fetch::resolve_effective(&rule.outdated, override_cfg, no_timeout);

    let candidates = match fetch::list_newer_versions(
        &resolved.rule,
        &resolved.name,
        &resolved.version,
        resolved.constraint,
        &effective,
        manifest_dir,
        security,
        executor,
        cancel,
    ) {
        Ok(c) => c,
        Err(err) => {
            if let Some(core) = err.downcast_ref::<depsync_common::error::CoreError>() {
                if let depsync_common::error::CoreError::Unsupported(msg) = core {
                    return PlannedOutcome::Status(PackageStatus::Unsupported(msg.clone()));
                }
            }
            return PlannedOutcome::Status(PackageStatus::Failed(err.to_string()));
        }
    };

    let strategy = match version::build_strategy(effective.versioning) {
        Ok(s) => s,
        Err(err) => return PlannedOutcome::Status(PackageStatus::Failed(err.to_string())),
    };

    let filtered = filter::filter(&resolved, &candidates, scope_override, &*strategy);

    match select::select(&resolved, &filtered, scope_override, &*strategy) {
        Some(selection) => PlannedOutcome::Update {
            from_version: resolved.reference_version().to_string(),
            to_version: selection.target,
            scope: selection.scope,
        },
        None => {
            if scope_override.is_some() {
                PlannedOutcome::Status(PackageStatus::Failed(format!(
                    "no candidate available in the requested scope for {}",
                    resolved.name
                )))
            } else {
                PlannedOutcome::Status(PackageStatus::UpToDate)
            }
        }
    }
}
