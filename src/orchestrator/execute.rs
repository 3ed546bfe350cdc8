//! Phases 3–4 ("Execute"/"Validate", §4.10): iterate the plan one
//! group-or-package unit at a time, strictly sequential per rule
//! directory (§5), applying C8 and — depending on `run_mode` — running
//! C9 either after each unit or once at the end, rolling back on
//! failure.

use super::PackageStatus;
use crate::apply::{self, ApplyRequest};
use crate::exec::Executor;
use crate::systest;
use depsync_common::config::{RootConfig, SystemTestRunMode, SystemTestsConfig};
use depsync_common::model::PackageUpdate;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub struct ExecOutput {
    /// One entry per plan member, in plan order.
    pub results: Vec<(PackageUpdate, PackageStatus)>,
    /// True once a unit failed and `continue_on_fail` was not set, or a
    /// validation pass rolled everything back.
    pub halted_early: bool,
}

/// One atomic apply unit: either a single ungrouped package, or every
/// member of a named group (§3 "Group": all members succeed together or
/// all roll back together).
fn group_units(plan: &[PackageUpdate]) -> Vec<Vec<&PackageUpdate>> {
    let mut units: Vec<Vec<&PackageUpdate>> = Vec::new();
    let mut i = 0;
    while i < plan.len() {
        let group = &plan[i].group;
        if group.is_none() {
            units.push(vec![&plan[i]]);
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < plan.len() && &plan[j].group == group && plan[j].package.rule == plan[i].package.rule {
            j += 1;
        }
        units.push(plan[i..j].iter().collect());
        i = j;
    }
    units
}

fn revert(update: &PackageUpdate, rule: &depsync_common::config::RuleConfig, executor: &dyn Executor, cancel: &CancellationToken) {
    // The manifest on disk now holds `to_version`; `apply` always
    // rewrites relative to `package.version`, so the revert pass needs a
    // package view where that is the value currently on disk.
    let mut reverted_view = update.package.clone();
    reverted_view.version = update.to_version.clone();
    let revert_req = ApplyRequest {
        package: &reverted_view,
        rule,
        new_version: &update.from_version,
        available_versions: Vec::new(),
    };
    // Best-effort: the original apply already proved this manifest can
    // round-trip; a failed revert is surfaced only through the package
    // staying in "failed" state, per §7 "rollback error ... treated as
    // fatal" being reserved for the primary rollback path in `apply`.
    let _ = apply::apply(&revert_req, executor, cancel);
}

pub fn run(
    config: &RootConfig,
    plan: &[PackageUpdate],
    executor: &dyn Executor,
    continue_on_fail: bool,
    skip_system_tests: bool,
    run_mode_override: Option<SystemTestRunMode>,
    project_root: &Path,
    cancel: &CancellationToken,
) -> ExecOutput {
    let run_mode = run_mode_override.unwrap_or(config.system_tests.run_mode);
    let mut results: Vec<(PackageUpdate, PackageStatus)> = Vec::new();
    let mut committed: Vec<PackageUpdate> = Vec::new();
    let mut halted_early = false;

    let units = group_units(plan);

    'units: for unit in units {
        if cancel.is_cancelled() {
            halted_early = true;
            break;
        }

        let mut applied_so_far: Vec<&PackageUpdate> = Vec::new();
        let mut unit_error: Option<String> = None;

        for update in &unit {
            let Some(rule) = config.rules.get(&update.package.rule) else {
                unit_error = Some(format!("no rule configuration for '{}'", update.package.rule));
                break;
            };
            let req = ApplyRequest {
                package: &update.package,
                rule,
                new_version: &update.to_version,
                available_versions: Vec::new(),
            };
            match apply::apply(&req, executor, cancel) {
                Ok(_) => applied_so_far.push(update),
                Err(err) => {
                    unit_error = Some(err.to_string());
                    break;
                }
            }
        }

        if let Some(error) = unit_error {
            for update in &applied_so_far {
                if let Some(rule) = config.rules.get(&update.package.rule) {
                    revert(update, rule, executor, cancel);
                }
            }
            for update in &unit {
                results.push(((*update).clone(), PackageStatus::Failed(error.clone())));
            }
            if !continue_on_fail {
                halted_early = true;
                break 'units;
            }
            continue;
        }

        if !skip_system_tests && matches!(run_mode, SystemTestRunMode::AfterEach) {
            let outcome = systest::run_validation(&config.system_tests, project_root, executor, cancel);
            if outcome.failed {
                for update in &unit {
                    if let Some(rule) = config.rules.get(&update.package.rule) {
                        revert(update, rule, executor, cancel);
                    }
                }
                let message = validation_failure_message(&outcome);
                for update in &unit {
                    results.push(((*update).clone(), PackageStatus::Failed(message.clone())));
                }
                if !continue_on_fail {
                    halted_early = true;
                    break 'units;
                }
                continue;
            }
        }

        for update in &unit {
            results.push(((*update).clone(), PackageStatus::Succeeded {
                from: update.from_version.clone(),
                to: update.to_version.clone(),
            }));
            committed.push((*update).clone());
        }
    }

    if !halted_early && !skip_system_tests && matches!(run_mode, SystemTestRunMode::AfterAll) && !committed.is_empty() {
        let outcome = systest::run_validation(&config.system_tests, project_root, executor, cancel);
        if outcome.failed {
            for update in committed.iter().rev() {
                if let Some(rule) = config.rules.get(&update.package.rule) {
                    revert(update, rule, executor, cancel);
                }
            }
            let message = validation_failure_message(&outcome);
            for (update, status) in results.iter_mut() {
                if matches!(status, PackageStatus::Succeeded { .. }) {
                    let _ = update;
                    *status = PackageStatus::Failed(message.clone());
                }
            }
        }
    }

    ExecOutput { results, halted_early }
}

fn validation_failure_message(outcome: &systest::SuiteOutcome) -> String {
    let names: Vec<&str> = outcome.failures().map(|r| r.name.as_str()).collect();
    format!("system test validation failed: {}", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeExecutor;
    use depsync_common::config::{
        ExtractionConfig, LockFileCfg, OutdatedConfig, OutdatedFormat, RuleConfig, SystemTestCfg,
        UpdateConfig, VersioningConfig,
    };
    use depsync_common::model::{Constraint, DependencyType, Package, Scope};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn rule_for(lock_name: &str) -> RuleConfig {
        RuleConfig {
            enabled: true,
            include: vec![],
            exclude: vec![],
            format: depsync_common::config::ManifestFormat::Json,
            fields: HashMap::new(),
            lock_files: vec![LockFileCfg {
                path: Some(lock_name.to_string()),
                command: None,
                format: OutdatedFormat::Json,
                extraction: ExtractionConfig::default(),
                detect: None,
            }],
            outdated: OutdatedConfig {
                commands: String::new(),
                format: OutdatedFormat::Json,
                extraction: ExtractionConfig::default(),
                env: HashMap::new(),
                timeout_seconds: 30,
                exclude_versions: vec![],
                exclude_version_patterns: None,
                versioning: VersioningConfig::default(),
            },
            update: UpdateConfig {
                commands: "true".to_string(),
                env: HashMap::new(),
                timeout_seconds: 30,
            },
            groups: HashMap::new(),
            ignore: vec![],
            incremental: vec![],
            exclude_versions: vec![],
            package_overrides: HashMap::new(),
            manifest_pattern: None,
        }
    }

    fn package(dir: &Path, name: &str, group: Option<&str>) -> Package {
        Package {
            rule: "npm".into(),
            name: name.into(),
            version: "1.0.0".into(),
            constraint: Constraint::Caret,
            installed_version: None,
            dependency_type: DependencyType::Prod,
            extra_type: None,
            source: dir.join("package.json"),
            group: group.map(String::from),
            ignore: false,
            incremental: false,
        }
    }

    fn update(pkg: Package, to: &str) -> PackageUpdate {
        PackageUpdate {
            from_version: pkg.version.clone(),
            to_version: to.to_string(),
            scope: Scope::Minor,
            group: pkg.group.clone(),
            package: pkg,
        }
    }

    fn config_with(rule: RuleConfig, system_tests: depsync_common::config::SystemTestsConfig) -> RootConfig {
        let mut rules = HashMap::new();
        rules.insert("npm".to_string(), rule);
        RootConfig {
            rules,
            security: Default::default(),
            system_tests,
        }
    }

    #[test]
    fn successful_units_report_succeeded() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"dependencies":{"a":"^1.0.0"}}"#).unwrap();
        std::fs::write(dir.path().join("lock.json"), r#"{"a":"1.1.0"}"#).unwrap();

        let rule = rule_for("lock.json");
        let config = config_with(rule, Default::default());
        let plan = vec![update(package(dir.path(), "a", None), "1.1.0")];
        let fake = FakeExecutor::new();
        fake.push_ok(Vec::new());
        let cancel = CancellationToken::new();

        let out = run(&config, &plan, &fake, false, true, None, dir.path(), &cancel);
        assert!(!out.halted_early);
        assert!(matches!(out.results[0].1, PackageStatus::Succeeded { .. }));
    }

    #[test]
    fn group_rolls_back_entirely_on_member_failure() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies":{"a":"^1.0.0","b":"^1.0.0"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("lock.json"), r#"{"a":"1.1.0"}"#).unwrap();

        let rule = rule_for("lock.json");
        let config = config_with(rule, Default::default());
        let plan = vec![
            update(package(dir.path(), "a", Some("grp")), "1.1.0"),
            update(package(dir.path(), "b", Some("grp")), "1.1.0"),
        ];
        let fake = FakeExecutor::new();
        fake.push_ok(Vec::new()); // a's update command succeeds
        fake.push_ok(Vec::new()); // b's update command succeeds but lock never reflects b
        fake.push_ok(Vec::new()); // a's revert update command
        let cancel = CancellationToken::new();

        let out = run(&config, &plan, &fake, false, true, None, dir.path(), &cancel);
        assert!(out.halted_early);
        assert!(out.results.iter().all(|(_, s)| matches!(s, PackageStatus::Failed(_))));

        let manifest = std::fs::read_to_string(dir.path().join("package.json")).unwrap();
        assert!(manifest.contains(r#""a":"^1.0.0""#));
    }

    #[test]
    fn after_each_validation_failure_rolls_back_unit() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"dependencies":{"a":"^1.0.0"}}"#).unwrap();
        std::fs::write(dir.path().join("lock.json"), r#"{"a":"1.1.0"}"#).unwrap();

        let rule = rule_for("lock.json");
        let system_tests = depsync_common::config::SystemTestsConfig {
            run_preflight: false,
            run_mode: SystemTestRunMode::AfterEach,
            stop_on_fail: false,
            tests: vec![SystemTestCfg {
                name: "smoke".into(),
                commands: "false".into(),
                timeout_seconds: 5,
                continue_on_fail: false,
                env: HashMap::new(),
            }],
        };
        let config = config_with(rule, system_tests);
        let plan = vec![update(package(dir.path(), "a", None), "1.1.0")];
        let fake = FakeExecutor::new();
        fake.push_ok(Vec::new()); // apply's update command
        fake.push_err("exit 1"); // validation test fails
        fake.push_ok(Vec::new()); // revert's update command
        let cancel = CancellationToken::new();

        let out = run(&config, &plan, &fake, false, false, None, dir.path(), &cancel);
        assert!(out.halted_early);
        assert!(matches!(out.results[0].1, PackageStatus::Failed(_)));
        let manifest = std::fs::read_to_string(dir.path().join("package.json")).unwrap();
        assert!(manifest.contains(r#""a":"^1.0.0""#));
    }

    #[test]
    fn continue_on_fail_proceeds_to_next_unit() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies":{"a":"^1.0.0","b":"^1.0.0"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("lock.json"), r#"{"a":"1.1.0","b":"1.1.0"}"#).unwrap();

        let rule = rule_for("lock.json");
        let config = config_with(rule, Default::default());
        let plan = vec![
            update(package(dir.path(), "missing-in-lock", None), "1.1.0"),
            update(package(dir.path(), "b", None), "1.1.0"),
        ];
        let fake = FakeExecutor::new();
        fake.push_ok(Vec::new()); // first package's update command runs
        fake.push_ok(Vec::new()); // first package's revert
        fake.push_ok(Vec::new()); // second package's update command
        let cancel = CancellationToken::new();

        let out = run(&config, &plan, &fake, true, true, None, dir.path(), &cancel);
        assert!(!out.halted_early);
        assert!(matches!(out.results[0].1, PackageStatus::Failed(_)));
        assert!(matches!(out.results[1].1, PackageStatus::Succeeded { .. }));
    }
}
