//! Available-versions fetcher (C3, §4.3): runs a rule's `outdated`
//! command through the executor, parses its output, and drops excluded
//! candidates.

mod extract;
mod quirks;
mod security;

use crate::exec::{ExecRequest, Executor};
use crate::version::dedup_raw;
use anyhow::Result;
use depsync_common::config::{OutdatedConfig, OutdatedFormat, PackageOverride, SecurityConfig, VersioningConfig};
use depsync_common::error::CoreError;
use depsync_common::model::Constraint;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Matches suffixes `alpha|beta|rc|canary|dev|snapshot|nightly|preview`
/// with common separators — applied unless the rule opts out with an
/// explicit (possibly empty) `exclude_version_patterns` (§4.3, §9).
pub const DEFAULT_PRERELEASE_PATTERN: &str =
    r"(?i)[-._]?(alpha|beta|rc|canary|dev|snapshot|nightly|preview)([-._]?\d+)?$";

/// Rule-level `outdated` config merged with any per-package override
/// (§4.3 "resolve effective outdated config").
pub struct EffectiveOutdated<'a> {
    pub commands: &'a str,
    pub format: OutdatedFormat,
    pub key_path: Option<&'a str>,
    pub pattern: Option<&'a str>,
    pub env: &'a HashMap<String, String>,
    pub timeout_seconds: u64,
    pub exclude_versions: Vec<&'a str>,
    pub exclude_version_patterns: Option<&'a [String]>,
    pub versioning: &'a VersioningConfig,
}

pub fn resolve_effective<'a>(
    rule: &'a OutdatedConfig,
    override_cfg: Option<&'a PackageOverride>,
    no_timeout: bool,
) -> EffectiveOutdated<'a> {
    let mut exclude_versions: Vec<&str> = rule.exclude_versions.iter().map(String::as_str).collect();
    let mut exclude_version_patterns = rule.exclude_version_patterns.as_deref();
    let mut versioning = &rule.versioning;
    let mut timeout_seconds = rule.timeout_seconds;

    if let Some(ov) = override_cfg {
        exclude_versions.extend(ov.exclude_versions.iter().map(String::as_str));
        if let Some(pats) = &ov.exclude_version_patterns {
            exclude_version_patterns = Some(pats.as_slice());
        }
        if let Some(v) = &ov.versioning {
            versioning = v;
        }
        if let Some(t) = ov.timeout_seconds {
            timeout_seconds = t;
        }
    }

    if no_timeout {
        timeout_seconds = 0;
    }

    EffectiveOutdated {
        commands: &rule.commands,
        format: rule.format,
        key_path: rule.extraction.key_path.as_deref(),
        pattern: rule.extraction.pattern.as_deref(),
        env: &rule.env,
        timeout_seconds,
        exclude_versions,
        exclude_version_patterns,
        versioning,
    }
}

/// `list_newer_versions(package, config, scope_dir, cancel) ->
/// []string`, minus the selector/filter step (handled by `filter`/
/// `select`), and returning every non-excluded candidate.
#[allow(clippy::too_many_arguments)]
pub fn list_newer_versions(
    rule_name: &str,
    package_name: &str,
    declared_version: &str,
    constraint: Constraint,
    effective: &EffectiveOutdated<'_>,
    scope_dir: &Path,
    security: &SecurityConfig,
    executor: &dyn Executor,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let mut substitutions = HashMap::new();
    substitutions.insert("package".to_string(), package_name.to_string());
    substitutions.insert("version".to_string(), declared_version.to_string());
    substitutions.insert("constraint".to_string(), constraint.as_str().to_string());

    let commands = if rule_name == "go" {
        quirks::go_mod_flag(effective.commands)
    } else {
        effective.commands.to_string()
    };

    let request = ExecRequest {
        commands,
        env: effective.env.clone(),
        dir: scope_dir.to_path_buf(),
        timeout_seconds: effective.timeout_seconds,
        substitutions,
    };

    let raw_output = match executor.run(&request, cancel) {
        Ok(bytes) => bytes,
        Err(err) => {
            if rule_name == "dotnet" {
                if let Some(core) = err.downcast_ref::<CoreError>() {
                    if let CoreError::Exec { detail, .. } = core {
                        if quirks::is_dotnet_unsupported(detail) {
                            return Err(CoreError::Unsupported(detail.clone()).into());
                        }
                    }
                }
            }
            return Err(err);
        }
    };

    let body = crate::exec::strip_bom(&raw_output);

    let mut candidates = match effective.format {
        OutdatedFormat::Json => extract::extract_json(body, effective.key_path)?,
        OutdatedFormat::Yaml => extract::extract_yaml(body, effective.key_path)?,
        OutdatedFormat::Raw => {
            let text = String::from_utf8_lossy(body);
            let compiled = match effective.pattern {
                Some(p) => Some(security::compile_guarded(p, security)?),
                None => None,
            };
            extract::extract_raw(&text, compiled.as_ref())
        }
        OutdatedFormat::Xml => {
            return Err(CoreError::Config(
                "xml is not a supported outdated-command output format".to_string(),
            )
            .into())
        }
    };

    candidates = apply_exclusions(candidates, effective, security)?;

    let strategy = crate::version::build_strategy(effective.versioning)?;
    Ok(dedup_raw(&*strategy, &candidates))
}

fn apply_exclusions(
    candidates: Vec<String>,
    effective: &EffectiveOutdated<'_>,
    security: &SecurityConfig,
) -> Result<Vec<String>> {
    let exact: std::collections::HashSet<&str> = effective.exclude_versions.iter().copied().collect();

    let mut patterns: Vec<Regex> = Vec::new();
    match effective.exclude_version_patterns {
        Some(configured) => {
            for p in configured {
                patterns.push(security::compile_guarded(p, security)?);
            }
        }
        None => {
            patterns.push(
                Regex::new(DEFAULT_PRERELEASE_PATTERN).expect("default pattern is valid"),
            );
        }
    }

    Ok(candidates
        .into_iter()
        .filter(|v| !exact.contains(v.as_str()))
        .filter(|v| !patterns.iter().any(|re| re.is_match(v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeExecutor;
    use depsync_common::config::ExtractionConfig;

    fn outdated_config(commands: &str) -> OutdatedConfig {
        OutdatedConfig {
            commands: commands.to_string(),
            format: OutdatedFormat::Json,
            extraction: ExtractionConfig::default(),
            env: HashMap::new(),
            timeout_seconds: 30,
            exclude_versions: Vec::new(),
            exclude_version_patterns: None,
            versioning: VersioningConfig::default(),
        }
    }

    #[test]
    fn default_exclusion_drops_prereleases() {
        let rule = outdated_config("npm view {{package}} versions --json");
        let effective = resolve_effective(&rule, None, false);
        let fake = FakeExecutor::new();
        fake.push_ok(br#"["4.17.21","5.0.0","5.0.0-alpha"]"#.to_vec());
        let cancel = CancellationToken::new();
        let out = list_newer_versions(
            "npm",
            "lodash",
            "^4.17.0",
            Constraint::Caret,
            &effective,
            Path::new("."),
            &SecurityConfig::default(),
            &fake,
            &cancel,
        )
        .unwrap();
        assert_eq!(out, vec!["4.17.21".to_string(), "5.0.0".to_string()]);
    }

    #[test]
    fn empty_override_pattern_opts_out_of_default() {
        let rule = outdated_config("npm view {{package}} versions --json");
        let override_cfg = PackageOverride {
            exclude_version_patterns: Some(vec![]),
            ..Default::default()
        };
        let effective = resolve_effective(&rule, Some(&override_cfg), false);
        let fake = FakeExecutor::new();
        fake.push_ok(br#"["5.0.0-alpha"]"#.to_vec());
        let cancel = CancellationToken::new();
        let out = list_newer_versions(
            "npm",
            "lodash",
            "^4.17.0",
            Constraint::Caret,
            &effective,
            Path::new("."),
            &SecurityConfig::default(),
            &fake,
            &cancel,
        )
        .unwrap();
        assert_eq!(out, vec!["5.0.0-alpha".to_string()]);
    }

    #[test]
    fn dotnet_no_assets_file_is_unsupported() {
        let rule = outdated_config("dotnet list package --outdated");
        let effective = resolve_effective(&rule, None, false);
        let fake = FakeExecutor::new();
        fake.push_err("No assets file was found for project 'foo.csproj'");
        let cancel = CancellationToken::new();
        let err = list_newer_versions(
            "dotnet",
            "Newtonsoft.Json",
            "12.0.0",
            Constraint::Exact,
            &effective,
            Path::new("."),
            &SecurityConfig::default(),
            &fake,
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::Unsupported(_))
        ));
    }

    #[test]
    fn no_timeout_flag_clears_timeout() {
        let rule = outdated_config("go list -m -u -json all");
        let effective = resolve_effective(&rule, None, true);
        assert_eq!(effective.timeout_seconds, 0);
    }
}
