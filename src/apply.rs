//! Update applier (C8, §4.8): rewrites a manifest's version token in
//! place, regenerates the lock, and verifies the result — rolling back
//! to byte-identical original content on any failure.

use crate::exec::{ExecRequest, Executor};
use crate::lock;
use anyhow::Result;
use depsync_common::config::{ManifestFormat, RuleConfig};
use depsync_common::error::CoreError;
use depsync_common::log_schema::{FROM_VERSION, PACKAGE, RULE, TO_VERSION};
use depsync_common::model::{Constraint, Package};
use regex::Regex;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub struct ApplyRequest<'a> {
    pub package: &'a Package,
    pub rule: &'a RuleConfig,
    pub new_version: &'a str,
    /// Available-version summary computed upstream during planning,
    /// carried through unchanged for the final report (§4.8 step 6).
    pub available_versions: Vec<String>,
}

pub struct ApplyOutcome {
    pub package: String,
    pub from_version: String,
    pub to_version: String,
    pub available_versions: Vec<String>,
}

/// `apply(package, new_version, runtime) -> Result` (§4.8). At every
/// point the manifest on disk is either the original or the intended
/// new state; rollback is idempotent because it always writes the full
/// original byte content.
pub fn apply(req: &ApplyRequest, executor: &dyn Executor, cancel: &CancellationToken) -> Result<ApplyOutcome> {
    let manifest_path = &req.package.source;
    let manifest_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let original_bytes = std::fs::read(manifest_path)
        .map_err(|e| CoreError::Apply(format!("failed to read {}: {e}", manifest_path.display())))?;
    let original_text = String::from_utf8(original_bytes.clone())
        .map_err(|e| CoreError::Apply(format!("manifest is not utf-8: {e}")))?;

    let new_text = rewrite_manifest(
        &original_text,
        req.rule.format,
        req.rule,
        &req.package.name,
        &req.package.version,
        req.new_version,
    )?;

    atomic_write(manifest_path, new_text.as_bytes())?;

    let update_request = ExecRequest {
        commands: req.rule.update.commands.clone(),
        env: req.rule.update.env.clone(),
        dir: manifest_dir.to_path_buf(),
        timeout_seconds: req.rule.update.timeout_seconds,
        substitutions: substitutions(&req.package.name, req.new_version, req.package.constraint),
    };

    if let Err(err) = executor.run(&update_request, cancel) {
        rollback(manifest_path, &original_bytes)?;
        return Err(CoreError::Apply(format!("lock regeneration failed: {err}")).into());
    }

    let artifact = match lock::resolve_artifact(req.rule, manifest_dir, executor, cancel) {
        Ok(a) => a,
        Err(err) => {
            rollback(manifest_path, &original_bytes)?;
            return Err(CoreError::Apply(format!("lock re-resolution failed: {err}")).into());
        }
    };

    let installed = artifact.get(&req.package.name);
    let matched = installed.map(|v| matches_at_precision(v, req.new_version)).unwrap_or(false);

    if !matched {
        rollback(manifest_path, &original_bytes)?;
        log::warn!(
            target: "depsync::apply",
            "{RULE}={} {PACKAGE}={} rolled back: installed version after lock regeneration ({}) did not match target {}",
            req.package.rule,
            req.package.name,
            installed.unwrap_or("<missing>"),
            req.new_version,
        );
        return Err(CoreError::Apply(format!(
            "installed version after lock regeneration ({}) did not match target {}",
            installed.unwrap_or("<missing>"),
            req.new_version
        ))
        .into());
    }

    let from_version = req.package.reference_version().to_string();
    log::info!(
        target: "depsync::apply",
        "{RULE}={} {PACKAGE}={} {FROM_VERSION}={from_version} {TO_VERSION}={}",
        req.package.rule,
        req.package.name,
        req.new_version,
    );

    Ok(ApplyOutcome {
        package: req.package.name.clone(),
        from_version,
        to_version: req.new_version.to_string(),
        available_versions: req.available_versions.clone(),
    })
}

fn substitutions(package_name: &str, version: &str, constraint: Constraint) -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("package".to_string(), package_name.to_string());
    m.insert("version".to_string(), version.to_string());
    m.insert("constraint".to_string(), constraint.as_str().to_string());
    m
}

fn matches_at_precision(installed: &str, target: &str) -> bool {
    let precision = target.split('.').filter(|s| !s.is_empty()).count().clamp(1, 3);
    let installed_segments: Vec<&str> = installed.split('.').take(precision).collect();
    let target_segments: Vec<&str> = target.split('.').take(precision).collect();
    installed_segments == target_segments
}

fn write_bytes(path: &Path, bytes: &[u8]) -> std::result::Result<(), String> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| e.to_string())?;
    tmp.write_all(bytes).map_err(|e| e.to_string())?;
    tmp.persist(path).map_err(|e| e.to_string())?;
    Ok(())
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    write_bytes(path, bytes).map_err(|e| CoreError::Apply(e).into())
}

fn rollback(path: &Path, original: &[u8]) -> Result<()> {
    write_bytes(path, original).map_err(|e| CoreError::Rollback(format!("failed to restore {}: {e}", path.display())).into())
}

/// Rewrite only the version token of a package's declaration, dispatched
/// by manifest format (§4.6 formats, §4.8 step 2).
fn rewrite_manifest(
    text: &str,
    format: ManifestFormat,
    rule: &RuleConfig,
    name: &str,
    old_version: &str,
    new_version: &str,
) -> Result<String> {
    match format {
        ManifestFormat::Json | ManifestFormat::Yaml | ManifestFormat::Toml => {
            rewrite_key_value(text, name, old_version, new_version)
        }
        ManifestFormat::Xml => rewrite_xml_attribute(text, name, old_version, new_version),
        ManifestFormat::Raw => rewrite_raw(text, rule, name, old_version, new_version),
    }
}

/// Matches `"name": "value"` (json/yaml) and `name = "value"` (toml);
/// `value`'s prefix (the constraint symbol) is preserved unchanged.
fn rewrite_key_value(text: &str, name: &str, old_version: &str, new_version: &str) -> Result<String> {
    let pattern = format!(r#""?{}"?\s*[:=]\s*"([^"]*)""#, regex::escape(name));
    let re = Regex::new(&pattern).map_err(|e| CoreError::Apply(format!("invalid rewrite pattern: {e}")))?;

    for caps in re.captures_iter(text) {
        let value_match = caps.get(1).expect("group 1 always present on match");
        let value = value_match.as_str();
        if !value.ends_with(old_version) {
            continue;
        }
        let prefix = &value[..value.len() - old_version.len()];
        let mut result = String::with_capacity(text.len());
        result.push_str(&text[..value_match.start()]);
        result.push_str(prefix);
        result.push_str(new_version);
        result.push_str(&text[value_match.end()..]);
        return Ok(result);
    }

    Err(CoreError::Apply(format!("could not locate declaration for {name}")).into())
}

/// Matches a `PackageReference`/`package`-style element carrying
/// `Include`/`id` = `name` and rewrites its `Version` attribute.
fn rewrite_xml_attribute(text: &str, name: &str, old_version: &str, new_version: &str) -> Result<String> {
    let tag_pattern = format!(r#"(?s)<[^>]*(?:Include|id)\s*=\s*"{}"[^>]*>"#, regex::escape(name));
    let tag_re = Regex::new(&tag_pattern).map_err(|e| CoreError::Apply(format!("invalid xml tag pattern: {e}")))?;
    let tag_match = tag_re
        .find(text)
        .ok_or_else(|| CoreError::Apply(format!("could not locate xml element for {name}")))?;

    let version_re = Regex::new(r#"(?i)version\s*=\s*"([^"]*)""#).expect("static pattern is valid");
    let tag_text = &text[tag_match.start()..tag_match.end()];
    let caps = version_re
        .captures(tag_text)
        .ok_or_else(|| CoreError::Apply(format!("no version attribute for {name}")))?;
    let value_match = caps.get(1).expect("group 1 always present on match");

    if value_match.as_str() != old_version {
        return Err(CoreError::Apply(format!(
            "unexpected version attribute for {name}: {}",
            value_match.as_str()
        ))
        .into());
    }

    let abs_start = tag_match.start() + value_match.start();
    let abs_end = tag_match.start() + value_match.end();
    let mut result = String::with_capacity(text.len());
    result.push_str(&text[..abs_start]);
    result.push_str(new_version);
    result.push_str(&text[abs_end..]);
    Ok(result)
}

/// Uses the rule's `manifest_pattern` (named groups `name`/`version`)
/// to locate and replace only the version span on a matching line.
fn rewrite_raw(text: &str, rule: &RuleConfig, name: &str, old_version: &str, new_version: &str) -> Result<String> {
    let pattern = rule
        .manifest_pattern
        .as_deref()
        .ok_or_else(|| CoreError::Apply("raw format requires manifest_pattern".to_string()))?;
    let re = Regex::new(pattern).map_err(|e| CoreError::Apply(format!("invalid manifest_pattern: {e}")))?;

    for caps in re.captures_iter(text) {
        let Some(matched_name) = caps.name("name") else { continue };
        if matched_name.as_str() != name {
            continue;
        }
        let Some(version_match) = caps.name("version") else { continue };
        if version_match.as_str() != old_version {
            continue;
        }
        let mut result = String::with_capacity(text.len());
        result.push_str(&text[..version_match.start()]);
        result.push_str(new_version);
        result.push_str(&text[version_match.end()..]);
        return Ok(result);
    }

    Err(CoreError::Apply(format!("could not locate raw declaration for {name}")).into())
}
