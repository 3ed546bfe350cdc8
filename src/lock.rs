//! Lock resolver (C7, §4.7): resolves each declared package's installed
//! version from a lock file or a lock-list command, then derives a
//! per-package outcome.

use crate::exec::{ExecRequest, Executor};
use anyhow::Result;
use depsync_common::config::{LockFileCfg, OutdatedFormat, RuleConfig};
use depsync_common::error::CoreError;
use depsync_common::model::{Constraint, LockArtifact, LockOutcome, Package};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

const LOCK_COMMAND_TIMEOUT_SECONDS: u64 = 60;

/// Run every configured `LockFileCfg` entry for a rule, gated by
/// `detect`, accumulating results across all that apply (§4.7).
pub fn resolve_artifact(
    rule: &RuleConfig,
    manifest_dir: &Path,
    executor: &dyn Executor,
    cancel: &CancellationToken,
) -> Result<LockArtifact> {
    let mut versions = HashMap::new();

    for entry in &rule.lock_files {
        let body = match load_body(entry, manifest_dir, executor, cancel)? {
            Some(body) => body,
            None => continue,
        };

        if let Some(detect) = &entry.detect {
            let re = Regex::new(detect).map_err(|e| CoreError::Filter(format!("invalid detect pattern: {e}")))?;
            if !re.is_match(&String::from_utf8_lossy(&body)) {
                continue;
            }
        }

        let pairs = extract_pairs(&body, entry)?;
        versions.extend(pairs);
    }

    Ok(LockArtifact { versions })
}

fn load_body(
    entry: &LockFileCfg,
    manifest_dir: &Path,
    executor: &dyn Executor,
    cancel: &CancellationToken,
) -> Result<Option<Vec<u8>>> {
    if let Some(path) = &entry.path {
        let full = manifest_dir.join(path);
        return match std::fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(_) => Ok(None),
        };
    }
    if let Some(command) = &entry.command {
        let request = ExecRequest {
            commands: command.clone(),
            env: HashMap::new(),
            dir: manifest_dir.to_path_buf(),
            timeout_seconds: LOCK_COMMAND_TIMEOUT_SECONDS,
            substitutions: HashMap::new(),
        };
        let out = executor.run(&request, cancel)?;
        return Ok(Some(out));
    }
    Ok(None)
}

fn extract_pairs(body: &[u8], entry: &LockFileCfg) -> Result<HashMap<String, String>> {
    match entry.format {
        OutdatedFormat::Json => {
            let root: serde_json::Value =
                serde_json::from_slice(body).map_err(|e| CoreError::Parse(format!("invalid json lock: {e}")))?;
            let node = walk_json_path(&root, entry.extraction.key_path.as_deref())?;
            Ok(json_map(node))
        }
        OutdatedFormat::Yaml => {
            let root: serde_yaml::Value =
                serde_yaml::from_slice(body).map_err(|e| CoreError::Parse(format!("invalid yaml lock: {e}")))?;
            let mut node = &root;
            if let Some(path) = entry.extraction.key_path.as_deref() {
                for segment in path.split('.').filter(|s| !s.is_empty()) {
                    node = node
                        .get(segment)
                        .ok_or_else(|| CoreError::Parse(format!("key path segment '{segment}' not found")))?;
                }
            }
            Ok(yaml_map(node))
        }
        OutdatedFormat::Raw => {
            let text = String::from_utf8_lossy(body);
            let pattern = entry
                .extraction
                .pattern
                .as_deref()
                .ok_or_else(|| CoreError::Config("raw lock extraction requires a pattern".to_string()))?;
            let re = Regex::new(pattern).map_err(|e| CoreError::Config(format!("invalid lock pattern: {e}")))?;
            Ok(regex_pairs(&text, &re))
        }
        OutdatedFormat::Xml => {
            let text = std::str::from_utf8(body).map_err(|e| CoreError::Parse(format!("lock is not utf-8: {e}")))?;
            xml_pairs(text)
        }
    }
}

fn walk_json_path<'a>(root: &'a serde_json::Value, key_path: Option<&str>) -> Result<&'a serde_json::Value> {
    let mut node = root;
    if let Some(path) = key_path {
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            node = node
                .get(segment)
                .ok_or_else(|| CoreError::Parse(format!("key path segment '{segment}' not found")))?;
        }
    }
    Ok(node)
}

fn json_map(node: &serde_json::Value) -> HashMap<String, String> {
    match node {
        serde_json::Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| json_scalar(v).map(|s| (k.clone(), s)))
            .collect(),
        _ => HashMap::new(),
    }
}

fn json_scalar(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn yaml_map(node: &serde_yaml::Value) -> HashMap<String, String> {
    match node {
        serde_yaml::Value::Mapping(map) => map
            .iter()
            .filter_map(|(k, v)| {
                let key = k.as_str()?.to_string();
                let value = match v {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    _ => return None,
                };
                Some((key, value))
            })
            .collect(),
        _ => HashMap::new(),
    }
}

/// Regex extraction with named groups `n` (package name) and `version`
/// (§4.7).
fn regex_pairs(text: &str, re: &Regex) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in text.lines() {
        if let Some(caps) = re.captures(line) {
            if let (Some(name), Some(version)) = (caps.name("n"), caps.name("version")) {
                out.insert(name.as_str().to_string(), version.as_str().to_string());
            }
        }
    }
    out
}

/// Best-effort generic attribute scan standing in for full XPath
/// extraction (§4.7): any element carrying both a name-like
/// (`name`/`n`/`id`/`Include`) and version-like (`version`/`Version`)
/// attribute contributes a pair.
fn xml_pairs(text: &str) -> Result<HashMap<String, String>> {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut out = HashMap::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                let mut name = None;
                let mut version = None;
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    let value = attr
                        .decode_and_unescape_value(reader.decoder())
                        .unwrap_or_default()
                        .to_string();
                    match key.as_str() {
                        "name" | "n" | "id" | "Include" => name = Some(value),
                        "version" | "Version" => version = Some(value),
                        _ => {}
                    }
                }
                if let (Some(n), Some(v)) = (name, version) {
                    out.insert(n, v);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(CoreError::Parse(format!("invalid xml lock: {e}")).into()),
        }
        buf.clear();
    }
    Ok(out)
}

/// Derive a package's `LockOutcome` from a resolved artifact (§4.7
/// "Per-package outcome").
pub fn outcome_for(package: &Package, artifact: Option<&LockArtifact>, lock_configured: bool) -> LockOutcome {
    if package.ignore {
        return LockOutcome::Ignored;
    }
    if matches!(package.constraint, Constraint::Star) {
        return LockOutcome::Floating;
    }
    if !lock_configured {
        return LockOutcome::NotConfigured;
    }
    let Some(artifact) = artifact else {
        return LockOutcome::LockMissing;
    };
    match artifact.get(&package.name) {
        Some(v) if v.trim().is_empty() => LockOutcome::VersionMissing,
        Some(_) => LockOutcome::Found(artifact.get(&package.name).unwrap().to_string()),
        None => LockOutcome::NotInLock,
    }
}
