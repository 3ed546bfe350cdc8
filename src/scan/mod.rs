//! Manifest scanner & dispatcher (C6, §4.6).

pub(crate) mod fields;
mod format;
mod walk;

use anyhow::Result;
use depsync_common::config::{ManifestFormat, RuleConfig};
use depsync_common::model::Package;
use std::collections::HashMap;
use std::path::Path;

/// Walk `base`, resolve rule conflicts, parse every matched manifest
/// with its rule's format, and return the fully annotated package list
/// across all rules. A single manifest's parse failure is attached to
/// its path rather than aborting the whole scan.
pub fn scan(base: &Path, rules: &HashMap<String, RuleConfig>) -> ScanResult {
    let by_rule = walk::scan_tree(base, rules);
    let mut packages = Vec::new();
    let mut errors = Vec::new();

    for (rule_name, manifest_paths) in &by_rule {
        let Some(rule) = rules.get(rule_name) else {
            continue;
        };
        for manifest_path in manifest_paths {
            match parse_manifest(manifest_path, rule_name, rule) {
                Ok(parsed) => packages.extend(fields::annotate(parsed, rule)),
                Err(err) => errors.push((manifest_path.clone(), err)),
            }
        }
    }

    ScanResult { packages, errors }
}

pub struct ScanResult {
    pub packages: Vec<Package>,
    pub errors: Vec<(std::path::PathBuf, anyhow::Error)>,
}

fn parse_manifest(manifest_path: &Path, rule_name: &str, rule: &RuleConfig) -> Result<Vec<Package>> {
    let bytes = std::fs::read(manifest_path)?;
    match rule.format {
        ManifestFormat::Json => format::parse_json(&bytes, rule_name, rule, manifest_path),
        ManifestFormat::Yaml => format::parse_yaml(&bytes, rule_name, rule, manifest_path),
        ManifestFormat::Toml => format::parse_toml(&bytes, rule_name, rule, manifest_path),
        ManifestFormat::Xml => format::parse_xml(&bytes, rule_name, rule, manifest_path),
        ManifestFormat::Raw => format::parse_raw(&bytes, rule_name, rule, manifest_path),
    }
}
