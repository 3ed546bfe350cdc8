//! Tree walk, glob matching, and rule-conflict resolution (§4.6).

use depsync_common::config::RuleConfig;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Package managers with a defined tie-break order; anything else sorts
/// alphabetically after these (§4.6 "Known-priority package managers").
const KNOWN_PRIORITY: &[&str] = &["npm", "pnpm", "yarn"];

fn priority_rank(rule_name: &str) -> (usize, String) {
    match KNOWN_PRIORITY.iter().position(|r| *r == rule_name) {
        Some(idx) => (idx, rule_name.to_string()),
        None => (KNOWN_PRIORITY.len(), rule_name.to_string()),
    }
}

struct CompiledRule<'a> {
    name: &'a str,
    config: &'a RuleConfig,
    include: GlobSet,
    exclude: GlobSet,
}

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        } else {
            log::warn!(target: "depsync::scan", "ignoring invalid glob pattern: {pattern}");
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

/// Walk `base`, matching every enabled rule's include/exclude globs,
/// resolving multi-rule conflicts, and returning the final
/// rule → manifest-path mapping (§4.6).
pub fn scan_tree(base: &Path, rules: &HashMap<String, RuleConfig>) -> HashMap<String, Vec<PathBuf>> {
    let compiled: Vec<CompiledRule> = rules
        .iter()
        .filter(|(_, cfg)| cfg.enabled)
        .map(|(name, cfg)| CompiledRule {
            name,
            config: cfg,
            include: build_globset(&cfg.include),
            exclude: build_globset(&cfg.exclude),
        })
        .collect();

    let mut file_to_rules: HashMap<PathBuf, Vec<String>> = HashMap::new();

    for entry in WalkDir::new(base).into_iter() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                log::warn!(target: "depsync::scan", "skipping unreadable entry: {err}");
                continue;
            }
        };

        let path = entry.path();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }

        if file_type.is_symlink() {
            match std::fs::metadata(path) {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => {}
                Err(_) => {
                    log::warn!(target: "depsync::scan", "skipping broken symlink: {}", path.display());
                    continue;
                }
            }
        }

        let relative = path.strip_prefix(base).unwrap_or(path);
        let matches: Vec<String> = compiled
            .iter()
            .filter(|rule| rule.include.is_match(relative) && !rule.exclude.is_match(relative))
            .map(|rule| rule.name.to_string())
            .collect();

        if !matches.is_empty() {
            file_to_rules.insert(path.to_path_buf(), matches);
        }
    }

    let mut by_rule: HashMap<String, Vec<PathBuf>> = HashMap::new();

    for (path, mut rule_names) in file_to_rules {
        if rule_names.len() > 1 {
            rule_names = vec![resolve_conflict(&path, &rule_names, &compiled)];
        }
        for rule_name in rule_names {
            by_rule.entry(rule_name).or_default().push(path.clone());
        }
    }

    for paths in by_rule.values_mut() {
        paths.sort();
    }
    by_rule.retain(|_, paths| !paths.is_empty());
    by_rule
}

fn resolve_conflict(manifest_path: &Path, candidates: &[String], compiled: &[CompiledRule]) -> String {
    let manifest_dir = manifest_path.parent().unwrap_or(manifest_path);

    let with_lock_file: Vec<&String> = candidates
        .iter()
        .filter(|name| {
            compiled
                .iter()
                .find(|r| r.name == name.as_str())
                .map(|rule| {
                    rule.config
                        .lock_files
                        .iter()
                        .filter_map(|lf| lf.path.as_deref())
                        .any(|p| manifest_dir.join(p).exists())
                })
                .unwrap_or(false)
        })
        .collect();

    if with_lock_file.len() == 1 {
        return with_lock_file[0].clone();
    }

    let mut ranked: Vec<&String> = candidates.iter().collect();
    ranked.sort_by_key(|name| priority_rank(name));
    ranked[0].clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use depsync_common::config::{ExtractionConfig, OutdatedConfig, OutdatedFormat, UpdateConfig, VersioningConfig};
    use std::collections::HashMap as Map;
    use tempfile::tempdir;

    fn minimal_rule(include: &[&str]) -> RuleConfig {
        RuleConfig {
            enabled: true,
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: vec![],
            format: depsync_common::config::ManifestFormat::Json,
            fields: Map::new(),
            lock_files: vec![],
            outdated: OutdatedConfig {
                commands: String::new(),
                format: OutdatedFormat::Json,
                extraction: ExtractionConfig::default(),
                env: Map::new(),
                timeout_seconds: 30,
                exclude_versions: vec![],
                exclude_version_patterns: None,
                versioning: VersioningConfig::default(),
            },
            update: UpdateConfig {
                commands: String::new(),
                env: Map::new(),
                timeout_seconds: 30,
            },
            groups: Map::new(),
            ignore: vec![],
            incremental: vec![],
            exclude_versions: vec![],
            package_overrides: Map::new(),
            manifest_pattern: None,
        }
    }

    #[test]
    fn finds_manifest_matching_one_rule() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let mut rules = Map::new();
        rules.insert("npm".to_string(), minimal_rule(&["package.json"]));
        let found = scan_tree(dir.path(), &rules);
        assert_eq!(found.get("npm").unwrap().len(), 1);
    }

    #[test]
    fn conflict_resolved_by_known_priority() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let mut rules = Map::new();
        rules.insert("yarn".to_string(), minimal_rule(&["package.json"]));
        rules.insert("npm".to_string(), minimal_rule(&["package.json"]));
        let found = scan_tree(dir.path(), &rules);
        assert!(found.get("npm").is_some());
        assert!(found.get("yarn").is_none());
    }

    #[test]
    fn conflict_resolved_by_lock_file_presence() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::write(dir.path().join("yarn.lock"), "").unwrap();
        let mut npm_rule = minimal_rule(&["package.json"]);
        npm_rule.lock_files = vec![depsync_common::config::LockFileCfg {
            path: Some("package-lock.json".to_string()),
            command: None,
            format: OutdatedFormat::Json,
            extraction: ExtractionConfig::default(),
            detect: None,
        }];
        let mut yarn_rule = minimal_rule(&["package.json"]);
        yarn_rule.lock_files = vec![depsync_common::config::LockFileCfg {
            path: Some("yarn.lock".to_string()),
            command: None,
            format: OutdatedFormat::Json,
            extraction: ExtractionConfig::default(),
            detect: None,
        }];
        let mut rules = Map::new();
        rules.insert("npm".to_string(), npm_rule);
        rules.insert("yarn".to_string(), yarn_rule);
        let found = scan_tree(dir.path(), &rules);
        assert!(found.get("yarn").is_some());
        assert!(found.get("npm").is_none());
    }
}
