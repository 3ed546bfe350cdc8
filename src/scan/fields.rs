//! Shared dependency-field extraction used by the JSON/YAML/TOML
//! parsers (§4.6 "delegate to format parsers"), plus the post-parse
//! annotation pass that applies a rule's groups/ignore/incremental/
//! package-override policy uniformly across formats.

use depsync_common::config::{DepFieldKind, RuleConfig};
use depsync_common::model::{Constraint, DependencyType, Package};
use std::collections::HashMap;
use std::path::Path;

/// Split a declared dependency string into its constraint symbol and
/// bare version, e.g. `"^4.17.0"` → `(Caret, "4.17.0")` (§3 "Attributes").
pub fn split_constraint(raw: &str) -> (Constraint, String) {
    let trimmed = raw.trim();
    if trimmed == "*" {
        return (Constraint::Star, String::new());
    }
    const PREFIXES: &[&str] = &[">=", "<=", "==", "^", "~", ">", "<", "="];
    for prefix in PREFIXES {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return (Constraint::normalise(prefix), rest.trim().to_string());
        }
    }
    (Constraint::None, trimmed.to_string())
}

/// Walk a JSON value tree (already converted from YAML/TOML when those
/// are the source format) and yield one `Package` per leaf under each
/// configured dependency field.
pub fn extract_from_json_value(
    root: &serde_json::Value,
    fields: &HashMap<String, DepFieldKind>,
    rule_name: &str,
    manifest_path: &Path,
) -> Vec<Package> {
    let mut out = Vec::new();
    for (field_name, kind) in fields {
        let Some(node) = root.get(field_name) else {
            continue;
        };
        let Some(map) = node.as_object() else {
            continue;
        };
        for (name, value) in map {
            let raw_version = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => continue,
            };
            let (constraint, version) = split_constraint(&raw_version);
            out.push(bare_package(rule_name, name, &version, constraint, *kind, field_name, manifest_path));
        }
    }
    out
}

fn bare_package(
    rule_name: &str,
    name: &str,
    version: &str,
    constraint: Constraint,
    kind: DepFieldKind,
    field_name: &str,
    manifest_path: &Path,
) -> Package {
    let (dependency_type, extra_type) = match kind {
        DepFieldKind::Prod => (DependencyType::Prod, None),
        DepFieldKind::Dev => (DependencyType::Dev, None),
        DepFieldKind::Extra => (DependencyType::Dev, Some(field_name.to_string())),
    };
    Package {
        rule: rule_name.to_string(),
        name: name.to_string(),
        version: version.to_string(),
        constraint,
        installed_version: None,
        dependency_type,
        extra_type,
        source: manifest_path.to_path_buf(),
        group: None,
        ignore: false,
        incremental: false,
    }
}

/// Apply a rule's `groups`/`ignore`/`incremental`/`package_overrides`
/// policy to a freshly parsed package list, regardless of which format
/// parser produced it.
pub fn annotate(mut packages: Vec<Package>, rule: &RuleConfig) -> Vec<Package> {
    for pkg in &mut packages {
        pkg.ignore = rule.ignore.iter().any(|n| n == &pkg.name);
        pkg.incremental = rule.incremental.iter().any(|n| n == &pkg.name);
        pkg.group = rule
            .groups
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == &pkg.name))
            .map(|(group_name, _)| group_name.clone());

        if let Some(ov) = rule.package_overrides.get(&pkg.name) {
            if let Some(ignore) = ov.ignore {
                pkg.ignore = ignore;
            }
            if let Some(incremental) = ov.incremental {
                pkg.incremental = incremental;
            }
        }
    }
    packages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_caret_constraint() {
        assert_eq!(split_constraint("^4.17.0"), (Constraint::Caret, "4.17.0".to_string()));
    }

    #[test]
    fn star_has_no_version() {
        assert_eq!(split_constraint("*"), (Constraint::Star, String::new()));
    }

    #[test]
    fn bare_version_has_no_constraint() {
        assert_eq!(split_constraint("4.17.0"), (Constraint::None, "4.17.0".to_string()));
    }

    #[test]
    fn extracts_prod_and_dev_fields() {
        let root: serde_json::Value = serde_json::from_str(
            r#"{"dependencies":{"lodash":"^4.17.0"},"devDependencies":{"jest":"~29.0.0"}}"#,
        )
        .unwrap();
        let mut fields = HashMap::new();
        fields.insert("dependencies".to_string(), DepFieldKind::Prod);
        fields.insert("devDependencies".to_string(), DepFieldKind::Dev);
        let mut packages = extract_from_json_value(&root, &fields, "npm", Path::new("package.json"));
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "jest");
        assert_eq!(packages[0].dependency_type, DependencyType::Dev);
        assert_eq!(packages[1].name, "lodash");
        assert_eq!(packages[1].constraint, Constraint::Caret);
    }
}
