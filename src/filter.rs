//! Constraint & scope filter (C4, §4.4): reduces a candidate set to
//! those permitted by the package's declared constraint, or by a scope
//! flag override.

use crate::version::{ParsedVersion, Strategy};
use depsync_common::model::{Constraint, Package, Scope};
use std::cmp::Ordering;

/// `--major|--minor|--patch` override: clears/forces the constraint for
/// selection purposes only; the written constraint is never modified
/// (§4.4 "Flag overrides").
pub fn override_constraint(scope: Scope) -> Constraint {
    match scope {
        Scope::Major => Constraint::None,
        Scope::Minor => Constraint::Caret,
        Scope::Patch => Constraint::Tilde,
    }
}

/// `filter(package, versions, flags) -> []string`.
pub fn filter(
    package: &Package,
    versions: &[String],
    scope_override: Option<Scope>,
    strategy: &dyn Strategy,
) -> Vec<String> {
    let constraint = scope_override.map(override_constraint).unwrap_or(package.constraint);
    let reference_raw = package.reference_version();
    let reference = strategy.parse(reference_raw);
    let reference_empty = reference_raw.trim().is_empty();
    let precision = package.reference_precision();

    versions
        .iter()
        .filter(|raw| {
            let candidate = strategy.parse(raw);
            permits(constraint, &reference, reference_empty, &candidate, precision, strategy)
        })
        .cloned()
        .collect()
}

fn is_canonical_semver(p: &ParsedVersion) -> bool {
    p.canonical.is_some()
}

#[allow(clippy::too_many_arguments)]
fn permits(
    constraint: Constraint,
    reference: &ParsedVersion,
    reference_empty: bool,
    candidate: &ParsedVersion,
    precision: usize,
    strategy: &dyn Strategy,
) -> bool {
    if constraint.is_unconstrained() {
        return true;
    }
    if reference_empty {
        return true;
    }

    // Blanket non-semver passthrough (§4.4): a candidate that never
    // resolved to canonical semver is permitted only when the
    // constraint imposes nothing, or the reference is itself non-semver.
    if !is_canonical_semver(candidate) {
        return !is_canonical_semver(reference);
    }
    if !is_canonical_semver(reference) {
        return false;
    }

    match constraint {
        Constraint::None | Constraint::Star => true,
        Constraint::Caret => match (reference.triple, candidate.triple) {
            (Some(r), Some(c)) => r.0 == c.0,
            _ => true,
        },
        Constraint::Tilde => match (reference.triple, candidate.triple) {
            (Some(r), Some(c)) => r.0 == c.0 && r.1 == c.1,
            _ => true,
        },
        Constraint::Gte | Constraint::Gt | Constraint::Lte | Constraint::Lt => {
            let ord = strategy.compare(candidate, reference);
            match constraint {
                Constraint::Gte => matches!(ord, Ordering::Greater | Ordering::Equal),
                Constraint::Gt => ord == Ordering::Greater,
                Constraint::Lte => matches!(ord, Ordering::Less | Ordering::Equal),
                Constraint::Lt => ord == Ordering::Less,
                _ => unreachable!(),
            }
        }
        Constraint::Exact => match (reference.triple, candidate.triple) {
            (Some(r), Some(c)) => match precision {
                1 => r.0 == c.0,
                2 => r.0 == c.0 && r.1 == c.1,
                _ => r == c,
            },
            _ => reference.dedup_key() == candidate.dedup_key(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::build_strategy;
    use depsync_common::config::VersioningConfig;
    use depsync_common::model::DependencyType;
    use std::path::PathBuf;

    fn package(version: &str, installed: Option<&str>, constraint: Constraint) -> Package {
        Package {
            rule: "npm".into(),
            name: "lodash".into(),
            version: version.into(),
            constraint,
            installed_version: installed.map(String::from),
            dependency_type: DependencyType::Prod,
            extra_type: None,
            source: PathBuf::from("package.json"),
            group: None,
            ignore: false,
            incremental: false,
        }
    }

    #[test]
    fn caret_permits_same_major_only() {
        let strategy = build_strategy(&VersioningConfig::default()).unwrap();
        let pkg = package("^4.17.0", Some("4.17.15"), Constraint::Caret);
        let versions = vec!["4.17.21".to_string(), "4.18.0".to_string(), "5.0.0".to_string()];
        let out = filter(&pkg, &versions, None, &*strategy);
        assert_eq!(out, vec!["4.17.21".to_string(), "4.18.0".to_string()]);
    }

    #[test]
    fn exact_two_segment_precision() {
        let strategy = build_strategy(&VersioningConfig::default()).unwrap();
        let pkg = package("4.2", None, Constraint::Exact);
        let versions = vec!["4.2.1".to_string(), "4.2.15".to_string(), "5.0.0".to_string()];
        let out = filter(&pkg, &versions, None, &*strategy);
        assert_eq!(out, vec!["4.2.1".to_string(), "4.2.15".to_string()]);
    }

    #[test]
    fn major_override_clears_constraint() {
        let strategy = build_strategy(&VersioningConfig::default()).unwrap();
        let pkg = package("^4.17.0", Some("4.17.15"), Constraint::Caret);
        let versions = vec!["5.0.0".to_string(), "5.0.0-alpha".to_string()];
        let out = filter(&pkg, &versions, Some(Scope::Major), &*strategy);
        assert!(out.contains(&"5.0.0".to_string()));
    }

    #[test]
    fn four_segment_candidate_passes_through_when_unconstrained() {
        let strategy = build_strategy(&VersioningConfig::default()).unwrap();
        let pkg = package("", None, Constraint::None);
        let versions = vec!["1.0.0.0".to_string()];
        let out = filter(&pkg, &versions, None, &*strategy);
        assert_eq!(out, vec!["1.0.0.0".to_string()]);
    }

    #[test]
    fn four_segment_candidate_filtered_under_caret_with_semver_reference() {
        let strategy = build_strategy(&VersioningConfig::default()).unwrap();
        let pkg = package("^1.0.0", Some("1.0.0"), Constraint::Caret);
        let versions = vec!["1.0.0.0".to_string(), "1.2.0".to_string()];
        let out = filter(&pkg, &versions, None, &*strategy);
        assert_eq!(out, vec!["1.2.0".to_string()]);
    }
}
