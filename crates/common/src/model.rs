//! The data model (§3): `Package`, `VersionCandidate`, `UpdatePlan`, and
//! the other value types that flow between components. Parsers and
//! resolvers produce these; the orchestrator aggregates them but never
//! mutates shared state across packages.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Version constraint symbol declared on a dependency, normalised per
/// §4.4 (`==`/`exact` → `=`, unknowns → `=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constraint {
    None,
    Star,
    Caret,
    Tilde,
    Exact,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl Constraint {
    pub fn normalise(raw: &str) -> Constraint {
        match raw.trim() {
            "" => Constraint::None,
            "*" => Constraint::Star,
            "^" => Constraint::Caret,
            "~" => Constraint::Tilde,
            "=" | "==" | "exact" => Constraint::Exact,
            ">=" => Constraint::Gte,
            ">" => Constraint::Gt,
            "<=" => Constraint::Lte,
            "<" => Constraint::Lt,
            _ => Constraint::Exact,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Constraint::None => "",
            Constraint::Star => "*",
            Constraint::Caret => "^",
            Constraint::Tilde => "~",
            Constraint::Exact => "=",
            Constraint::Gte => ">=",
            Constraint::Gt => ">",
            Constraint::Lte => "<=",
            Constraint::Lt => "<",
        }
    }

    /// Whether this constraint carries no restriction at all.
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Constraint::None | Constraint::Star)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyType {
    Prod,
    Dev,
}

/// Update bucket / CLI scope flag (§4.5, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Major,
    Minor,
    Patch,
}

/// Per-package outcome of lock resolution (§4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockOutcome {
    Found(String),
    NotInLock,
    LockMissing,
    Floating,
    NotConfigured,
    Ignored,
    VersionMissing,
}

/// The unit of work (§3 "Package").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub rule: String,
    pub name: String,
    pub version: String,
    pub constraint: Constraint,
    /// `#N/A` renders as `None` here; callers format it back to the
    /// literal marker string at the presentation boundary.
    pub installed_version: Option<String>,
    pub dependency_type: DependencyType,
    /// Free-form dependency bucket beyond prod/dev (peer, optional, …) —
    /// carried through to reporting only, never affects `--type` filtering.
    pub extra_type: Option<String>,
    pub source: PathBuf,
    pub group: Option<String>,
    pub ignore: bool,
    pub incremental: bool,
}

impl Package {
    /// The reference version used for filtering/selection: installed if
    /// known, else declared (§4.4 "Reference version").
    pub fn reference_version(&self) -> &str {
        match &self.installed_version {
            Some(v) if !v.is_empty() => v.as_str(),
            _ => self.version.as_str(),
        }
    }

    /// Segment precision used for `=` matching: taken from the declared
    /// version, or installed if declared is empty (§4.4).
    pub fn reference_precision(&self) -> usize {
        let basis = if !self.version.is_empty() {
            &self.version
        } else {
            self.reference_version()
        };
        segment_count(basis)
    }

    /// Exactly one of declared/installed must be non-empty for the
    /// package to be updatable (§3 invariants).
    pub fn is_updatable(&self) -> bool {
        let declared_present = !self.version.trim().is_empty();
        let installed_present = matches!(&self.installed_version, Some(v) if !v.trim().is_empty());
        declared_present || installed_present
    }
}

fn segment_count(v: &str) -> usize {
    v.split('.').filter(|s| !s.is_empty()).count().clamp(1, 3)
}

/// A candidate version surfaced by the fetcher (§3 "VersionCandidate").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionCandidate {
    pub raw: String,
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    /// Canonical semver string, when the raw value parses as semver.
    pub canonical: Option<String>,
}

impl VersionCandidate {
    /// Dedup key: canonical form when known (preserves prereleases),
    /// else a loose normalisation of the raw string (§3).
    pub fn dedup_key(&self) -> String {
        match &self.canonical {
            Some(c) => c.clone(),
            None => loose_normalise(&self.raw),
        }
    }
}

/// Lowercase and strip a leading `v` when followed by a digit (§3, §4.2).
pub fn loose_normalise(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix('v') {
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            return rest.to_string();
        }
    }
    lower
}

/// Named set of package names within one rule; all members update
/// atomically (§3 "Group").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub members: Vec<String>,
}

/// One entry of an update plan (§3 "UpdatePlan").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageUpdate {
    pub package: Package,
    pub from_version: String,
    pub to_version: String,
    pub scope: Scope,
    pub group: Option<String>,
}

/// An ordered, immutable-during-execution list of updates (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePlan {
    pub updates: Vec<PackageUpdate>,
}

impl UpdatePlan {
    /// Entries ordered `(rule, group?, name)` with grouped packages kept
    /// contiguous, per §4.10 phase 1.
    pub fn sorted(mut updates: Vec<PackageUpdate>) -> UpdatePlan {
        updates.sort_by(|a, b| {
            a.package
                .rule
                .cmp(&b.package.rule)
                .then_with(|| a.group.cmp(&b.group))
                .then_with(|| a.package.name.cmp(&b.package.name))
        });
        UpdatePlan { updates }
    }
}

/// Mapping of package name to installed version, parsed from either a
/// lock file or the stdout of a lock-list command (§3 "LockArtifact").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockArtifact {
    pub versions: std::collections::HashMap<String, String>,
}

impl LockArtifact {
    pub fn get(&self, package: &str) -> Option<&str> {
        self.versions.get(package).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_normalises_unknowns_to_exact() {
        assert_eq!(Constraint::normalise("!="), Constraint::Exact);
        assert_eq!(Constraint::normalise("=="), Constraint::Exact);
        assert_eq!(Constraint::normalise("exact"), Constraint::Exact);
        assert_eq!(Constraint::normalise("*"), Constraint::Star);
        assert_eq!(Constraint::normalise(""), Constraint::None);
    }

    #[test]
    fn loose_normalise_strips_v_before_digit() {
        assert_eq!(loose_normalise("v1.2.3"), "1.2.3");
        assert_eq!(loose_normalise("vNext"), "vnext");
    }

    #[test]
    fn reference_version_prefers_installed() {
        let pkg = Package {
            rule: "npm".into(),
            name: "lodash".into(),
            version: "^4.17.0".into(),
            constraint: Constraint::Caret,
            installed_version: Some("4.17.15".into()),
            dependency_type: DependencyType::Prod,
            extra_type: None,
            source: PathBuf::from("package.json"),
            group: None,
            ignore: false,
            incremental: false,
        };
        assert_eq!(pkg.reference_version(), "4.17.15");
    }

    #[test]
    fn plan_keeps_groups_contiguous_and_sorted() {
        let make = |rule: &str, name: &str, group: Option<&str>| PackageUpdate {
            package: Package {
                rule: rule.into(),
                name: name.into(),
                version: "1.0.0".into(),
                constraint: Constraint::Caret,
                installed_version: None,
                dependency_type: DependencyType::Prod,
                extra_type: None,
                source: PathBuf::from("x"),
                group: group.map(String::from),
                ignore: false,
                incremental: false,
            },
            from_version: "1.0.0".into(),
            to_version: "1.1.0".into(),
            scope: Scope::Minor,
            group: group.map(String::from),
        };
        let updates = vec![
            make("npm", "z-pkg", None),
            make("npm", "b-pkg", Some("grp")),
            make("npm", "a-pkg", Some("grp")),
        ];
        let plan = UpdatePlan::sorted(updates);
        let names: Vec<&str> = plan.updates.iter().map(|u| u.package.name.as_str()).collect();
        // group entries (None < Some, lexicographically "grp" entries come after None)
        assert_eq!(names, vec!["z-pkg", "a-pkg", "b-pkg"]);
    }
}
