//! Target selector (C5, §4.5): buckets filtered candidates into
//! `{major, minor, patch}` relative to the reference version and picks
//! the update target per policy.

use crate::version::{ParsedVersion, Strategy};
use depsync_common::model::{Constraint, Package, Scope};
use std::cmp::Ordering;

/// Per-bucket newest candidate, for reporting (`#N/A` when empty).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketSummary {
    pub major: Option<String>,
    pub minor: Option<String>,
    pub patch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub target: String,
    pub scope: Scope,
}

/// Constraint → default scope mapping, used when no `--major|--minor|
/// --patch` flag is given (§4.5 "Scope determination").
pub fn scope_for_constraint(constraint: Constraint) -> Scope {
    match constraint {
        Constraint::None | Constraint::Star => Scope::Major,
        Constraint::Caret => Scope::Minor,
        Constraint::Tilde => Scope::Patch,
        _ => Scope::Major,
    }
}

fn classify(reference: &ParsedVersion, candidate: &ParsedVersion, strategy: &dyn Strategy) -> Option<Scope> {
    let (r_major, r_minor, r_patch) = reference.triple?;
    let (c_major, c_minor, c_patch) = candidate.triple?;

    if c_major > r_major {
        return Some(Scope::Major);
    }
    if c_major == r_major && c_minor > r_minor {
        return Some(Scope::Minor);
    }
    if c_major == r_major && c_minor == r_minor {
        let patch_advances = c_patch > r_patch
            || (c_patch == r_patch && strategy.compare(candidate, reference) == Ordering::Greater);
        if patch_advances {
            return Some(Scope::Patch);
        }
    }
    None
}

/// Newest candidate in each bucket, independent of incremental policy —
/// used for display/reporting.
pub fn summarize(reference_raw: &str, candidates: &[String], strategy: &dyn Strategy) -> BucketSummary {
    let reference = strategy.parse(reference_raw);
    let parsed: Vec<ParsedVersion> = candidates.iter().map(|v| strategy.parse(v)).collect();

    let mut summary = BucketSummary::default();
    for scope in [Scope::Major, Scope::Minor, Scope::Patch] {
        let newest = parsed
            .iter()
            .filter(|c| classify(&reference, c, strategy) == Some(scope))
            .max_by(|a, b| strategy.compare(a, b));
        let slot = match scope {
            Scope::Major => &mut summary.major,
            Scope::Minor => &mut summary.minor,
            Scope::Patch => &mut summary.patch,
        };
        *slot = newest.map(|v| v.raw.clone());
    }
    summary
}

/// `select`: bucket the already-filtered candidate set and pick the
/// target per §4.5. Returns `None` when every bucket in the fallback
/// chain is empty (caller treats the package as up-to-date / a no-op),
/// or when the package is fully pinned under `=` with no scope
/// override (§4.5 "Fully pinned versions").
pub fn select(
    package: &Package,
    filtered_candidates: &[String],
    scope_override: Option<Scope>,
    strategy: &dyn Strategy,
) -> Option<Selection> {
    if scope_override.is_none() && package.constraint == Constraint::Exact && package.reference_precision() == 3 {
        return None;
    }

    let reference = strategy.parse(package.reference_version());
    let parsed: Vec<ParsedVersion> = filtered_candidates.iter().map(|v| strategy.parse(v)).collect();

    let order = if package.incremental {
        [Scope::Patch, Scope::Minor, Scope::Major]
    } else {
        [Scope::Major, Scope::Minor, Scope::Patch]
    };

    for scope in order {
        let bucket: Vec<&ParsedVersion> = parsed
            .iter()
            .filter(|c| classify(&reference, c, strategy) == Some(scope))
            .collect();
        if bucket.is_empty() {
            continue;
        }
        let chosen = if package.incremental {
            bucket.into_iter().min_by(|a, b| strategy.compare(a, b))
        } else {
            bucket.into_iter().max_by(|a, b| strategy.compare(a, b))
        };
        if let Some(c) = chosen {
            return Some(Selection {
                target: c.raw.clone(),
                scope,
            });
        }
    }
    None
}
