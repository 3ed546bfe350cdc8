//! Versioning strategy engine (C2, §4.2): parse, compare, sort, and
//! categorize versions under a chosen format — semver (default),
//! numeric, regex, or ordered.

mod numeric_fmt;
mod ordered_fmt;
mod regex_fmt;
mod semver_fmt;

use anyhow::Result;
use depsync_common::config::VersioningConfig;
pub use depsync_common::config::VersioningFormat;
use depsync_common::model::loose_normalise;
use std::cmp::Ordering;

/// A version after parsing, carrying both the numeric triple used for
/// bucketing (§4.5) and a canonical string when the format produces one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVersion {
    pub raw: String,
    pub triple: Option<(u64, u64, u64)>,
    /// Canonical semver string — present only for the `semver` format,
    /// and only preserves prerelease/build metadata there.
    pub canonical: Option<String>,
    pub semver: Option<semver::Version>,
}

impl ParsedVersion {
    /// Dedup key per §3/§4.2: canonical form if known (preserves
    /// prereleases), otherwise a loose normalisation of the raw string
    /// (preserves multi-segment differences like `1.0.0.0` vs `1.0.0.1`).
    pub fn dedup_key(&self) -> String {
        match &self.canonical {
            Some(c) => c.clone(),
            None => loose_normalise(&self.raw),
        }
    }
}

/// A pluggable versioning format (§4.2).
pub trait Strategy: Send + Sync {
    fn parse(&self, raw: &str) -> ParsedVersion;
    fn compare(&self, a: &ParsedVersion, b: &ParsedVersion) -> Ordering;
    /// Descending unless the config says otherwise (§4.2).
    fn ascending(&self) -> bool {
        false
    }
}

/// Build the strategy object for a resolved versioning config.
pub fn build_strategy(config: &VersioningConfig) -> Result<Box<dyn Strategy>> {
    match config.format {
        VersioningFormat::Semver => Ok(Box::new(semver_fmt::SemverStrategy {
            ascending: config.ascending,
        })),
        VersioningFormat::Numeric => Ok(Box::new(numeric_fmt::NumericStrategy {
            ascending: config.ascending,
        })),
        VersioningFormat::Regex => Ok(Box::new(regex_fmt::RegexStrategy::new(
            config.pattern.as_deref(),
            config.ascending,
        )?)),
        VersioningFormat::Ordered => Ok(Box::new(ordered_fmt::OrderedStrategy::new(
            config.order.clone(),
            config.ascending,
        ))),
    }
}

/// Sort candidates newest-first under `strategy.ascending()`'s
/// direction (descending by default).
pub fn sort_versions(strategy: &dyn Strategy, versions: &mut [ParsedVersion]) {
    versions.sort_by(|a, b| {
        let ord = strategy.compare(a, b);
        if strategy.ascending() {
            ord
        } else {
            ord.reverse()
        }
    });
}

/// Deduplicate a list of raw version strings, preserving first
/// occurrence order, using each format's dedup key (§3, §8 "dedup is
/// idempotent").
pub fn dedup_raw(strategy: &dyn Strategy, raw_versions: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for raw in raw_versions {
        let parsed = strategy.parse(raw);
        if seen.insert(parsed.dedup_key()) {
            out.push(raw.clone());
        }
    }
    out
}
