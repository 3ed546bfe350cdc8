//! `regex` format (§4.2): a user-supplied pattern with `major`/`minor`/
//! `patch` named groups (or three positional captures) pulls the
//! comparable triple out of an otherwise free-form version string.

use super::{ParsedVersion, Strategy};
use anyhow::{bail, Result};
use depsync_common::error::CoreError;
use regex::Regex;
use std::cmp::Ordering;

pub struct RegexStrategy {
    regex: Regex,
    ascending: bool,
}

impl RegexStrategy {
    pub fn new(pattern: Option<&str>, ascending: bool) -> Result<RegexStrategy> {
        let pattern = match pattern {
            Some(p) if !p.trim().is_empty() => p,
            _ => {
                bail!(CoreError::Config(
                    "regex versioning format requires a pattern".into()
                ))
            }
        };
        let regex = Regex::new(pattern)
            .map_err(|e| CoreError::Config(format!("invalid versioning pattern: {e}")))?;
        Ok(RegexStrategy { regex, ascending })
    }

    /// When the pattern admits more than one match over `raw` (e.g. a
    /// bare `(\d+)\.(\d+)\.(\d+)` over `1.2.3.4`), picks the match with
    /// the most non-empty major/minor/patch groups, tied-broken by the
    /// longer overall match, so `1.2.3.4` resolves to `1.2.3` rather
    /// than the trailing `.3.4`.
    fn triple(&self, raw: &str) -> Option<(u64, u64, u64)> {
        let mut best: Option<(usize, usize, (u64, u64, u64))> = None;

        for caps in self.regex.captures_iter(raw) {
            let get = |name: &str, idx: usize| -> Option<u64> {
                caps.name(name)
                    .or_else(|| caps.get(idx))
                    .and_then(|m| m.as_str().parse::<u64>().ok())
            };
            let Some(major) = get("major", 1) else { continue };
            let minor = get("minor", 2);
            let patch = get("patch", 3);
            let score = 1 + minor.is_some() as usize + patch.is_some() as usize;
            let whole = caps.get(0).map(|m| m.as_str().len()).unwrap_or(0);
            let triple = (major, minor.unwrap_or(0), patch.unwrap_or(0));

            let better = match &best {
                None => true,
                Some((best_score, best_len, _)) => (score, whole) > (*best_score, *best_len),
            };
            if better {
                best = Some((score, whole, triple));
            }
        }

        best.map(|(_, _, triple)| triple)
    }
}

impl Strategy for RegexStrategy {
    fn parse(&self, raw: &str) -> ParsedVersion {
        ParsedVersion {
            raw: raw.to_string(),
            triple: self.triple(raw),
            canonical: None,
            semver: None,
        }
    }

    fn compare(&self, a: &ParsedVersion, b: &ParsedVersion) -> Ordering {
        match (a.triple, b.triple) {
            (Some(at), Some(bt)) => at.cmp(&bt),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => a.raw.cmp(&b.raw),
        }
    }

    fn ascending(&self) -> bool {
        self.ascending
    }
}
