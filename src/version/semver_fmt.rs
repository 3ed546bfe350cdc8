//! Default `semver` format (§4.2): strict when possible, lenient
//! fallback to a three-segment integer triple otherwise.

use super::{ParsedVersion, Strategy};
use std::cmp::Ordering;

pub struct SemverStrategy {
    pub ascending: bool,
}

impl Strategy for SemverStrategy {
    fn parse(&self, raw: &str) -> ParsedVersion {
        let candidate = raw.trim();
        let stripped = candidate
            .strip_prefix('v')
            .or_else(|| candidate.strip_prefix('V'))
            .unwrap_or(candidate);

        for attempt in [candidate, stripped] {
            if let Ok(v) = semver::Version::parse(attempt) {
                return ParsedVersion {
                    raw: raw.to_string(),
                    triple: Some((v.major, v.minor, v.patch)),
                    canonical: Some(v.to_string()),
                    semver: Some(v),
                };
            }
        }

        // Lenient fallback: first three dot-separated numeric segments,
        // so four-plus segment strings (`1.0.0.0`) still bucket by
        // major/minor/patch even though they carry no canonical form.
        let nums: Vec<u64> = stripped
            .split(|c: char| c == '.' || c == '-' || c == '+')
            .map_while(|seg| seg.parse::<u64>().ok())
            .collect();
        let triple = match nums.as_slice() {
            [a, b, c, ..] => Some((*a, *b, *c)),
            [a, b] => Some((*a, *b, 0)),
            [a] => Some((*a, 0, 0)),
            [] => None,
        };

        ParsedVersion {
            raw: raw.to_string(),
            triple,
            canonical: None,
            semver: None,
        }
    }

    fn compare(&self, a: &ParsedVersion, b: &ParsedVersion) -> Ordering {
        if let (Some(av), Some(bv)) = (&a.semver, &b.semver) {
            return av.cmp(bv);
        }
        if let (Some(at), Some(bt)) = (a.triple, b.triple) {
            return at.cmp(&bt);
        }
        a.dedup_key().cmp(&b.dedup_key())
    }

    fn ascending(&self) -> bool {
        self.ascending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_v() {
        let s = SemverStrategy { ascending: false };
        let parsed = s.parse("v1.2.3");
        assert_eq!(parsed.canonical.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn non_semver_falls_back_to_triple() {
        let s = SemverStrategy { ascending: false };
        let parsed = s.parse("1.0.0.5");
        assert_eq!(parsed.triple, Some((1, 0, 0)));
        assert!(parsed.canonical.is_none());
    }

    #[test]
    fn release_outranks_prerelease() {
        let s = SemverStrategy { ascending: false };
        let a = s.parse("2.0.0-beta.1");
        let b = s.parse("2.0.0");
        assert_eq!(s.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn canonical_form_round_trips() {
        let s = SemverStrategy { ascending: false };
        for raw in ["1.2.3", "1.2.3-rc.1", "2.0.0+build.5", "0.0.1"] {
            let parsed = s.parse(raw);
            let canonical = parsed.canonical.clone().unwrap();
            let reparsed = s.parse(&canonical);
            assert_eq!(reparsed.canonical, parsed.canonical);
        }
    }
}
