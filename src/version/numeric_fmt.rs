//! `numeric` format (§4.2): dot-separated integer segments compared
//! positionally to full precision, with no semver prerelease semantics.

use super::{ParsedVersion, Strategy};
use std::cmp::Ordering;

pub struct NumericStrategy {
    pub ascending: bool,
}

impl NumericStrategy {
    fn segments(raw: &str) -> Vec<u64> {
        raw.trim()
            .split(|c: char| !c.is_ascii_digit())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u64>().unwrap_or(0))
            .collect()
    }
}

impl Strategy for NumericStrategy {
    fn parse(&self, raw: &str) -> ParsedVersion {
        let segments = Self::segments(raw);
        let triple = match segments.as_slice() {
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
        let sa = Self::segments(&a.raw);
        let sb = Self::segments(&b.raw);
        let len = sa.len().max(sb.len());
        for i in 0..len {
            let va = sa.get(i).copied().unwrap_or(0);
            let vb = sb.get(i).copied().unwrap_or(0);
            match va.cmp(&vb) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }

    fn ascending(&self) -> bool {
        self.ascending
    }
}
