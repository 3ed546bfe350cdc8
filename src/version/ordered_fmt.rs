//! `ordered` format (§4.2): an explicit, config-supplied list of
//! version strings, earliest-first on disk. `ascending` decides which
//! end of the list counts as newer.

use super::{ParsedVersion, Strategy};
use std::cmp::Ordering;
use std::collections::HashMap;

pub struct OrderedStrategy {
    index: HashMap<String, usize>,
    ascending: bool,
}

impl OrderedStrategy {
    pub fn new(order: Vec<String>, ascending: bool) -> OrderedStrategy {
        let index = order
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v, i))
            .collect();
        OrderedStrategy { index, ascending }
    }

    fn position(&self, raw: &str) -> Option<usize> {
        self.index.get(raw).copied()
    }
}

impl Strategy for OrderedStrategy {
    fn parse(&self, raw: &str) -> ParsedVersion {
        let position = self.position(raw);
        ParsedVersion {
            raw: raw.to_string(),
            triple: position.map(|p| (p as u64, 0, 0)),
            canonical: None,
            semver: None,
        }
    }

    /// Ordering here is over list position, not the numeric triple: a
    /// version later in the configured list always outranks one earlier
    /// in it, regardless of the `ascending` flag, which instead controls
    /// `sort_versions`'s overall direction (§4.2).
    fn compare(&self, a: &ParsedVersion, b: &ParsedVersion) -> Ordering {
        match (self.position(&a.raw), self.position(&b.raw)) {
            (Some(pa), Some(pb)) => pa.cmp(&pb),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => a.raw.cmp(&b.raw),
        }
    }

    fn ascending(&self) -> bool {
        self.ascending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_in_list_outranks_earlier() {
        let s = OrderedStrategy::new(
            vec!["alpha".into(), "beta".into(), "stable".into()],
            false,
        );
        let a = s.parse("alpha");
        let stable = s.parse("stable");
        assert_eq!(s.compare(&a, &stable), Ordering::Less);
    }

    #[test]
    fn unknown_version_sorts_below_known() {
        let s = OrderedStrategy::new(vec!["stable".into()], false);
        let known = s.parse("stable");
        let unknown = s.parse("mystery");
        assert_eq!(s.compare(&unknown, &known), Ordering::Less);
    }
}
