//! Regex safety checks for user-supplied exclusion patterns (§4.3,
//! §6 "security knobs").

use anyhow::Result;
use depsync_common::config::SecurityConfig;
use depsync_common::error::CoreError;
use regex::Regex;

/// Reject patterns that are too long or look like they invite
/// catastrophic backtracking (nested unbounded quantifiers), unless the
/// caller's security config grants `allow_complex_regex`. Returns the
/// compiled regex on success.
pub fn compile_guarded(pattern: &str, security: &SecurityConfig) -> Result<Regex> {
    if pattern.len() > security.max_regex_complexity {
        return Err(CoreError::Filter(format!(
            "pattern exceeds max_regex_complexity ({} > {})",
            pattern.len(),
            security.max_regex_complexity
        ))
        .into());
    }

    if !security.allow_complex_regex && looks_catastrophic(pattern) {
        return Err(CoreError::Filter(format!(
            "pattern '{pattern}' looks like it risks catastrophic backtracking; set security.allow_complex_regex to override"
        ))
        .into());
    }

    Regex::new(pattern).map_err(|e| CoreError::Filter(format!("invalid pattern '{pattern}': {e}")).into())
}

/// Heuristic: a quantified group immediately followed by another
/// quantifier (`(a+)+`, `(a*)*`, `(.+)+`) is the classic
/// exponential-blowup shape.
fn looks_catastrophic(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    let mut depth_close_positions = Vec::new();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b')' {
            depth_close_positions.push(i);
        }
    }
    for pos in depth_close_positions {
        let inner_has_quantifier = find_matching_open(bytes, pos)
            .map(|open| {
                bytes[open + 1..pos]
                    .iter()
                    .any(|b| matches!(b, b'+' | b'*'))
            })
            .unwrap_or(false);
        if !inner_has_quantifier {
            continue;
        }
        if let Some(next) = bytes.get(pos + 1) {
            if matches!(next, b'+' | b'*') {
                return true;
            }
        }
    }
    false
}

fn find_matching_open(bytes: &[u8], close: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut i = close;
    loop {
        match bytes[i] {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        if i == 0 {
            return None;
        }
        i -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn security(allow: bool, max_len: usize) -> SecurityConfig {
        SecurityConfig {
            allow_complex_regex: allow,
            max_regex_complexity: max_len,
        }
    }

    #[test]
    fn rejects_overlong_pattern() {
        let pattern = "a".repeat(20);
        let err = compile_guarded(&pattern, &security(false, 10)).unwrap_err();
        assert!(err.downcast_ref::<CoreError>().is_some());
    }

    #[test]
    fn rejects_nested_quantifiers_by_default() {
        let err = compile_guarded("(a+)+", &security(false, 1000)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::Filter(_))
        ));
    }

    #[test]
    fn allows_nested_quantifiers_when_granted() {
        assert!(compile_guarded("(a+)+", &security(true, 1000)).is_ok());
    }

    #[test]
    fn accepts_ordinary_pattern() {
        assert!(compile_guarded(r"^\d+\.\d+\.\d+$", &security(false, 1000)).is_ok());
    }
}
