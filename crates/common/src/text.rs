//! Small text utilities shared across components.

use std::env;

/// Expand `$VAR` and `${VAR}` references against the process environment,
/// leaving unknown references untouched.
///
/// Adapted from the teacher's manifest-path expander
/// (`manager_manifest::schema::expand_env_vars`); the depsync command
/// substrate uses the same algorithm to expand env-map values per §4.1
/// ("values may reference process env via `$VAR`").
pub fn expand_env_vars(raw: &str) -> String {
    let mut result = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        if matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '}' {
                    break;
                }
                name.push(c);
                chars.next();
            }

            if matches!(chars.peek(), Some('}')) {
                chars.next();
            } else {
                result.push_str("${");
                result.push_str(&name);
                continue;
            }

            if name.is_empty() {
                continue;
            }

            match env::var(&name) {
                Ok(value) => result.push_str(&value),
                Err(_) => {
                    result.push_str("${");
                    result.push_str(&name);
                    result.push('}');
                }
            }
            continue;
        }

        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c == '_' || c.is_ascii_alphanumeric() {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }

        if name.is_empty() {
            result.push('$');
            continue;
        }

        match env::var(&name) {
            Ok(value) => result.push_str(&value),
            Err(_) => {
                result.push('$');
                result.push_str(&name);
            }
        }
    }

    result
}

/// `true` when `s` contains only characters that are safe to splice into
/// a shell command unquoted (see §4.1 "Escaping rules").
pub fn is_shell_safe_unquoted(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./@:+=".contains(c))
}

/// Single-quote `s` for safe splicing into a POSIX shell command,
/// escaping embedded single quotes with the `'\''` idiom.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Shell-escape `value` per §4.1: pass through unquoted when it is
/// composed only of "safe" characters, single-quote otherwise. Empty
/// values substitute to the empty string, not `''`.
pub fn shell_escape(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    if is_shell_safe_unquoted(value) {
        value.to_string()
    } else {
        shell_quote(value)
    }
}
