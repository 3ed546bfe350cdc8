//! `{{key}}` substitution (§4.1 "Substitution").

use std::collections::HashMap;

/// Replace every `{{key}}` placeholder in `template` with its
/// shell-escaped value from `substitutions`. Keys with no entry are
/// left untouched so a config author notices the typo instead of
/// silently getting an empty string.
pub fn substitute(template: &str, substitutions: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let key = after_open[..end].trim();
                match substitutions.get(key) {
                    Some(value) => out.push_str(&depsync_common::text::shell_escape(value)),
                    None => {
                        out.push_str("{{");
                        out.push_str(&after_open[..end]);
                        out.push_str("}}");
                    }
                }
                rest = &after_open[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}
