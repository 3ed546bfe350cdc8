//! Splits a (substituted) multi-line command block into sequential
//! command groups, where a group is either a single logical line or a
//! pipe chain (§4.1 "Parsing").

/// One unit of work for the executor: a plain command, or a chain of
/// piped commands to be joined with ` | ` and handed to the shell as
/// one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandGroup {
    pub parts: Vec<String>,
}

impl CommandGroup {
    pub fn joined(&self) -> String {
        self.parts.join(" | ")
    }
}

/// Parse a command block into sequential groups. Line endings are
/// normalised CRLF→LF first. A physical line ending in `\` continues to
/// the next physical line with a joining space. A logical line ending
/// in `|`, or containing an unquoted `|`, extends the current pipe
/// chain; otherwise it starts a new standalone group.
pub fn split_into_groups(block: &str) -> Vec<CommandGroup> {
    let normalised = block.replace("\r\n", "\n");

    // Join backslash-continued physical lines into logical lines first.
    let mut logical_lines: Vec<String> = Vec::new();
    let mut pending = String::new();
    for physical in normalised.split('\n') {
        if let Some(stripped) = physical.strip_suffix('\\') {
            if !pending.is_empty() {
                pending.push(' ');
            }
            pending.push_str(stripped.trim_end());
            continue;
        }
        if !pending.is_empty() {
            pending.push(' ');
            pending.push_str(physical.trim_start());
            logical_lines.push(std::mem::take(&mut pending));
        } else {
            logical_lines.push(physical.to_string());
        }
    }
    if !pending.is_empty() {
        logical_lines.push(pending);
    }

    let mut groups: Vec<CommandGroup> = Vec::new();
    let mut current: Option<CommandGroup> = None;

    for line in logical_lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ends_with_pipe = trimmed.ends_with('|');
        let part = trimmed.trim_end_matches('|').trim_end().to_string();
        let has_unquoted_pipe = ends_with_pipe || contains_unquoted_pipe(trimmed);

        match &mut current {
            Some(group) => {
                group.parts.push(part);
                if !has_unquoted_pipe {
                    groups.push(current.take().unwrap());
                }
            }
            None => {
                if has_unquoted_pipe {
                    current = Some(CommandGroup { parts: vec![part] });
                } else {
                    groups.push(CommandGroup { parts: vec![part] });
                }
            }
        }
    }

    if let Some(group) = current {
        groups.push(group);
    }

    groups
}

/// Whether `line` contains a `|` outside single/double quotes — used to
/// detect an inline pipe chain written on one logical line, e.g.
/// `curl ... | jq '.versions'`.
fn contains_unquoted_pipe(line: &str) -> bool {
    let mut in_single = false;
    let mut in_double = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '|' if !in_single && !in_double => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_lines_are_separate_groups() {
        let groups = split_into_groups("echo one\necho two");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].joined(), "echo one");
        assert_eq!(groups[1].joined(), "echo two");
    }

    #[test]
    fn trailing_pipe_extends_to_next_line() {
        let groups = split_into_groups("curl -s example.com |\njq '.versions'");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].parts, vec!["curl -s example.com", "jq '.versions'"]);
    }

    #[test]
    fn inline_pipe_is_one_group() {
        let groups = split_into_groups("curl -s example.com | jq '.versions'");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].joined(), "curl -s example.com | jq '.versions'");
    }

    #[test]
    fn backslash_continuation_joins_with_space() {
        let groups = split_into_groups("echo one \\\ntwo");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].joined(), "echo one two");
    }

    #[test]
    fn crlf_is_normalised() {
        let groups = split_into_groups("echo one\r\necho two");
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn quoted_pipe_does_not_split() {
        let groups = split_into_groups("echo 'a|b'");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].joined(), "echo 'a|b'");
    }
}
