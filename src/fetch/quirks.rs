//! Per-ecosystem normalisation of the outdated command and its failure
//! output (§4.3 "Normalisation for ecosystem quirks").

/// Insert `-mod=mod` into a `go` command block unless it is already
/// present, so `go list -m -u -json all` resolves modules the same way
/// regardless of `GOFLAGS`.
pub fn go_mod_flag(commands: &str) -> String {
    if commands.contains("-mod=") {
        return commands.to_string();
    }
    commands
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("go ") {
                let indent = &line[..line.len() - trimmed.len()];
                format!("{indent}go -mod=mod {}", &trimmed[3..])
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `true` when a dotnet failure message reports a known non-failure
/// condition that should surface as `Unsupported` rather than a raw
/// exec error.
pub fn is_dotnet_unsupported(message: &str) -> bool {
    message.contains("No assets file was found") || message.contains("Found more than one project")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_mod_flag_once() {
        let out = go_mod_flag("go list -m -u -json all");
        assert_eq!(out, "go -mod=mod list -m -u -json all");
    }

    #[test]
    fn leaves_existing_flag_untouched() {
        let out = go_mod_flag("go -mod=readonly list -m -u all");
        assert_eq!(out, "go -mod=readonly list -m -u all");
    }

    #[test]
    fn recognises_dotnet_markers() {
        assert!(is_dotnet_unsupported("error: No assets file was found for project"));
        assert!(is_dotnet_unsupported("Found more than one project in the folder"));
        assert!(!is_dotnet_unsupported("some other failure"));
    }
}
