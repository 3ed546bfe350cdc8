//! Output parsers for the three `outdated` formats (§4.3).

use anyhow::Result;
use depsync_common::error::CoreError;
use regex::Regex;
use std::sync::OnceLock;

/// `v?\d+\.\d+(\.\d+)?(…)?` per-line default, used when `raw` format has
/// no configured pattern (§4.3, §9).
fn default_raw_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"v?\d+\.\d+(?:\.\d+)?(?:[-+][0-9A-Za-z.-]+)?").expect("static pattern is valid")
    })
}

/// Walk a dot-separated key path into a `serde_json::Value` tree. An
/// array node yields its elements (as strings); a map node yields its
/// keys (e.g. an npm `versions` object).
pub fn extract_json(body: &[u8], key_path: Option<&str>) -> Result<Vec<String>> {
    let root: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| CoreError::Parse(format!("invalid json output: {e}")))?;
    let node = walk_json(&root, key_path)?;
    json_leaves(node)
}

fn walk_json<'a>(root: &'a serde_json::Value, key_path: Option<&str>) -> Result<&'a serde_json::Value> {
    let mut node = root;
    if let Some(path) = key_path {
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            node = node
                .get(segment)
                .ok_or_else(|| CoreError::Parse(format!("key path segment '{segment}' not found")))?;
        }
    }
    Ok(node)
}

fn json_leaves(node: &serde_json::Value) -> Result<Vec<String>> {
    match node {
        serde_json::Value::Array(items) => Ok(items.iter().filter_map(json_scalar).collect()),
        serde_json::Value::Object(map) => Ok(map.keys().cloned().collect()),
        other => Ok(json_scalar(other).into_iter().collect()),
    }
}

fn json_scalar(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Same key-path walk as JSON, over a YAML document; accepts
/// array/string/single-value leaves (§4.3).
pub fn extract_yaml(body: &[u8], key_path: Option<&str>) -> Result<Vec<String>> {
    let root: serde_yaml::Value =
        serde_yaml::from_slice(body).map_err(|e| CoreError::Parse(format!("invalid yaml output: {e}")))?;
    let mut node = &root;
    if let Some(path) = key_path {
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            node = node
                .get(segment)
                .ok_or_else(|| CoreError::Parse(format!("key path segment '{segment}' not found")))?;
        }
    }
    yaml_leaves(node)
}

fn yaml_leaves(node: &serde_yaml::Value) -> Result<Vec<String>> {
    match node {
        serde_yaml::Value::Sequence(items) => Ok(items.iter().filter_map(yaml_scalar).collect()),
        serde_yaml::Value::Mapping(map) => Ok(map
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect()),
        other => Ok(yaml_scalar(other).into_iter().collect()),
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Apply `pattern` (or the default) per-line: prefer the named group
/// `version`, else capture group 1, else the entire match. Deduplicates
/// preserving first occurrence (§4.3).
pub fn extract_raw(text: &str, pattern: Option<&Regex>) -> Vec<String> {
    let default = default_raw_pattern();
    let re = pattern.unwrap_or(default);
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for line in text.lines() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let value = caps
            .name("version")
            .or_else(|| caps.get(1))
            .unwrap_or_else(|| caps.get(0).expect("a match always has group 0"))
            .as_str()
            .to_string();
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_array_of_strings() {
        let body = br#"["4.17.21","4.18.0"]"#;
        let out = extract_json(body, None).unwrap();
        assert_eq!(out, vec!["4.17.21", "4.18.0"]);
    }

    #[test]
    fn json_nested_object_keys() {
        let body = br#"{"versions":{"4.17.21":{},"4.18.0":{}}}"#;
        let mut out = extract_json(body, Some("versions")).unwrap();
        out.sort();
        assert_eq!(out, vec!["4.17.21", "4.18.0"]);
    }

    #[test]
    fn yaml_sequence() {
        let body = b"- 1.0.0\n- 1.1.0\n";
        let out = extract_yaml(body, None).unwrap();
        assert_eq!(out, vec!["1.0.0", "1.1.0"]);
    }

    #[test]
    fn raw_prefers_named_version_group() {
        let re = Regex::new(r"tag:\s*(?P<version>v?\d+\.\d+\.\d+)").unwrap();
        let out = extract_raw("tag: v1.2.3 (latest)\nnoise", Some(&re));
        assert_eq!(out, vec!["v1.2.3"]);
    }

    #[test]
    fn raw_default_pattern_and_dedup() {
        let out = extract_raw("1.2.3 released\n1.2.3 again\n1.3.0 released", None);
        assert_eq!(out, vec!["1.2.3", "1.3.0"]);
    }
}
