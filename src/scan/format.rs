//! Per-format manifest parsers dispatched by `scan::dispatch` (§4.6).

use super::fields::extract_from_json_value;
use anyhow::Result;
use depsync_common::config::RuleConfig;
use depsync_common::error::CoreError;
use depsync_common::model::Package;
use regex::Regex;
use std::path::Path;

pub fn parse_json(bytes: &[u8], rule_name: &str, rule: &RuleConfig, manifest_path: &Path) -> Result<Vec<Package>> {
    let root: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| CoreError::Parse(format!("invalid json manifest: {e}")))?;
    Ok(extract_from_json_value(&root, &rule.fields, rule_name, manifest_path))
}

pub fn parse_yaml(bytes: &[u8], rule_name: &str, rule: &RuleConfig, manifest_path: &Path) -> Result<Vec<Package>> {
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_slice(bytes).map_err(|e| CoreError::Parse(format!("invalid yaml manifest: {e}")))?;
    let root = serde_json::to_value(&yaml_value)
        .map_err(|e| CoreError::Parse(format!("could not normalise yaml manifest: {e}")))?;
    Ok(extract_from_json_value(&root, &rule.fields, rule_name, manifest_path))
}

pub fn parse_toml(bytes: &[u8], rule_name: &str, rule: &RuleConfig, manifest_path: &Path) -> Result<Vec<Package>> {
    let text = std::str::from_utf8(bytes).map_err(|e| CoreError::Parse(format!("manifest is not utf-8: {e}")))?;
    let toml_value: toml::Value =
        toml::from_str(text).map_err(|e| CoreError::Parse(format!("invalid toml manifest: {e}")))?;
    let root = serde_json::to_value(&toml_value)
        .map_err(|e| CoreError::Parse(format!("could not normalise toml manifest: {e}")))?;
    Ok(extract_from_json_value(&root, &rule.fields, rule_name, manifest_path))
}

/// MSBuild `<PackageReference Include="..." Version="..." />` and
/// `packages.config`'s `<package id="..." version="..." />` — the two
/// NuGet manifest shapes, both XML (§4.6 supplement).
pub fn parse_xml(bytes: &[u8], rule_name: &str, _rule: &RuleConfig, manifest_path: &Path) -> Result<Vec<Package>> {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let text = std::str::from_utf8(bytes).map_err(|e| CoreError::Parse(format!("manifest is not utf-8: {e}")))?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag != "PackageReference" && tag != "package" {
                    continue;
                }
                let mut name = None;
                let mut version = None;
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    let value = attr
                        .decode_and_unescape_value(reader.decoder())
                        .unwrap_or_default()
                        .to_string();
                    match key.as_str() {
                        "Include" | "id" => name = Some(value),
                        "Version" | "version" => version = Some(value),
                        _ => {}
                    }
                }
                if let (Some(name), Some(version_raw)) = (name, version) {
                    let (constraint, version) = super::fields::split_constraint(&version_raw);
                    out.push(Package {
                        rule: rule_name.to_string(),
                        name,
                        version,
                        constraint,
                        installed_version: None,
                        dependency_type: depsync_common::model::DependencyType::Prod,
                        extra_type: None,
                        source: manifest_path.to_path_buf(),
                        group: None,
                        ignore: false,
                        incremental: false,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(CoreError::Parse(format!("invalid xml manifest: {e}")).into()),
        }
        buf.clear();
    }

    Ok(out)
}

/// `name`/`version`/`constraint` named groups over each line, per rule's
/// `manifest_pattern` (§4.6 supplement, mirroring the raw fetcher
/// extractor of §4.3).
pub fn parse_raw(bytes: &[u8], rule_name: &str, rule: &RuleConfig, manifest_path: &Path) -> Result<Vec<Package>> {
    let text = String::from_utf8_lossy(bytes);
    let pattern = rule
        .manifest_pattern
        .as_deref()
        .ok_or_else(|| CoreError::Config("raw manifest format requires manifest_pattern".to_string()))?;
    let re = Regex::new(pattern).map_err(|e| CoreError::Config(format!("invalid manifest_pattern: {e}")))?;

    let mut out = Vec::new();
    for line in text.lines() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let Some(name) = caps.name("name").map(|m| m.as_str().to_string()) else {
            continue;
        };
        let raw_version = caps.name("version").map(|m| m.as_str().to_string()).unwrap_or_default();
        let constraint = caps
            .name("constraint")
            .map(|m| depsync_common::model::Constraint::normalise(m.as_str()))
            .unwrap_or(depsync_common::model::Constraint::None);
        out.push(Package {
            rule: rule_name.to_string(),
            name,
            version: raw_version,
            constraint,
            installed_version: None,
            dependency_type: depsync_common::model::DependencyType::Prod,
            extra_type: None,
            source: manifest_path.to_path_buf(),
            group: None,
            ignore: false,
            incremental: false,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use depsync_common::config::{ExtractionConfig, OutdatedConfig, OutdatedFormat, UpdateConfig, VersioningConfig};
    use std::collections::HashMap;

    fn rule_with_fields(fields: HashMap<String, depsync_common::config::DepFieldKind>) -> RuleConfig {
        RuleConfig {
            enabled: true,
            include: vec![],
            exclude: vec![],
            format: depsync_common::config::ManifestFormat::Json,
            fields,
            lock_files: vec![],
            outdated: OutdatedConfig {
                commands: String::new(),
                format: OutdatedFormat::Json,
                extraction: ExtractionConfig::default(),
                env: HashMap::new(),
                timeout_seconds: 30,
                exclude_versions: vec![],
                exclude_version_patterns: None,
                versioning: VersioningConfig::default(),
            },
            update: UpdateConfig {
                commands: String::new(),
                env: HashMap::new(),
                timeout_seconds: 30,
            },
            groups: HashMap::new(),
            ignore: vec![],
            incremental: vec![],
            exclude_versions: vec![],
            package_overrides: HashMap::new(),
            manifest_pattern: None,
        }
    }

    #[test]
    fn parses_json_manifest() {
        let mut fields = HashMap::new();
        fields.insert("dependencies".to_string(), depsync_common::config::DepFieldKind::Prod);
        let rule = rule_with_fields(fields);
        let packages = parse_json(br#"{"dependencies":{"lodash":"^4.17.0"}}"#, "npm", &rule, Path::new("package.json")).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "lodash");
    }

    #[test]
    fn parses_toml_manifest() {
        let mut fields = HashMap::new();
        fields.insert("dependencies".to_string(), depsync_common::config::DepFieldKind::Prod);
        let rule = rule_with_fields(fields);
        let body = b"[dependencies]\nserde = \"1.0\"\n";
        let packages = parse_toml(body, "cargo", &rule, Path::new("Cargo.toml")).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "serde");
    }

    #[test]
    fn parses_xml_package_reference() {
        let rule = rule_with_fields(HashMap::new());
        let body = br#"<Project><ItemGroup><PackageReference Include="Newtonsoft.Json" Version="12.0.0" /></ItemGroup></Project>"#;
        let packages = parse_xml(body, "nuget", &rule, Path::new("proj.csproj")).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "Newtonsoft.Json");
        assert_eq!(packages[0].version, "12.0.0");
    }

    #[test]
    fn parses_raw_manifest_with_named_groups() {
        let mut rule = rule_with_fields(HashMap::new());
        rule.manifest_pattern = Some(r"^(?P<name>\S+)\s+(?P<constraint>[><=^~]*)\s*(?P<version>\S+)$".to_string());
        let packages = parse_raw(b"flask >=2.0.0\n", "pip", &rule, Path::new("requirements.txt")).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "flask");
        assert_eq!(packages[0].version, "2.0.0");
    }
}
