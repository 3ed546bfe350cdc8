//! Configuration schema (§6). These types are `Deserialize`-only data
//! contracts: loading a file from disk, resolving an `extends` chain,
//! and merging overlay files is explicitly out of scope (§1 Non-goals)
//! and stays with the external CLI/config loader. Callers hand this
//! crate a fully-resolved [`RootConfig`].

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub rules: HashMap<String, RuleConfig>,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub system_tests: SystemTestsConfig,
}

impl RootConfig {
    pub fn enabled_rules(&self) -> impl Iterator<Item = (&String, &RuleConfig)> {
        self.rules.iter().filter(|(_, r)| r.enabled)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub format: ManifestFormat,
    /// Which top-level manifest field holds prod vs. dev dependencies.
    #[serde(default)]
    pub fields: HashMap<String, DepFieldKind>,
    #[serde(default)]
    pub lock_files: Vec<LockFileCfg>,
    pub outdated: OutdatedConfig,
    pub update: UpdateConfig,
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub incremental: Vec<String>,
    #[serde(default)]
    pub exclude_versions: Vec<String>,
    #[serde(default)]
    pub package_overrides: HashMap<String, PackageOverride>,
    /// Extraction pattern for `format: raw` manifests — named groups
    /// `name`/`version`/`constraint`, mirroring the lock/outdated regex
    /// extractors (§4.6 supplement; no counterpart field exists in the
    /// distilled spec's JSON/YAML-only extraction detail).
    #[serde(default)]
    pub manifest_pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepFieldKind {
    Prod,
    Dev,
    /// A dependency bucket beyond prod/dev (npm `peerDependencies`,
    /// `optionalDependencies`, …) — carried through as
    /// `Package::extra_type`, never affects `--type prod|dev|all`.
    Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    #[default]
    Json,
    Yaml,
    Toml,
    Xml,
    Raw,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageOverride {
    #[serde(default)]
    pub ignore: Option<bool>,
    #[serde(default)]
    pub incremental: Option<bool>,
    #[serde(default)]
    pub exclude_versions: Vec<String>,
    /// `None` means "inherit the rule-level default exclusion pattern";
    /// `Some(_)` (including an empty vec, to opt out entirely) replaces
    /// it outright (§4.3).
    #[serde(default)]
    pub exclude_version_patterns: Option<Vec<String>>,
    #[serde(default)]
    pub versioning: Option<VersioningConfig>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutdatedConfig {
    pub commands: String,
    #[serde(default)]
    pub format: OutdatedFormat,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub exclude_versions: Vec<String>,
    /// `None` means "apply the built-in default pre-release exclusion
    /// pattern"; `Some(_)` (including empty, to opt out) replaces it
    /// (§4.3, §9 "default regex ... preserve this fallback order").
    #[serde(default)]
    pub exclude_version_patterns: Option<Vec<String>>,
    #[serde(default)]
    pub versioning: VersioningConfig,
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutdatedFormat {
    #[default]
    Json,
    Yaml,
    Raw,
    /// Lock-file-only extraction method (§4.7 "XML XPath"); never
    /// produced by an `outdated` command in practice.
    Xml,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionConfig {
    /// Dot-separated key path for json/yaml extraction.
    #[serde(default)]
    pub key_path: Option<String>,
    /// Regex for `raw` extraction; falls back to the default per-line
    /// version pattern when absent.
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConfig {
    pub commands: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockFileCfg {
    /// Path (relative to the manifest directory) when lock state comes
    /// from a file; mutually exclusive with `command`.
    #[serde(default)]
    pub path: Option<String>,
    /// Command to run to obtain lock-list output, for command-based
    /// ecosystems like Go modules.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub format: OutdatedFormat,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Regex over file content; when present, this pattern only runs if
    /// the predicate matches (§4.7).
    #[serde(default)]
    pub detect: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersioningFormat {
    #[default]
    Semver,
    Numeric,
    Regex,
    Ordered,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersioningConfig {
    #[serde(default)]
    pub format: VersioningFormat,
    /// User-supplied pattern for `regex` format.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Explicit ordering for `ordered` format (earliest-first on disk;
    /// direction below decides which end means "newer").
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub allow_complex_regex: bool,
    #[serde(default = "default_regex_complexity")]
    pub max_regex_complexity: usize,
}

fn default_regex_complexity() -> usize {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemTestRunMode {
    AfterEach,
    #[default]
    AfterAll,
    None,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemTestsConfig {
    #[serde(default)]
    pub run_preflight: bool,
    #[serde(default)]
    pub run_mode: SystemTestRunMode,
    #[serde(default)]
    pub stop_on_fail: bool,
    #[serde(default)]
    pub tests: Vec<SystemTestCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemTestCfg {
    pub name: String,
    pub commands: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub continue_on_fail: bool,
    #[serde(default)]
    pub env: HashMap<String, String>,
}
