use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::{MatchPolicy, TerritoryKind};

pub const DEFAULT_URI_BASE: &str =
    "http://ld.linked-open-statistics.org/data/conceptscheme/NutsRegion/";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    pub dataset_version: DatasetVersion,
    pub classification: ClassificationSource,
    pub geometry: GeometrySource,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Dataset version
// ---------------------------------------------------------------------------

/// Edition of the classification. Selects the normalization rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, serde::Serialize)]
pub enum DatasetVersion {
    #[serde(rename = "2013")]
    Nuts2013,
    #[serde(rename = "2016")]
    Nuts2016,
}

impl DatasetVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nuts2013 => "2013",
            Self::Nuts2016 => "2016",
        }
    }
}

impl std::fmt::Display for DatasetVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Classification CSV. Column values are header names, or 0-based indices
/// when `has_headers = false`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationSource {
    pub file: String,
    #[serde(default = "default_comma")]
    pub delimiter: String,
    #[serde(default = "default_true")]
    pub has_headers: bool,
    /// Raw level of the root tier. Entity level = raw level - level_base.
    #[serde(default = "default_level_base")]
    pub level_base: u32,
    /// Language tag of the display names.
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub columns: ClassificationColumns,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationColumns {
    pub internal_key: String,
    pub code: String,
    pub name: String,
    pub level: String,
    pub parent: String,
}

impl Default for ClassificationColumns {
    fn default() -> Self {
        Self {
            internal_key: "Code".into(),
            code: "NUTS-Code".into(),
            name: "Description".into(),
            level: "Level".into(),
            parent: "Parent".into(),
        }
    }
}

/// Geometry CSV. Tab separated without quoting by default: WKT literals
/// contain commas and the source never quotes them.
#[derive(Debug, Clone, Deserialize)]
pub struct GeometrySource {
    pub file: String,
    #[serde(default = "default_tab")]
    pub delimiter: String,
    #[serde(default = "default_true")]
    pub has_headers: bool,
    #[serde(default)]
    pub quoting: bool,
    #[serde(default)]
    pub columns: GeometryColumns,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeometryColumns {
    pub code: String,
    pub wkt: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for GeometryColumns {
    fn default() -> Self {
        Self {
            code: "nuts_id".into(),
            wkt: "wkt".into(),
            level: Some("stat_level".into()),
            name: Some("name_latn".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PolicyTarget {
    pub policy: MatchPolicy,
    pub territory: TerritoryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LevelPolicy {
    pub level: u32,
    pub policy: MatchPolicy,
    pub territory: TerritoryKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubstitutionConfig {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Only entities whose code starts with this prefix are matched.
    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,
    #[serde(default = "default_level_policies")]
    pub levels: Vec<LevelPolicy>,
    /// Policy for levels not listed in `levels`. `fallback = false` turns
    /// it off so only the listed levels are matched.
    #[serde(default = "default_fallback", deserialize_with = "deserialize_fallback")]
    pub fallback: Option<PolicyTarget>,
    /// Replaces the version's built-in substitution table when present.
    #[serde(default)]
    pub substitutions: Option<Vec<SubstitutionConfig>>,
    /// Merged over the version's built-in region rename table.
    #[serde(default)]
    pub region_renames: BTreeMap<String, String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            code_prefix: default_code_prefix(),
            levels: default_level_policies(),
            fallback: default_fallback(),
            substitutions: None,
            region_renames: BTreeMap::new(),
        }
    }
}

impl MatchingConfig {
    pub fn policy_for(&self, level: u32) -> Option<PolicyTarget> {
        self.levels
            .iter()
            .find(|p| p.level == level)
            .map(|p| PolicyTarget {
                policy: p.policy,
                territory: p.territory,
            })
            .or(self.fallback)
    }

    /// Territory kinds the directory must be queried for, in a stable order.
    pub fn territories(&self) -> Vec<TerritoryKind> {
        let mut kinds: Vec<TerritoryKind> = self.levels.iter().map(|p| p.territory).collect();
        if let Some(fallback) = self.fallback {
            kinds.push(fallback.territory);
        }
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

// ---------------------------------------------------------------------------
// Directory + output
// ---------------------------------------------------------------------------

/// Where the name directory comes from. Exactly one of `endpoint` / `file`.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default = "default_uri_base")]
    pub uri_base: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: None,
            uri_base: default_uri_base(),
        }
    }
}

impl OutputConfig {
    pub fn entity_uri(&self, code: &str) -> String {
        format!("{}{}", self.uri_base, code.to_uppercase())
    }

    pub fn geometry_uri(&self, code: &str) -> String {
        format!("{}/geometry", self.entity_uri(code))
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_comma() -> String {
    ",".into()
}

fn default_tab() -> String {
    "\t".into()
}

fn default_true() -> bool {
    true
}

fn default_level_base() -> u32 {
    1
}

fn default_lang() -> String {
    "en".into()
}

fn default_code_prefix() -> String {
    "FR".into()
}

fn default_level_policies() -> Vec<LevelPolicy> {
    vec![LevelPolicy {
        level: 3,
        policy: MatchPolicy::Exact,
        territory: TerritoryKind::Departement,
    }]
}

fn default_fallback() -> Option<PolicyTarget> {
    Some(PolicyTarget {
        policy: MatchPolicy::CaseInsensitive,
        territory: TerritoryKind::Region,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FallbackSetting {
    Enabled(bool),
    Target(PolicyTarget),
}

fn deserialize_fallback<'de, D>(deserializer: D) -> Result<Option<PolicyTarget>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match FallbackSetting::deserialize(deserializer)? {
        FallbackSetting::Enabled(true) => default_fallback(),
        FallbackSetting::Enabled(false) => None,
        FallbackSetting::Target(target) => Some(target),
    })
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    2
}

fn default_uri_base() -> String {
    DEFAULT_URI_BASE.into()
}

/// Single-byte CSV delimiter. Accepts the literal character or `tab`.
pub fn delimiter_byte(value: &str) -> Result<u8, ReconError> {
    let value = if value.eq_ignore_ascii_case("tab") { "\t" } else { value };
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(ReconError::ConfigValidation(format!(
            "delimiter must be a single ASCII character, got {value:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        delimiter_byte(&self.classification.delimiter)?;
        delimiter_byte(&self.geometry.delimiter)?;

        let c = &self.classification.columns;
        check_columns(
            "classification",
            self.classification.has_headers,
            &[&c.internal_key, &c.code, &c.name, &c.level, &c.parent],
        )?;

        let g = &self.geometry.columns;
        let mut geometry_columns = vec![&g.code, &g.wkt];
        geometry_columns.extend(g.level.iter());
        geometry_columns.extend(g.name.iter());
        check_columns("geometry", self.geometry.has_headers, &geometry_columns)?;

        let mut seen = HashSet::new();
        for policy in &self.matching.levels {
            if !seen.insert(policy.level) {
                return Err(ReconError::ConfigValidation(format!(
                    "matching: level {} has more than one policy",
                    policy.level
                )));
            }
        }

        for sub in self.matching.substitutions.iter().flatten() {
            if sub.from.is_empty() {
                return Err(ReconError::ConfigValidation(
                    "matching: substitution with an empty 'from'".into(),
                ));
            }
        }

        if let Some(ref dir) = self.directory {
            match (&dir.endpoint, &dir.file) {
                (Some(_), Some(_)) => {
                    return Err(ReconError::ConfigValidation(
                        "directory: set either 'endpoint' or 'file', not both".into(),
                    ))
                }
                (None, None) => {
                    return Err(ReconError::ConfigValidation(
                        "directory: one of 'endpoint' or 'file' is required".into(),
                    ))
                }
                _ => {}
            }
            if dir.timeout_secs == 0 {
                return Err(ReconError::ConfigValidation(
                    "directory: timeout_secs must be positive".into(),
                ));
            }
        }

        Ok(())
    }
}

fn check_columns(source: &str, has_headers: bool, columns: &[&String]) -> Result<(), ReconError> {
    for col in columns {
        if col.trim().is_empty() {
            return Err(ReconError::ConfigValidation(format!(
                "{source}: column names must not be empty"
            )));
        }
        if !has_headers && col.parse::<usize>().is_err() {
            return Err(ReconError::ConfigValidation(format!(
                "{source}: without a header row, column '{col}' must be a 0-based index"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
