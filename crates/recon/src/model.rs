use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Which dataset a record or warning comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Classification,
    Geometry,
    Directory,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classification => write!(f, "classification"),
            Self::Geometry => write!(f, "geometry"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Territory classes known to the name directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerritoryKind {
    Region,
    Departement,
    Arrondissement,
    Commune,
}

impl TerritoryKind {
    /// Class name used by the directory vocabulary (`igeo:Region`, ...).
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Region => "Region",
            Self::Departement => "Departement",
            Self::Arrondissement => "Arrondissement",
            Self::Commune => "Commune",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "region" => Some(Self::Region),
            "departement" | "department" => Some(Self::Departement),
            "arrondissement" => Some(Self::Arrondissement),
            "commune" => Some(Self::Commune),
            _ => None,
        }
    }
}

impl std::fmt::Display for TerritoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.class_name())
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A classification row after column mapping. Fields are still raw text;
/// [`crate::code_table::CodeTable::load`] validates them.
#[derive(Debug, Clone, Default)]
pub struct ClassificationRow {
    /// 1-based line in the source file (header included).
    pub line: u64,
    pub internal_key: String,
    pub code: String,
    pub name: String,
    pub level: String,
    pub parent_key: String,
}

/// A geometry row after column mapping.
#[derive(Debug, Clone, Default)]
pub struct GeometryRow {
    pub line: u64,
    pub code: String,
    pub wkt: String,
    pub level: Option<u32>,
    pub name: Option<String>,
}

/// Pre-loaded records for one run.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub classification: Vec<ClassificationRow>,
    pub geometry: Vec<GeometryRow>,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Boundary literal attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub wkt: String,
    pub line: u64,
}

/// One region of the classification, keyed by its public code.
#[derive(Debug, Clone, Serialize)]
pub struct RegionEntity {
    pub code: String,
    pub name: String,
    pub lang: String,
    pub level: u32,
    pub internal_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<String>,
    pub line: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

/// Directed parent → child edge between two entity codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyRelation {
    pub parent: String,
    pub child: String,
}

// ---------------------------------------------------------------------------
// Directory + links
// ---------------------------------------------------------------------------

/// A record of the name directory. No code, no level: only a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameDirectoryEntry {
    pub kind: TerritoryKind,
    pub name: String,
    pub reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Case-sensitive equality after normalization.
    Exact,
    /// Both sides upper-cased before comparison.
    CaseInsensitive,
}

impl MatchPolicy {
    pub fn folds_case(&self) -> bool {
        matches!(self, Self::CaseInsensitive)
    }
}

impl std::fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::CaseInsensitive => write!(f, "case_insensitive"),
        }
    }
}

/// Same-as pairing between an entity and a directory reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquivalenceLink {
    pub code: String,
    pub reference: String,
    pub level: u32,
    pub kind: TerritoryKind,
    pub policy: MatchPolicy,
    /// The comparison key both sides agreed on.
    pub matched_name: String,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub dataset_version: String,
    pub engine_version: String,
}
