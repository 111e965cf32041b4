use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{MatchPolicy, TerritoryKind};

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// A recoverable discrepancy between datasets. Recorded, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ReconWarning {
    /// Same public code on two classification rows; the later row wins.
    DuplicateCode {
        code: String,
        first_line: u64,
        line: u64,
    },
    /// Same internal key on two classification rows; the later row wins.
    DuplicateInternalKey {
        internal_key: String,
        previous_code: String,
        code: String,
        line: u64,
    },
    UnresolvedParent {
        code: String,
        parent_key: String,
    },
    /// Child level is not parent level + 1. The relation is kept.
    LevelInconsistency {
        parent: String,
        child: String,
        parent_level: u32,
        child_level: u32,
    },
    /// Adding the relation would close a cycle. The relation is skipped.
    HierarchyCycle {
        code: String,
        parent: String,
    },
    /// Geometry code absent from the classification. The geometry is dropped.
    UnmatchedGeometry {
        code: String,
        line: u64,
    },
    /// A second geometry replaced the first one for the same code.
    OverwrittenGeometry {
        code: String,
        previous_line: u64,
        line: u64,
    },
    GeometryLevelMismatch {
        code: String,
        entity_level: u32,
        geometry_level: u32,
        line: u64,
    },
    UnmatchedEntity {
        code: String,
        name: String,
        level: u32,
        kind: TerritoryKind,
        policy: MatchPolicy,
        key: String,
    },
    UnmatchedDirectoryEntry {
        kind: TerritoryKind,
        name: String,
        normalized: String,
        reference: String,
        applied_rules: Vec<String>,
    },
}

impl ReconWarning {
    /// Stable label used for per-kind counts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DuplicateCode { .. } => "duplicate_code",
            Self::DuplicateInternalKey { .. } => "duplicate_internal_key",
            Self::UnresolvedParent { .. } => "unresolved_parent",
            Self::LevelInconsistency { .. } => "level_inconsistency",
            Self::HierarchyCycle { .. } => "hierarchy_cycle",
            Self::UnmatchedGeometry { .. } => "unmatched_geometry",
            Self::OverwrittenGeometry { .. } => "overwritten_geometry",
            Self::GeometryLevelMismatch { .. } => "geometry_level_mismatch",
            Self::UnmatchedEntity { .. } => "unmatched_entity",
            Self::UnmatchedDirectoryEntry { .. } => "unmatched_directory_entry",
        }
    }
}

impl std::fmt::Display for ReconWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateCode { code, first_line, line } => {
                write!(f, "code {code} on line {line} replaces the row from line {first_line}")
            }
            Self::DuplicateInternalKey { internal_key, previous_code, code, line } => write!(
                f,
                "internal key {internal_key} on line {line} now resolves to {code} instead of {previous_code}"
            ),
            Self::UnresolvedParent { code, parent_key } => {
                write!(f, "parent key {parent_key} of {code} does not resolve to a known code")
            }
            Self::LevelInconsistency { parent, child, parent_level, child_level } => write!(
                f,
                "{child} (level {child_level}) is a child of {parent} (level {parent_level})"
            ),
            Self::HierarchyCycle { code, parent } => {
                write!(f, "relation {parent} -> {code} would create a cycle")
            }
            Self::UnmatchedGeometry { code, line } => {
                write!(f, "geometry {code} (line {line}) not found in classification")
            }
            Self::OverwrittenGeometry { code, previous_line, line } => {
                write!(f, "geometry for {code} on line {line} overwrites line {previous_line}")
            }
            Self::GeometryLevelMismatch { code, entity_level, geometry_level, line } => write!(
                f,
                "geometry {code} (line {line}) has level {geometry_level}, classification says {entity_level}"
            ),
            Self::UnmatchedEntity { code, name, level, kind, .. } => {
                write!(f, "no matching {kind} found for level {level} region {code} ({name})")
            }
            Self::UnmatchedDirectoryEntry { kind, name, reference, .. } => {
                write!(f, "{kind} {name} <{reference}> was not matched by any region")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub entities: usize,
    pub relations: usize,
    pub geometries: usize,
    pub links: usize,
}

/// Every discrepancy of one run, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    warnings: Vec<ReconWarning>,
    codes_without_geometry: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    directory_failure: Option<String>,
    counts: ReportCounts,
}

impl ReconciliationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, warning: ReconWarning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub(crate) fn set_codes_without_geometry(&mut self, codes: Vec<String>) {
        self.codes_without_geometry = codes;
    }

    pub(crate) fn set_directory_failure(&mut self, message: String) {
        self.directory_failure = Some(message);
    }

    pub(crate) fn counts_mut(&mut self) -> &mut ReportCounts {
        &mut self.counts
    }

    pub fn warnings(&self) -> &[ReconWarning] {
        &self.warnings
    }

    pub fn counts(&self) -> &ReportCounts {
        &self.counts
    }

    pub fn directory_failure(&self) -> Option<&str> {
        self.directory_failure.as_deref()
    }

    /// Entities that exist in the classification but got no geometry.
    pub fn codes_without_geometry(&self) -> &[String] {
        &self.codes_without_geometry
    }

    /// `(code, parent_key)` for every parent reference that did not resolve.
    pub fn unresolved_parents(&self) -> Vec<(&str, &str)> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                ReconWarning::UnresolvedParent { code, parent_key } => {
                    Some((code.as_str(), parent_key.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn unmatched_geometries(&self) -> Vec<&str> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                ReconWarning::UnmatchedGeometry { code, .. } => Some(code.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn overwritten_geometries(&self) -> Vec<&str> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                ReconWarning::OverwrittenGeometry { code, .. } => Some(code.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Codes of the entities at `level` that found no directory counterpart.
    pub fn unmatched_entities(&self, level: u32) -> Vec<&str> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                ReconWarning::UnmatchedEntity { code, level: l, .. } if *l == level => {
                    Some(code.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// Original names of the directory entries of `kind` left unmatched.
    pub fn unmatched_directory_entries(&self, kind: TerritoryKind) -> Vec<&str> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                ReconWarning::UnmatchedDirectoryEntry { kind: k, name, .. } if *k == kind => {
                    Some(name.as_str())
                }
                _ => None,
            })
            .collect()
    }

    pub fn summary(&self) -> ReconSummary {
        let mut warning_counts: BTreeMap<String, usize> = BTreeMap::new();
        for w in &self.warnings {
            *warning_counts.entry(w.label().to_string()).or_insert(0) += 1;
        }

        ReconSummary {
            entities: self.counts.entities,
            relations: self.counts.relations,
            geometries: self.counts.geometries,
            links: self.counts.links,
            codes_without_geometry: self.codes_without_geometry.len(),
            total_warnings: self.warnings.len(),
            warning_counts,
            matching_failed: self.directory_failure.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub entities: usize,
    pub relations: usize,
    pub geometries: usize,
    pub links: usize,
    pub codes_without_geometry: usize,
    pub total_warnings: usize,
    pub warning_counts: BTreeMap<String, usize>,
    pub matching_failed: bool,
}

impl ReconSummary {
    /// No warning at all. On real data this deserves a second look.
    pub fn is_clean(&self) -> bool {
        self.total_warnings == 0 && !self.matching_failed
    }
}
