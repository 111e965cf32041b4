use std::collections::HashMap;

use serde::Serialize;

use crate::config::ClassificationSource;
use crate::error::ReconError;
use crate::model::{ClassificationRow, RegionEntity, SourceKind};
use crate::report::{ReconWarning, ReconciliationReport};

/// Classification entities indexed by public code and by internal key.
///
/// Entities keep their first-seen input position. A duplicate public code
/// replaces the earlier entity in place (last write wins); every internal
/// key ever seen keeps resolving to its code.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CodeTable {
    entities: Vec<RegionEntity>,
    #[serde(skip)]
    by_code: HashMap<String, usize>,
    #[serde(skip)]
    by_internal_key: HashMap<String, String>,
}

impl CodeTable {
    /// Build the table from classification rows. Fails on the first blank
    /// required field or unparseable level.
    pub fn load(
        rows: &[ClassificationRow],
        source: &ClassificationSource,
        report: &mut ReconciliationReport,
    ) -> Result<Self, ReconError> {
        let mut table = CodeTable::default();

        for row in rows {
            let entity = parse_row(row, source)?;

            if let Some(previous) = table.by_internal_key.get(&entity.internal_key) {
                if *previous != entity.code {
                    report.record(ReconWarning::DuplicateInternalKey {
                        internal_key: entity.internal_key.clone(),
                        previous_code: previous.clone(),
                        code: entity.code.clone(),
                        line: entity.line,
                    });
                }
            }
            table
                .by_internal_key
                .insert(entity.internal_key.clone(), entity.code.clone());

            match table.by_code.get(&entity.code) {
                Some(&idx) => {
                    report.record(ReconWarning::DuplicateCode {
                        code: entity.code.clone(),
                        first_line: table.entities[idx].line,
                        line: entity.line,
                    });
                    table.entities[idx] = entity;
                }
                None => {
                    table.by_code.insert(entity.code.clone(), table.entities.len());
                    table.entities.push(entity);
                }
            }
        }

        log::info!("code table: {} entities from {} rows", table.len(), rows.len());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in first-seen input order.
    pub fn entities(&self) -> &[RegionEntity] {
        &self.entities
    }

    pub fn get(&self, code: &str) -> Option<&RegionEntity> {
        self.by_code.get(code).map(|&idx| &self.entities[idx])
    }

    pub(crate) fn get_mut(&mut self, code: &str) -> Option<&mut RegionEntity> {
        match self.by_code.get(code) {
            Some(&idx) => Some(&mut self.entities[idx]),
            None => None,
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    /// Public code behind an internal key.
    pub fn resolve_internal_key(&self, key: &str) -> Option<&str> {
        self.by_internal_key.get(key).map(String::as_str)
    }
}

fn parse_row(row: &ClassificationRow, source: &ClassificationSource) -> Result<RegionEntity, ReconError> {
    let dataset = SourceKind::Classification;
    let col = &source.columns;

    for (value, column) in [
        (&row.internal_key, &col.internal_key),
        (&row.code, &col.code),
        (&row.name, &col.name),
    ] {
        if value.trim().is_empty() {
            return Err(ReconError::malformed(dataset, row.line, column, "required field is blank"));
        }
    }

    let raw_level = row.level.trim().parse::<u32>().map_err(|_| {
        ReconError::malformed(dataset, row.line, &col.level, format!("cannot parse level '{}'", row.level))
    })?;
    let level = raw_level.checked_sub(source.level_base).ok_or_else(|| {
        ReconError::malformed(
            dataset,
            row.line,
            &col.level,
            format!("level {raw_level} is below the level base {}", source.level_base),
        )
    })?;

    let parent_key = row.parent_key.trim();

    Ok(RegionEntity {
        code: row.code.trim().to_string(),
        name: row.name.trim().to_string(),
        lang: source.lang.clone(),
        level,
        internal_key: row.internal_key.trim().to_string(),
        parent_key: (!parent_key.is_empty()).then(|| parent_key.to_string()),
        line: row.line,
        geometry: None,
    })
}
