use std::collections::BTreeMap;

use serde::Serialize;

use crate::code_table::CodeTable;
use crate::model::GeometryRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeSummary {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Codes present on one side only, sorted by code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodeSetComparison {
    pub classification_codes: usize,
    pub geometry_codes: usize,
    pub only_in_classification: Vec<CodeSummary>,
    pub only_in_geometry: Vec<CodeSummary>,
}

impl CodeSetComparison {
    pub fn is_consistent(&self) -> bool {
        self.only_in_classification.is_empty() && self.only_in_geometry.is_empty()
    }
}

/// Compare the code sets of the classification and the geometry source
/// without joining anything.
pub fn compare_code_sets(table: &CodeTable, geometry: &[GeometryRow]) -> CodeSetComparison {
    let mut geometry_codes: BTreeMap<&str, &GeometryRow> = BTreeMap::new();
    for row in geometry {
        geometry_codes.insert(row.code.as_str(), row);
    }

    let mut classification_codes: BTreeMap<&str, CodeSummary> = BTreeMap::new();
    for e in table.entities() {
        classification_codes.insert(
            e.code.as_str(),
            CodeSummary {
                code: e.code.clone(),
                level: Some(e.level),
                name: Some(e.name.clone()),
            },
        );
    }

    let only_in_classification = classification_codes
        .iter()
        .filter(|(code, _)| !geometry_codes.contains_key(*code))
        .map(|(_, summary)| summary.clone())
        .collect();

    let only_in_geometry = geometry_codes
        .iter()
        .filter(|(code, _)| !classification_codes.contains_key(*code))
        .map(|(code, row)| CodeSummary {
            code: code.to_string(),
            level: row.level,
            name: row.name.clone(),
        })
        .collect();

    CodeSetComparison {
        classification_codes: classification_codes.len(),
        geometry_codes: geometry_codes.len(),
        only_in_classification,
        only_in_geometry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassificationColumns, ClassificationSource};
    use crate::model::ClassificationRow;
    use crate::report::ReconciliationReport;

    #[test]
    fn reports_both_sides_sorted() {
        let rows: Vec<ClassificationRow> = [("FRB", "2"), ("FR", "1"), ("FRA", "2")]
            .iter()
            .enumerate()
            .map(|(i, (code, level))| ClassificationRow {
                line: i as u64 + 2,
                internal_key: i.to_string(),
                code: code.to_string(),
                name: format!("{code} name"),
                level: level.to_string(),
                parent_key: String::new(),
            })
            .collect();
        let source = ClassificationSource {
            file: "nuts.csv".into(),
            delimiter: ",".into(),
            has_headers: true,
            level_base: 1,
            lang: "en".into(),
            columns: ClassificationColumns::default(),
        };
        let table = CodeTable::load(&rows, &source, &mut ReconciliationReport::new()).unwrap();
        let geometry = vec![
            GeometryRow {
                line: 2,
                code: "FR".into(),
                wkt: "POINT (2 46)".into(),
                level: Some(0),
                name: Some("France".into()),
            },
            GeometryRow {
                line: 3,
                code: "FRZ".into(),
                wkt: "POINT (0 0)".into(),
                level: Some(1),
                name: Some("Extra-Regio".into()),
            },
        ];

        let cmp = compare_code_sets(&table, &geometry);
        assert_eq!(cmp.classification_codes, 3);
        assert_eq!(cmp.geometry_codes, 2);
        let only_c: Vec<&str> = cmp.only_in_classification.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(only_c, vec!["FRA", "FRB"]);
        assert_eq!(cmp.only_in_classification[0].level, Some(1));
        assert_eq!(cmp.only_in_geometry.len(), 1);
        assert_eq!(cmp.only_in_geometry[0].name.as_deref(), Some("Extra-Regio"));
        assert!(!cmp.is_consistent());
    }
}
