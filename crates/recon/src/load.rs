//! CSV loaders for the two tabular sources.
//!
//! Column mapping, delimiter, header row and quoting come from the config;
//! the loaders only produce typed rows. Validation of classification fields
//! happens later in [`crate::code_table::CodeTable::load`].

use csv::StringRecord;

use crate::config::{delimiter_byte, ClassificationSource, GeometrySource};
use crate::error::ReconError;
use crate::model::{ClassificationRow, GeometryRow, SourceKind};

/// Load classification rows, in file order.
pub fn load_classification_rows(
    csv_data: &str,
    source: &ClassificationSource,
) -> Result<Vec<ClassificationRow>, ReconError> {
    let dataset = SourceKind::Classification;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(source.has_headers)
        .delimiter(delimiter_byte(&source.delimiter)?)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers = read_headers(&mut reader, dataset, source.has_headers)?;
    let col = &source.columns;
    let internal_key_idx = column_index(&headers, &col.internal_key, dataset)?;
    let code_idx = column_index(&headers, &col.code, dataset)?;
    let name_idx = column_index(&headers, &col.name, dataset)?;
    let level_idx = column_index(&headers, &col.level, dataset)?;
    let parent_idx = column_index(&headers, &col.parent, dataset)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| csv_error(dataset, e))?;
        let line = line_of(&record);
        rows.push(ClassificationRow {
            line,
            internal_key: field(&record, internal_key_idx),
            code: field(&record, code_idx),
            name: field(&record, name_idx),
            level: field(&record, level_idx),
            parent_key: field(&record, parent_idx),
        });
    }

    log::debug!("classification source: {} rows", rows.len());
    Ok(rows)
}

/// Load geometry rows, in file order. A blank code or WKT, or a level that
/// is not an integer, aborts the load.
pub fn load_geometry_rows(
    csv_data: &str,
    source: &GeometrySource,
) -> Result<Vec<GeometryRow>, ReconError> {
    let dataset = SourceKind::Geometry;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(source.has_headers)
        .delimiter(delimiter_byte(&source.delimiter)?)
        .quoting(source.quoting)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers = read_headers(&mut reader, dataset, source.has_headers)?;
    let col = &source.columns;
    let code_idx = column_index(&headers, &col.code, dataset)?;
    let wkt_idx = column_index(&headers, &col.wkt, dataset)?;
    let level_idx = match col.level {
        Some(ref name) => Some(column_index(&headers, name, dataset)?),
        None => None,
    };
    let name_idx = match col.name {
        Some(ref name) => Some(column_index(&headers, name, dataset)?),
        None => None,
    };

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| csv_error(dataset, e))?;
        let line = line_of(&record);

        let code = field(&record, code_idx);
        if code.is_empty() {
            return Err(ReconError::malformed(dataset, line, &col.code, "blank code"));
        }
        let wkt = field(&record, wkt_idx);
        if wkt.is_empty() {
            return Err(ReconError::malformed(dataset, line, &col.wkt, "blank geometry"));
        }

        let level = match level_idx {
            Some(idx) => {
                let raw = field(&record, idx);
                let parsed = raw.parse::<u32>().map_err(|_| {
                    ReconError::malformed(
                        dataset,
                        line,
                        col.level.as_deref().unwrap_or_default(),
                        format!("cannot parse level '{raw}'"),
                    )
                })?;
                Some(parsed)
            }
            None => None,
        };

        rows.push(GeometryRow {
            line,
            code,
            wkt,
            level,
            name: name_idx.map(|idx| field(&record, idx)),
        });
    }

    log::debug!("geometry source: {} rows", rows.len());
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_headers<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
    dataset: SourceKind,
    has_headers: bool,
) -> Result<Vec<String>, ReconError> {
    if !has_headers {
        return Ok(Vec::new());
    }
    let headers = reader.headers().map_err(|e| csv_error(dataset, e))?;
    Ok(headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect())
}

/// Header name lookup, or a 0-based index when the source has no header row.
fn column_index(headers: &[String], column: &str, dataset: SourceKind) -> Result<usize, ReconError> {
    if headers.is_empty() {
        return column.parse::<usize>().map_err(|_| ReconError::MissingColumn {
            dataset,
            column: column.into(),
        });
    }
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| ReconError::MissingColumn {
            dataset,
            column: column.into(),
        })
}

fn field(record: &StringRecord, idx: usize) -> String {
    record.get(idx).unwrap_or("").trim().to_string()
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn csv_error(dataset: SourceKind, e: csv::Error) -> ReconError {
    ReconError::Csv {
        dataset,
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassificationColumns, GeometryColumns};

    fn classification_source() -> ClassificationSource {
        ClassificationSource {
            file: "nuts.csv".into(),
            delimiter: ",".into(),
            has_headers: true,
            level_base: 1,
            lang: "en".into(),
            columns: ClassificationColumns::default(),
        }
    }

    fn geometry_source() -> GeometrySource {
        GeometrySource {
            file: "wkt.csv".into(),
            delimiter: "\t".into(),
            has_headers: true,
            quoting: false,
            columns: GeometryColumns::default(),
        }
    }

    #[test]
    fn classification_rows_follow_column_mapping() {
        let data = "\
Order,Level,Code,Parent,NUTS-Code,Description
1,1,1,,FR,FRANCE
2,2,2,1,FR1,ÎLE DE FRANCE
";
        let rows = load_classification_rows(data, &classification_source()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code, "FR");
        assert_eq!(rows[0].parent_key, "");
        assert_eq!(rows[1].internal_key, "2");
        assert_eq!(rows[1].parent_key, "1");
        assert_eq!(rows[1].name, "ÎLE DE FRANCE");
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn classification_missing_column() {
        let data = "Level,Code,NUTS-Code,Description\n1,1,FR,FRANCE\n";
        let err = load_classification_rows(data, &classification_source()).unwrap_err();
        assert!(err.to_string().contains("'Parent'"));
    }

    #[test]
    fn classification_by_index_without_headers() {
        let mut source = classification_source();
        source.has_headers = false;
        source.delimiter = ";".into();
        source.columns = ClassificationColumns {
            internal_key: "0".into(),
            code: "1".into(),
            name: "2".into(),
            level: "3".into(),
            parent: "4".into(),
        };
        let rows = load_classification_rows("7;FR;FRANCE;1;\n", &source).unwrap();
        assert_eq!(rows[0].internal_key, "7");
        assert_eq!(rows[0].code, "FR");
        assert_eq!(rows[0].level, "1");
        assert_eq!(rows[0].line, 1);
    }

    #[test]
    fn geometry_wkt_keeps_commas_and_quotes() {
        let data = "nuts_id\tstat_level\tname_latn\twkt\n\
FR1\t1\tÎle de France\tPOLYGON ((2.1 48.8, 2.6 48.8, 2.3 49.1, 2.1 48.8))\n\
FR10\t2\t\"Paris\" area\tPOLYGON ((2.2 48.8, 2.4 48.8, 2.3 48.9, 2.2 48.8))\n";
        let rows = load_geometry_rows(data, &geometry_source()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].level, Some(1));
        assert!(rows[0].wkt.starts_with("POLYGON ((2.1 48.8, 2.6"));
        assert_eq!(rows[1].name.as_deref(), Some("\"Paris\" area"));
    }

    #[test]
    fn geometry_bad_level_is_malformed() {
        let data = "nuts_id\tstat_level\tname_latn\twkt\nFR1\tone\tÎle de France\tPOLYGON EMPTY\n";
        let err = load_geometry_rows(data, &geometry_source()).unwrap_err();
        match err {
            ReconError::MalformedRecord { dataset, line, field, .. } => {
                assert_eq!(dataset, SourceKind::Geometry);
                assert_eq!(line, 2);
                assert_eq!(field, "stat_level");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn geometry_optional_columns() {
        let mut source = geometry_source();
        source.columns.level = None;
        source.columns.name = None;
        let rows = load_geometry_rows("nuts_id\twkt\nFR1\tPOINT (1 2)\n", &source).unwrap();
        assert_eq!(rows[0].level, None);
        assert_eq!(rows[0].name, None);
    }
}
