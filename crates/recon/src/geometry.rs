use crate::code_table::CodeTable;
use crate::model::{Geometry, GeometryRow};
use crate::report::{ReconWarning, ReconciliationReport};

/// Attach geometry rows to the entities of `table` by public code.
///
/// Rows for unknown codes are reported and dropped. A later row for the same
/// code replaces the earlier one. Returns the number of entities holding a
/// geometry afterwards.
pub fn join_geometries(
    table: &mut CodeTable,
    rows: &[GeometryRow],
    report: &mut ReconciliationReport,
) -> usize {
    for row in rows {
        let Some(entity) = table.get_mut(&row.code) else {
            report.record(ReconWarning::UnmatchedGeometry {
                code: row.code.clone(),
                line: row.line,
            });
            continue;
        };

        if let Some(geometry_level) = row.level {
            if geometry_level != entity.level {
                report.record(ReconWarning::GeometryLevelMismatch {
                    code: row.code.clone(),
                    entity_level: entity.level,
                    geometry_level,
                    line: row.line,
                });
            }
        }

        let previous = entity.geometry.replace(Geometry {
            wkt: row.wkt.clone(),
            line: row.line,
        });
        if let Some(previous) = previous {
            report.record(ReconWarning::OverwrittenGeometry {
                code: row.code.clone(),
                previous_line: previous.line,
                line: row.line,
            });
        }
    }

    let attached = table.entities().iter().filter(|e| e.geometry.is_some()).count();
    log::info!("geometry: {attached} of {} entities have a geometry", table.len());
    attached
}

/// Codes of the entities that ended without geometry, in input order.
pub fn codes_without_geometry(table: &CodeTable) -> Vec<String> {
    table
        .entities()
        .iter()
        .filter(|e| e.geometry.is_none())
        .map(|e| e.code.clone())
        .collect()
}
