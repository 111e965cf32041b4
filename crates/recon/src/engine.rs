use serde::Serialize;

use crate::code_table::CodeTable;
use crate::config::ReconConfig;
use crate::directory::NameDirectoryService;
use crate::error::ReconError;
use crate::geometry::{codes_without_geometry, join_geometries};
use crate::hierarchy::HierarchyGraph;
use crate::matcher::{DirectoryPools, NameMatcher};
use crate::model::{EquivalenceLink, ReconInput, ReconMeta};
use crate::normalize::RuleSet;
use crate::report::{ReconSummary, ReconciliationReport};

/// Everything one run produces. Identical inputs give an identical result.
#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    #[serde(flatten)]
    pub table: CodeTable,
    #[serde(flatten)]
    pub hierarchy: HierarchyGraph,
    pub links: Vec<EquivalenceLink>,
    pub report: ReconciliationReport,
}

/// Hierarchy and geometry stages, which never need the directory.
#[derive(Debug, Clone)]
pub struct GraphStage {
    pub table: CodeTable,
    pub hierarchy: HierarchyGraph,
    pub report: ReconciliationReport,
}

/// Build the code table, resolve the hierarchy and attach geometries.
pub fn build_graph(config: &ReconConfig, input: &ReconInput) -> Result<GraphStage, ReconError> {
    let mut report = ReconciliationReport::new();

    let mut table = CodeTable::load(&input.classification, &config.classification, &mut report)?;
    let hierarchy = HierarchyGraph::build(&table, &mut report);
    let geometries = join_geometries(&mut table, &input.geometry, &mut report);
    report.set_codes_without_geometry(codes_without_geometry(&table));

    let counts = report.counts_mut();
    counts.entities = table.len();
    counts.relations = hierarchy.len();
    counts.geometries = geometries;

    Ok(GraphStage {
        table,
        hierarchy,
        report,
    })
}

/// Query the directory once per territory kind the matching policies need.
pub fn fetch_directory(
    config: &ReconConfig,
    directory: &dyn NameDirectoryService,
) -> Result<DirectoryPools, ReconError> {
    let mut pools = DirectoryPools::new();
    for kind in config.matching.territories() {
        let entries = directory.lookup(kind).map_err(|e| match e {
            ReconError::DirectorySource { .. } => e,
            other => ReconError::DirectorySource {
                kind,
                message: other.to_string(),
            },
        })?;
        log::info!("directory: {} entries of kind {kind}", entries.len());
        pools.insert(kind, entries);
    }
    Ok(pools)
}

/// Run the full reconciliation.
///
/// Structural errors in the sources abort the run. A directory failure only
/// aborts matching: the result keeps the graph and records the failure in
/// the report. Without a directory, matching is skipped.
pub fn run(
    config: &ReconConfig,
    input: &ReconInput,
    directory: Option<&dyn NameDirectoryService>,
) -> Result<ReconResult, ReconError> {
    let GraphStage {
        table,
        hierarchy,
        mut report,
    } = build_graph(config, input)?;

    let mut links = Vec::new();
    match directory {
        Some(directory) => match fetch_directory(config, directory) {
            Ok(pools) => {
                let rules = RuleSet::from_config(config.dataset_version, &config.matching);
                let output = NameMatcher::new(&rules, &config.matching)
                    .match_entities(table.entities(), &pools);
                for warning in output.warnings {
                    report.record(warning);
                }
                links = output.links;
            }
            Err(e) => {
                log::error!("{e}; matching skipped");
                report.set_directory_failure(e.to_string());
            }
        },
        None => log::info!("no name directory configured; matching skipped"),
    }
    report.counts_mut().links = links.len();

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            dataset_version: config.dataset_version.to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        },
        summary: report.summary(),
        table,
        hierarchy,
        links,
        report,
    })
}
