//! `nutslink run | check | validate`: config-driven NUTS reconciliation.

use std::path::{Path, PathBuf};

use serde::Serialize;

use nutslink_recon::checker::compare_code_sets;
use nutslink_recon::config::{OutputConfig, ReconConfig};
use nutslink_recon::load::{load_classification_rows, load_geometry_rows};
use nutslink_recon::{CodeTable, ReconError, ReconInput, ReconResult, ReconciliationReport};

use crate::directory::open_directory;
use crate::exit_codes::{
    recon_exit_code, EXIT_ERROR, EXIT_RECON_DIRECTORY, EXIT_RECON_DISCREPANCIES, EXIT_RECON_SOURCE,
    EXIT_USAGE,
};
use crate::CliError;

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn engine_err(e: ReconError) -> CliError {
    recon_err(recon_exit_code(&e), e.to_string())
}

// ============================================================================
// Loading
// ============================================================================

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        recon_err(EXIT_USAGE, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    ReconConfig::from_toml(&config_str).map_err(engine_err)
}

/// Directory that relative paths in the config are resolved against.
fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

fn read_source(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| recon_err(EXIT_RECON_SOURCE, format!("cannot read {}: {e}", path.display())))
}

fn load_input(config: &ReconConfig, base_dir: &Path) -> Result<ReconInput, CliError> {
    let classification_path = base_dir.join(&config.classification.file);
    let classification = load_classification_rows(&read_source(&classification_path)?, &config.classification)
        .map_err(engine_err)?;

    let geometry_path = base_dir.join(&config.geometry.file);
    let geometry =
        load_geometry_rows(&read_source(&geometry_path)?, &config.geometry).map_err(engine_err)?;

    log::info!(
        "loaded {} classification rows, {} geometry rows",
        classification.len(),
        geometry.len()
    );
    Ok(ReconInput { classification, geometry })
}

// ============================================================================
// run
// ============================================================================

/// Stable identifiers of one entity.
#[derive(Serialize)]
struct Identifier<'a> {
    code: &'a str,
    uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    geometry_uri: Option<String>,
}

/// JSON document written by `nutslink run`.
#[derive(Serialize)]
struct RunOutput<'a> {
    #[serde(flatten)]
    result: &'a ReconResult,
    identifiers: Vec<Identifier<'a>>,
}

fn identifiers<'a>(result: &'a ReconResult, output: &OutputConfig) -> Vec<Identifier<'a>> {
    result
        .table
        .entities()
        .iter()
        .map(|e| Identifier {
            code: &e.code,
            uri: output.entity_uri(&e.code),
            geometry_uri: e.geometry.as_ref().map(|_| output.geometry_uri(&e.code)),
        })
        .collect()
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    strict: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base = base_dir(&config_path);
    let input = load_input(&config, base)?;

    let directory = match config.directory {
        Some(ref dir) => Some(open_directory(dir, base)?),
        None => None,
    };

    let result = nutslink_recon::run(&config, &input, directory.as_deref()).map_err(engine_err)?;

    // Output
    let document = RunOutput {
        result: &result,
        identifiers: identifiers(&result, &config.output),
    };
    let json_str = serde_json::to_string_pretty(&document)
        .map_err(|e| recon_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    let output_path = output_file.or_else(|| config.output.json.as_ref().map(|p| base.join(p)));
    if let Some(ref path) = output_path {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_ERROR, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&result);

    if let Some(failure) = result.report.directory_failure() {
        return Err(recon_err(EXIT_RECON_DIRECTORY, failure)
            .with_hint("the graph and geometries were still written; rerun once the directory is reachable"));
    }

    if strict && result.summary.total_warnings > 0 {
        return Err(recon_err(
            EXIT_RECON_DISCREPANCIES,
            format!("{} discrepancies found (--strict)", result.summary.total_warnings),
        ));
    }

    Ok(())
}

/// Human summary to stderr.
fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "{} (NUTS {}): {} entities, {} relations, {} geometries, {} links",
        result.meta.config_name, result.meta.dataset_version, s.entities, s.relations, s.geometries, s.links,
    );
    if s.codes_without_geometry > 0 {
        eprintln!("{} entities without geometry", s.codes_without_geometry);
    }
    if s.total_warnings == 0 {
        eprintln!("no discrepancies");
    } else {
        let parts: Vec<String> = s
            .warning_counts
            .iter()
            .map(|(label, count)| format!("{count} {label}"))
            .collect();
        eprintln!("{} discrepancies: {}", s.total_warnings, parts.join(", "));
    }
    if s.matching_failed {
        eprintln!("matching skipped: name directory unavailable");
    }
}

// ============================================================================
// check
// ============================================================================

pub fn cmd_check(config_path: PathBuf, json_output: bool, strict: bool) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let input = load_input(&config, base_dir(&config_path))?;

    // Only the code sets are compared here; duplicates are already logged.
    let table = CodeTable::load(&input.classification, &config.classification, &mut ReconciliationReport::new())
        .map_err(engine_err)?;
    let comparison = compare_code_sets(&table, &input.geometry);

    if json_output {
        let json_str = serde_json::to_string_pretty(&comparison)
            .map_err(|e| recon_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        for c in &comparison.only_in_classification {
            println!(
                "only in classification: {}\t{}\t{}",
                c.code,
                c.level.map(|l| l.to_string()).unwrap_or_default(),
                c.name.as_deref().unwrap_or_default(),
            );
        }
        for c in &comparison.only_in_geometry {
            println!(
                "only in geometry: {}\t{}\t{}",
                c.code,
                c.level.map(|l| l.to_string()).unwrap_or_default(),
                c.name.as_deref().unwrap_or_default(),
            );
        }
    }

    eprintln!(
        "{} classification codes, {} geometry codes: {} only in classification, {} only in geometry",
        comparison.classification_codes,
        comparison.geometry_codes,
        comparison.only_in_classification.len(),
        comparison.only_in_geometry.len(),
    );

    if strict && !comparison.is_consistent() {
        return Err(recon_err(EXIT_RECON_DISCREPANCIES, "code sets differ (--strict)"));
    }
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let directory = match config.directory {
        Some(ref d) => match (&d.endpoint, &d.file) {
            (Some(endpoint), _) => format!("endpoint {endpoint}"),
            (None, Some(file)) => format!("cache {file}"),
            (None, None) => "none".to_string(),
        },
        None => "none".to_string(),
    };

    eprintln!(
        "valid: NUTS {} config '{}' ({} level policies, directory: {})",
        config.dataset_version,
        config.name,
        config.matching.levels.len(),
        directory,
    );
    Ok(())
}
