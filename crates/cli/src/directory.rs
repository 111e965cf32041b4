//! Name directory adapters for `nutslink run`.
//!
//! - `SparqlDirectory` queries a SPARQL endpoint, one request per territory
//!   kind, with timeout and retry / backoff.
//! - `CsvDirectory` reads a local cache file with `kind,name,reference`
//!   columns.
//!
//! Both report failures as `ReconError::DirectorySource`, which the engine
//! confines to the matching stage.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::Deserialize;

use nutslink_recon::config::DirectoryConfig;
use nutslink_recon::model::{NameDirectoryEntry, TerritoryKind};
use nutslink_recon::{NameDirectoryService, ReconError};

use crate::exit_codes;
use crate::CliError;

// ── Constants ───────────────────────────────────────────────────────

const USER_AGENT: &str = concat!("nutslink/", env!("CARGO_PKG_VERSION"));
const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";
const GEO_NAMESPACE: &str = "http://rdf.insee.fr/def/geo#";

/// Build the directory described by the config. Relative cache paths are
/// resolved against `base_dir`.
pub fn open_directory(
    config: &DirectoryConfig,
    base_dir: &Path,
) -> Result<Box<dyn NameDirectoryService>, CliError> {
    match (&config.endpoint, &config.file) {
        (Some(endpoint), _) => {
            let directory = SparqlDirectory::new(
                endpoint,
                Duration::from_secs(config.timeout_secs),
                config.retries,
            )
            .map_err(|e| CliError {
                code: exit_codes::EXIT_ERROR,
                message: format!("cannot build HTTP client: {e}"),
                hint: None,
            })?;
            Ok(Box::new(directory))
        }
        (None, Some(file)) => Ok(Box::new(CsvDirectory::new(base_dir.join(file)))),
        (None, None) => Err(CliError {
            code: exit_codes::EXIT_RECON_INVALID_CONFIG,
            message: "directory: one of 'endpoint' or 'file' is required".into(),
            hint: None,
        }),
    }
}

// ── SPARQL ──────────────────────────────────────────────────────────

/// Territories by name from a SPARQL endpoint speaking the INSEE geographic
/// vocabulary (`igeo:nom` on instances of `igeo:Region`, `igeo:Departement`, ...).
pub struct SparqlDirectory {
    http: reqwest::blocking::Client,
    endpoint: String,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
}

#[derive(Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Deserialize)]
struct SparqlResults {
    bindings: Vec<SparqlBinding>,
}

#[derive(Deserialize)]
struct SparqlBinding {
    territory: SparqlTerm,
    name: SparqlTerm,
}

#[derive(Deserialize)]
struct SparqlTerm {
    value: String,
}

impl SparqlDirectory {
    pub fn new(endpoint: &str, timeout: Duration, retries: u32) -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            timeout,
            retries,
            backoff: Duration::from_secs(1),
        })
    }

    /// Initial delay between attempts; doubles after each retry.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Query listing every territory of `kind` with its name, ordered by
    /// reference so repeated runs see the same directory order.
    pub fn query(kind: TerritoryKind) -> String {
        format!(
            "PREFIX igeo:<{GEO_NAMESPACE}> \
             SELECT ?territory ?name WHERE {{ ?territory a igeo:{} ; igeo:nom ?name }} \
             ORDER BY ?territory",
            kind.class_name()
        )
    }

    /// GET with retry + exponential backoff. Network errors, 429 and 5xx are
    /// retried; any other 4xx fails immediately.
    fn fetch(&self, kind: TerritoryKind) -> Result<String, String> {
        let query = Self::query(kind);
        let mut backoff = self.backoff;

        for attempt in 0..=self.retries {
            let result = self
                .http
                .get(&self.endpoint)
                .header(reqwest::header::ACCEPT, SPARQL_RESULTS_JSON)
                .query(&[("query", query.as_str()), ("format", SPARQL_RESULTS_JSON)])
                .send();

            let reason = match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if resp.status().is_success() {
                        return resp
                            .text()
                            .map_err(|e| format!("failed to read response body: {e}"));
                    }
                    if status != 429 && status < 500 {
                        let body = resp.text().unwrap_or_default();
                        return Err(format!(
                            "endpoint rejected the query ({status}): {}",
                            excerpt(&body)
                        ));
                    }
                    format!("HTTP {status}")
                }
                Err(e) if e.is_timeout() => format!("request timed out ({:?})", self.timeout),
                // The URL carries the whole encoded query.
                Err(e) => e.without_url().to_string(),
            };

            if attempt == self.retries {
                return Err(format!(
                    "{reason} after {} attempt(s)",
                    self.retries + 1
                ));
            }

            log::warn!(
                "directory: retry {}/{} for {kind} in {}ms ({reason})",
                attempt + 1,
                self.retries,
                backoff.as_millis()
            );
            thread::sleep(backoff);
            backoff *= 2;
        }

        Err("no attempt made".into())
    }
}

/// Parse a SPARQL JSON result set into directory entries, in result order.
pub fn parse_sparql_results(kind: TerritoryKind, body: &str) -> Result<Vec<NameDirectoryEntry>, String> {
    let trimmed = body.trim_start_matches('\u{feff}');
    let response: SparqlResponse = serde_json::from_str(trimmed).map_err(|e| {
        format!("cannot parse SPARQL results: {e} (body: {})", excerpt(trimmed))
    })?;

    Ok(response
        .results
        .bindings
        .into_iter()
        .map(|b| NameDirectoryEntry {
            kind,
            name: b.name.value,
            reference: b.territory.value,
        })
        .collect())
}

/// First 200 characters of a response body, for error messages.
fn excerpt(body: &str) -> String {
    body.chars().take(200).collect()
}

impl NameDirectoryService for SparqlDirectory {
    fn lookup(&self, kind: TerritoryKind) -> Result<Vec<NameDirectoryEntry>, ReconError> {
        log::info!("directory: querying {} for {kind}", self.endpoint);
        let entries = self
            .fetch(kind)
            .and_then(|body| parse_sparql_results(kind, &body))
            .map_err(|message| ReconError::DirectorySource { kind, message })?;
        log::debug!("directory: {} {kind} entries from endpoint", entries.len());
        Ok(entries)
    }
}

// ── CSV cache ───────────────────────────────────────────────────────

/// Directory cached in a local CSV file (`kind,name,reference`). The file
/// is read on every lookup so that a missing cache only fails matching.
pub struct CsvDirectory {
    path: PathBuf,
}

#[derive(Deserialize)]
struct CsvEntry {
    kind: String,
    name: String,
    reference: String,
}

impl CsvDirectory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

/// Entries of `kind` from cache file contents, in file order.
pub fn parse_csv_directory(kind: TerritoryKind, data: &str) -> Result<Vec<NameDirectoryEntry>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let mut entries = Vec::new();
    for result in reader.deserialize::<CsvEntry>() {
        let row = result.map_err(|e| e.to_string())?;
        let row_kind = TerritoryKind::parse(&row.kind)
            .ok_or_else(|| format!("unknown territory kind '{}'", row.kind))?;
        if row_kind == kind {
            entries.push(NameDirectoryEntry {
                kind,
                name: row.name,
                reference: row.reference,
            });
        }
    }
    Ok(entries)
}

impl NameDirectoryService for CsvDirectory {
    fn lookup(&self, kind: TerritoryKind) -> Result<Vec<NameDirectoryEntry>, ReconError> {
        let data = std::fs::read_to_string(&self.path).map_err(|e| ReconError::DirectorySource {
            kind,
            message: format!("cannot read {}: {e}", self.path.display()),
        })?;
        parse_csv_directory(kind, &data).map_err(|e| ReconError::DirectorySource {
            kind,
            message: format!("{}: {e}", self.path.display()),
        })
    }
}
