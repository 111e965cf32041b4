// CLI tests for `nutslink run | check | validate`.
// Run with: cargo test -p nutslink-cli --test cli_tests -- --nocapture
//
// Each test copies the engine fixtures into a temp dir, writes a config
// next to them, and runs the built binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use httpmock::prelude::*;
use tempfile::TempDir;

fn nutslink() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nutslink"))
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../recon/tests/fixtures")
}

/// Temp dir holding copies of every engine fixture.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    for entry in std::fs::read_dir(fixtures_dir()).unwrap() {
        let path = entry.unwrap().path();
        std::fs::copy(&path, dir.path().join(path.file_name().unwrap())).unwrap();
    }
    dir
}

fn write_config(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn exit_code(output: &Output) -> i32 {
    output.status.code().unwrap()
}

const BASE_2016: &str = r#"
name = "NUTS 2016 / COG"
dataset_version = "2016"

[classification]
file = "nuts2016.csv"

[geometry]
file = "nuts2016-wkt.tsv"
"#;

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_writes_configured_output() {
    let dir = workspace();
    let config = dir.path().join("nuts2016.recon.toml");

    let output = nutslink().arg("run").arg(&config).output().unwrap();
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr(&output));

    let written = std::fs::read_to_string(dir.path().join("nuts2016.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value["summary"]["links"], 9);
    assert_eq!(value["links"].as_array().unwrap().len(), 9);

    let ids = value["identifiers"].as_array().unwrap();
    assert_eq!(ids.len(), 13);
    assert_eq!(
        ids[0]["uri"],
        "http://ld.linked-open-statistics.org/data/conceptscheme/NutsRegion/FR"
    );
    assert_eq!(
        ids[0]["geometry_uri"],
        "http://ld.linked-open-statistics.org/data/conceptscheme/NutsRegion/FR/geometry"
    );
    // BE has no geometry, so no geometry URI.
    assert!(ids[12].get("geometry_uri").is_none());

    let err = stderr(&output);
    assert!(err.contains("13 entities, 9 relations, 11 geometries, 9 links"), "{err}");
    assert!(err.contains("10 discrepancies"), "{err}");
}

#[test]
fn run_json_to_stdout_is_deterministic() {
    let dir = workspace();
    let config = dir.path().join("nuts2016.recon.toml");
    let out = dir.path().join("explicit.json");

    let first = nutslink().arg("run").arg(&config).arg("--json").arg("--output").arg(&out).output().unwrap();
    let second = nutslink().arg("run").arg(&config).arg("--json").arg("--output").arg(&out).output().unwrap();

    assert_eq!(exit_code(&first), 0);
    assert!(!first.stdout.is_empty());
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(std::fs::read(&out).unwrap().len() + 1, first.stdout.len());
    // --output replaces output.json
    assert!(!dir.path().join("nuts2016.json").exists());
}

#[test]
fn run_strict_fails_on_discrepancies() {
    let dir = workspace();
    let config = dir.path().join("nuts2016.recon.toml");

    let output = nutslink().arg("run").arg(&config).arg("--strict").output().unwrap();
    assert_eq!(exit_code(&output), 63);
    assert!(stderr(&output).contains("10 discrepancies found (--strict)"));
}

#[test]
fn run_without_directory_skips_matching() {
    let dir = workspace();
    let config = write_config(&dir, "graph-only.recon.toml", BASE_2016);

    let output = nutslink().arg("run").arg(&config).arg("--json").output().unwrap();
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["summary"]["links"], 0);
    assert_eq!(value["summary"]["relations"], 9);
    assert_eq!(value["summary"]["matching_failed"], false);
}

#[test]
fn run_directory_failure_still_writes_output() {
    let dir = workspace();
    let body = format!("{BASE_2016}\n[directory]\nfile = \"missing-cache.csv\"\n\n[output]\njson = \"out.json\"\n");
    let config = write_config(&dir, "broken-dir.recon.toml", &body);

    let output = nutslink().arg("run").arg(&config).output().unwrap();
    assert_eq!(exit_code(&output), 62);

    let written = std::fs::read_to_string(dir.path().join("out.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value["summary"]["matching_failed"], true);
    assert_eq!(value["summary"]["geometries"], 11);
    assert!(value["report"]["directory_failure"]
        .as_str()
        .unwrap()
        .contains("missing-cache.csv"));

    let err = stderr(&output);
    assert!(err.contains("error: name directory lookup"), "{err}");
    assert!(err.contains("hint:"), "{err}");
}

#[test]
fn run_directory_timeout_still_writes_output() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/sparql");
        then.status(200)
            .delay(std::time::Duration::from_secs(3))
            .json_body(serde_json::json!({ "results": { "bindings": [] } }));
    });

    let dir = workspace();
    let body = format!(
        "{BASE_2016}\n[directory]\nendpoint = \"{}\"\ntimeout_secs = 1\nretries = 0\n\n[output]\njson = \"out.json\"\n",
        server.url("/sparql")
    );
    let config = write_config(&dir, "slow.recon.toml", &body);

    let output = nutslink().arg("run").arg(&config).output().unwrap();
    assert_eq!(exit_code(&output), 62, "stderr: {}", stderr(&output));

    let written = std::fs::read_to_string(dir.path().join("out.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value["summary"]["matching_failed"], true);
    assert_eq!(value["summary"]["relations"], 9);
    assert!(value["report"]["directory_failure"]
        .as_str()
        .unwrap()
        .contains("request timed out (1s) after 1 attempt(s)"));
}

fn territory_query(class: &str) -> String {
    format!(
        "PREFIX igeo:<http://rdf.insee.fr/def/geo#> \
         SELECT ?territory ?name WHERE {{ ?territory a igeo:{class} ; igeo:nom ?name }} \
         ORDER BY ?territory"
    )
}

#[test]
fn run_against_sparql_endpoint() {
    let server = MockServer::start();
    let regions = server.mock(|when, then| {
        when.method(GET)
            .path("/sparql")
            .query_param("query", territory_query("Region"));
        then.status(200).json_body(serde_json::json!({
            "head": { "vars": ["territory", "name"] },
            "results": { "bindings": [
                { "territory": { "type": "uri", "value": "http://id.insee.fr/geo/region/44" },
                  "name": { "type": "literal", "value": "Grand Est" } }
            ]}
        }));
    });
    let departements = server.mock(|when, then| {
        when.method(GET)
            .path("/sparql")
            .query_param("query", territory_query("Departement"));
        then.status(200).json_body(serde_json::json!({
            "head": { "vars": ["territory", "name"] },
            "results": { "bindings": [
                { "territory": { "type": "uri", "value": "http://id.insee.fr/geo/departement/67" },
                  "name": { "type": "literal", "value": "Bas-Rhin" } }
            ]}
        }));
    });

    let dir = workspace();
    let body = format!(
        "{BASE_2016}\n[directory]\nendpoint = \"{}\"\ntimeout_secs = 5\nretries = 0\n",
        server.url("/sparql")
    );
    let config = write_config(&dir, "sparql.recon.toml", &body);

    let output = nutslink().arg("run").arg(&config).arg("--json").output().unwrap();
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr(&output));
    regions.assert();
    departements.assert();

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let links = value["links"].as_array().unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0]["code"], "FRF");
    assert_eq!(links[1]["code"], "FRF11");
}

#[test]
fn run_malformed_source_exits_61() {
    let dir = workspace();
    let csv = std::fs::read_to_string(dir.path().join("nuts2016.csv")).unwrap();
    std::fs::write(dir.path().join("nuts2016.csv"), csv.replace("4,4,103,102", "4,four,103,102")).unwrap();
    let config = write_config(&dir, "bad.recon.toml", BASE_2016);

    let output = nutslink().arg("run").arg(&config).output().unwrap();
    assert_eq!(exit_code(&output), 61);
    assert!(stderr(&output).contains("line 5"), "{}", stderr(&output));
}

#[test]
fn run_missing_source_exits_61() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "nothing.recon.toml", BASE_2016);

    let output = nutslink().arg("run").arg(&config).output().unwrap();
    assert_eq!(exit_code(&output), 61);
    assert!(stderr(&output).contains("cannot read"));
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_lists_one_sided_codes() {
    let dir = workspace();
    let config = dir.path().join("nuts2016.recon.toml");

    let output = nutslink().arg("check").arg(&config).arg("--json").output().unwrap();
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["classification_codes"], 13);
    assert_eq!(value["geometry_codes"], 12);
    let only_c: Vec<&str> = value["only_in_classification"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["code"].as_str().unwrap())
        .collect();
    assert_eq!(only_c, vec!["BE", "FR102"]);
    assert_eq!(value["only_in_geometry"][0]["code"], "DE1");
    assert_eq!(value["only_in_geometry"][0]["name"], "Baden-Württemberg");

    let strict = nutslink().arg("check").arg(&config).arg("--strict").output().unwrap();
    assert_eq!(exit_code(&strict), 63);
    let listing = String::from_utf8_lossy(&strict.stdout);
    assert!(listing.contains("only in geometry: DE1\t1\tBaden-Württemberg"), "{listing}");
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_accepts_fixture_config() {
    let output = nutslink()
        .arg("validate")
        .arg(fixtures_dir().join("nuts2016.recon.toml"))
        .output()
        .unwrap();
    assert_eq!(exit_code(&output), 0);
    assert!(stderr(&output).contains("valid: NUTS 2016 config 'NUTS 2016 / COG'"));
}

#[test]
fn validate_rejects_bad_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "bad.recon.toml",
        &format!("{BASE_2016}\n[directory]\nendpoint = \"http://rdf.insee.fr/sparql\"\nfile = \"cache.csv\"\n"),
    );

    let output = nutslink().arg("validate").arg(&config).output().unwrap();
    assert_eq!(exit_code(&output), 60);
    assert!(stderr(&output).contains("not both"));
}

#[test]
fn missing_config_is_a_usage_error() {
    let output = nutslink().arg("validate").arg("/nonexistent/x.recon.toml").output().unwrap();
    assert_eq!(exit_code(&output), 2);

    let output = nutslink().arg("frobnicate").output().unwrap();
    assert_eq!(exit_code(&output), 2);
}
