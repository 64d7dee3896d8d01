// ip-geolocate/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Command isolated from the user's config files and IPGEO_* variables.
fn geolocate(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ip-geolocate").unwrap();
    cmd.current_dir(workdir)
        .env("HOME", workdir)
        .env("XDG_CONFIG_HOME", workdir.join(".config"))
        .env_remove("RUST_LOG");
    for var in [
        "IPGEO_API_KEY",
        "IPGEO_CONCURRENCY",
        "IPGEO_TIMEOUT",
        "IPGEO_BASE_URL",
        "IPGEO_OUTPUT",
        "IPGEO_ORDER",
        "IPGEO_CONFIG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Helper to create a CSV source in a fresh directory
fn csv_source(content: &str) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(dir.path().join("servers.csv"), content).expect("Failed to write source");
    dir
}

#[test]
fn test_help_lists_options() {
    let dir = tempfile::tempdir().unwrap();
    geolocate(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--column"))
        .stdout(predicate::str::contains("--start-row"))
        .stdout(predicate::str::contains("--api-key"))
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--input-order"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_dry_run_prints_addresses() {
    let dir = csv_source("Host,IP\ndns-a,8.8.8.8\ndns-b,\ndns-c, 1.1.1.1 \n");

    geolocate(dir.path())
        .args(["servers.csv", "--column", "B", "--start-row", "2", "--dry-run"])
        .assert()
        .success()
        .stdout("8.8.8.8\n1.1.1.1\n")
        .stderr(predicate::str::contains("2 addresses found"));

    assert!(!dir.path().join("Output").exists());
}

#[test]
fn test_dry_run_reads_config_file_defaults() {
    let dir = csv_source("skip,10.0.0.1\nkeep,10.0.0.2\n");
    fs::write(
        dir.path().join("ip-geolocate.toml"),
        "[defaults]\ncolumn = \"B\"\nstart_row = 2\n",
    )
    .unwrap();

    geolocate(dir.path())
        .args(["servers.csv", "--dry-run"])
        .assert()
        .success()
        .stdout("10.0.0.2\n");
}

#[test]
fn test_unsupported_input_fails_in_extract_stage() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("servers.txt"), "8.8.8.8\n").unwrap();

    geolocate(dir.path())
        .args(["servers.txt", "--api-key", "test"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("extract stage failed"));

    assert!(!dir.path().join("Output").exists());
}

#[test]
fn test_invalid_column_rejected() {
    let dir = csv_source("8.8.8.8\n");

    geolocate(dir.path())
        .args(["servers.csv", "--column", "AB", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_invalid_concurrency_rejected() {
    let dir = csv_source("8.8.8.8\n");

    geolocate(dir.path())
        .args(["servers.csv", "--concurrency", "0", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Concurrency must be at least 1"));
}

#[test]
fn test_missing_api_key_is_error() {
    let dir = csv_source("8.8.8.8\n");

    geolocate(dir.path())
        .arg("servers.csv")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key provided"));
}

#[test]
fn test_unreachable_service_writes_error_rows() {
    let dir = csv_source("8.8.8.8\n1.1.1.1\n");

    geolocate(dir.path())
        .args([
            "servers.csv",
            "--api-key",
            "test",
            // Nothing listens on port 1
            "--base-url",
            "http://127.0.0.1:1",
            "--input-order",
            "--output",
            "Output/geo.csv",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("2 failed"));

    let written = fs::read_to_string(dir.path().join("Output").join("geo.csv")).unwrap();
    assert_eq!(
        written,
        "IP Address,ISP,City,Region,Postal Code\n\
         8.8.8.8,Error,Error,Error,Error\n\
         1.1.1.1,Error,Error,Error,Error\n"
    );
}

#[test]
fn test_api_key_from_environment() {
    let dir = csv_source("ip\n");

    geolocate(dir.path())
        .args(["servers.csv", "--start-row", "2", "--output", "out.xlsx"])
        .env("IPGEO_API_KEY", "from-env")
        .assert()
        .success()
        .stderr(predicate::str::contains("0 records"));

    assert!(dir.path().join("out.xlsx").exists());
}
