//! Runs the cost-report binary end to end with generated data instead of AWS.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cost_report(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cost-report").unwrap();
    cmd.current_dir(dir.path())
        .env("COST_REPORT_TEST_MODE", "1")
        .env_remove("COST_REPORT_DATA_DIR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_report_writes_snapshots_and_pdf() {
    let dir = TempDir::new().unwrap();

    cost_report(&dir)
        .args(["report", "--lookback-days", "30"])
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Skipping aws-key-management-service",
        ))
        .stderr(predicate::str::contains("Saving raw results to"));

    let cache = dir.path().join("cache");
    for region in ["us-east-1", "us-east-2", "us-west-1", "us-west-2"] {
        assert!(cache.join(format!("spending-{region}-latest.json")).is_file());
    }
    assert!(cache.join("spending-latest.csv").is_file());
    assert!(dir.path().join("aws-spending-by-region.pdf").is_file());
}

#[test]
fn test_fetch_then_plot_from_raw() {
    let dir = TempDir::new().unwrap();

    cost_report(&dir)
        .args(["--data-dir", "data", "fetch", "--region", "eu-west-1"])
        .args(["--lookback-days", "7", "--include-total"])
        .assert()
        .success();
    assert!(dir.path().join("data/spending-all-latest.json").is_file());

    cost_report(&dir)
        .args(["--data-dir", "data", "plot", "--from-raw", "--outdir", "out"])
        .args(["--region", "eu-west-1", "--include-total", "--floor", "0"])
        .assert()
        .success();
    assert!(dir.path().join("out/aws-spending-by-region.pdf").is_file());
}

#[test]
fn test_plot_missing_csv_fails() {
    let dir = TempDir::new().unwrap();

    cost_report(&dir)
        .args(["plot", "--csv", "missing.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.csv does not exist"));
    assert!(!dir.path().join("aws-spending-by-region.pdf").exists());
}

#[test]
fn test_init_then_init_again_fails() {
    let dir = TempDir::new().unwrap();

    cost_report(&dir).arg("init").assert().success();
    assert!(dir.path().join("cache/config.json").is_file());

    cost_report(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_region_outside_data_dir_rejected() {
    let dir = TempDir::new().unwrap();

    cost_report(&dir)
        .args(["fetch", "--region", "../x", "--lookback-days", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid region name"));
    assert!(!dir.path().join("spending-x-latest.json").exists());
    assert!(!dir.path().join("cache").exists());
}
