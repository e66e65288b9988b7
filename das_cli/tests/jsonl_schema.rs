//! End-to-end runs against the simulated assembly, validating the JSONL
//! report schema.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

/// Config with a small rate table so the simulated fiber stays short.
fn write_calibration_config(dir: &tempfile::TempDir) -> PathBuf {
    let rates = dir.path().join("rates.csv");
    fs::write(&rates, "min_period,sampling_hz\n150,20000\n300,1600\n").unwrap();

    let toml = format!(
        r#"
rate_table = "{}"

[dither]
probe_duration_s = 0.5

[logging]
level = "warn"
"#,
        rates.display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn parsed_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn calibrate_produces_a_report_of_logs_and_figures() {
    let dir = tempdir().unwrap();
    let cfg = write_calibration_config(&dir);
    let report = dir.path().join("calibration.jsonl");

    Command::cargo_bin("das_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["calibrate", "--report"])
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("Optimal Launch EDFA Current: 250 mA"))
        .stdout(predicate::str::contains("Pulse repetition rate set to 20000 Hz"));

    let lines = parsed_lines(&report);
    assert!(!lines.is_empty());
    for line in &lines {
        match line["type"].as_str().unwrap() {
            "log" => assert!(line["line"].is_string()),
            "figure" => {
                assert!(line["title"].is_string());
                assert!(matches!(line["kind"].as_str().unwrap(), "line" | "histogram"));
                assert!(line["series"].is_array());
            }
            other => panic!("unexpected record type {other}"),
        }
    }
    // two region scans, launch sweep, receive descent, two oscilloscope
    // snapshots, end probe
    let figures = lines.iter().filter(|l| l["type"] == "figure").count();
    assert!(figures >= 6, "only {figures} figures in the report");
}

#[test]
fn diagnose_reports_one_median_per_lane() {
    let dir = tempdir().unwrap();
    let cfg_path = dir.path().join("cfg.toml");
    fs::write(
        &cfg_path,
        "[diagnostics]\ntest_duration_s = 1\nchannel_range = \"1-8\"\n\n[logging]\nlevel = \"warn\"\n",
    )
    .unwrap();
    let report = dir.path().join("diagnostics.jsonl");

    Command::cargo_bin("das_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg_path)
        .args(["diagnose", "--procedure", "internal", "--report"])
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Acoustic Noise Floor - CRI-4400 #1 Laser 1:",
        ));

    let lines = parsed_lines(&report);
    let histograms = lines
        .iter()
        .filter(|l| l["type"] == "figure" && l["kind"] == "histogram")
        .count();
    // one distribution per lane: laser 1, laser 2, weighted stack
    assert_eq!(histograms, 3);
}
