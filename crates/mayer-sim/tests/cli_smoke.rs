use std::fs;
use std::process::Command;

use tempfile::tempdir;

const CONFIG: &str = "\
sampling:
  sub_steps: 100
calibration:
  search_steps: 2000
  narrow_steps: 2000
  equilibration_steps: 200
production:
  steps: 4000
seed_policy:
  master_seed: 5
";

#[test]
fn run_writes_artefacts_and_prints_estimate() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("overlap.yaml");
    fs::write(&config, CONFIG).unwrap();
    let out = dir.path().join("run");

    let output = Command::new(env!("CARGO_BIN_EXE_mayer-sim"))
        .args(["run", "--scenario", "proportional", "--factor", "3"])
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&out)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ratio = report["summary"]["estimate"]["ratio"].as_f64().unwrap();
    assert!((ratio - 3.0).abs() < 1e-9);
    assert_eq!(report["scenario"], "proportional");

    assert!(out.join("progress.csv").exists());
    assert!(out.join("manifest.json").exists());
    let stored: f64 = fs::read_to_string(out.join("refpref.txt"))
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!((stored - 3.0).abs() < 1e-9);
}

#[test]
fn missing_config_fails() {
    let dir = tempdir().unwrap();
    let status = Command::new(env!("CARGO_BIN_EXE_mayer-sim"))
        .arg("run")
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .env("RUST_LOG", "off")
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_mayer-sim"))
        .arg("version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        env!("CARGO_PKG_VERSION")
    );
}
