use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("cfg.toml");
    fs::write(&path, body).unwrap();
    path
}

fn sample_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../etc/soc_config.toml")
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["check-config"], 0, "config OK: chemistry battleborn", "stdout")]
#[case(&["run", "--seconds", "30"], 0, "soc_ekf", "stdout")]
#[case(&["run", "--soc0", "1.5"], 1, "soc0", "stderr")]
#[case(&["run", "--chemistry", "nimh"], 1, "unknown chemistry", "stderr")]
#[case(&["run", "--every", "0"], 2, "every", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let mut cmd = Command::cargo_bin("soc_cli").unwrap();
    cmd.arg("--config").arg(sample_config());
    for a in args {
        cmd.arg(a);
    }
    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        _ => {
            assert.stderr(predicate::str::contains(needle));
        }
    }
}

#[test]
fn runs_without_a_config_file() {
    Command::cargo_bin("soc_cli")
        .unwrap()
        .args(["run", "--seconds", "5", "--every", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("done:"));
}

#[test]
fn json_run_emits_parseable_lines() {
    let out = Command::cargo_bin("soc_cli")
        .unwrap()
        .args([
            "--json",
            "--log-level",
            "error",
            "run",
            "--seconds",
            "60",
            "--every",
            "100",
            "--current",
            "-50",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    // 600 ticks reported every 100 plus the last tick, then the summary
    assert_eq!(lines.len(), 8);
    assert!(lines[..7].iter().all(|v| v["event"] == "tick"));
    let done = &lines[7];
    assert_eq!(done["event"], "done");
    let soc_sim = done["soc_sim"].as_f64().unwrap();
    // 50 A for 60 s out of 100 Ah
    assert!(soc_sim < 0.9 && soc_sim > 0.88, "soc_sim={soc_sim}");
}

#[test]
fn offset_monitor_reports_estimate_error() {
    let out = Command::cargo_bin("soc_cli")
        .unwrap()
        .args([
            "--json",
            "--log-level",
            "error",
            "run",
            "--seconds",
            "2",
            "--every",
            "10",
            "--current",
            "-10",
            "--soc0",
            "0.8",
            "--soc-mon",
            "0.6",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let ticks: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .filter(|v| v["event"] == "tick")
        .collect();
    assert!(!ticks.is_empty());
    for v in &ticks {
        let soc_err = v["soc_err"].as_f64().unwrap();
        let expected = v["soc_ekf"].as_f64().unwrap() - v["soc_sim"].as_f64().unwrap();
        assert!((soc_err - expected).abs() < 1e-12, "{v}");
        assert!(v["vb_err"].as_f64().unwrap().is_finite());
    }
    // the EKF starts well below the plant and cannot close the gap in 2 s
    assert!(ticks[0]["soc_err"].as_f64().unwrap() < -0.1);
}

#[test]
fn invalid_config_reports_field_and_fails() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[battery]\nnom_dt = 0.0\n");
    Command::cargo_bin("soc_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("check-config")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("What happened: Invalid configuration"))
        .stderr(predicate::str::contains("nom_dt"));
}

#[test]
fn malformed_toml_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[battery]\nnom_dt = \"fast\"\n");
    Command::cargo_bin("soc_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid TOML"));
}

#[test]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[ekf]\nr = -1.0\n");
    let out = Command::cargo_bin("soc_cli")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("check-config")
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8(out.stderr).unwrap();
    let last = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "Error");
    assert!(v["message"].as_str().unwrap().contains("ekf.r"));
}

#[test]
fn ocv_csv_with_bad_header_is_rejected() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("ocv.csv");
    fs::write(&csv, "soc,voltage\n0.0,10.0\n").unwrap();
    Command::cargo_bin("soc_cli")
        .unwrap()
        .args(["run", "--seconds", "1", "--voc-csv"])
        .arg(&csv)
        .assert()
        .failure()
        .stderr(predicate::str::contains("soc,temp_c,voc"));
}
