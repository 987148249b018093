use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn write_options(tmp: &TempDir, body: &str) -> PathBuf {
    let p = tmp.path().join("als.json");
    fs::write(&p, body).expect("write options");
    p
}

#[test]
fn samples_are_printed_as_json_lines() {
    let tmp = TempDir::new().unwrap();
    let path = write_options(
        &tmp,
        r#"{
            "d": 8,
            "optimize": {
                "max_trials": 10,
                "space": {
                    "d": ["randint", ["d", 2, 5]],
                    "alpha": ["uniform", ["alpha", 1.0, 4.0]]
                }
            }
        }"#,
    );
    let output = Command::cargo_bin("ials-opt-check")
        .expect("binary exists")
        .arg(&path)
        .args(["--samples", "3", "--seed", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    for line in lines {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        let d = v["d"].as_i64().unwrap();
        assert!((2..5).contains(&d));
        let alpha = v["alpha"].as_f64().unwrap();
        assert!((1.0..=4.0).contains(&alpha));
    }
}

#[test]
fn same_seed_same_output() {
    let tmp = TempDir::new().unwrap();
    let path = write_options(
        &tmp,
        r#"{"optimize": {"space": {"reg_u": ["loguniform", ["reg_u", -3.0, 0.0]]}}}"#,
    );
    let run = || {
        Command::cargo_bin("ials-opt-check")
            .unwrap()
            .arg(&path)
            .args(["--seed", "42"])
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn unknown_parameter_fails() {
    let tmp = TempDir::new().unwrap();
    let path = write_options(
        &tmp,
        r#"{"optimize": {"space": {"learning_rate": ["uniform", ["lr", 0.0, 1.0]]}}}"#,
    );
    Command::cargo_bin("ials-opt-check")
        .unwrap()
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unexpected parameter: learning_rate"));
}

#[test]
fn validation_loss_requires_validation() {
    let tmp = TempDir::new().unwrap();
    let path = write_options(&tmp, r#"{"optimize": {"loss": "val_ndcg"}}"#);
    Command::cargo_bin("ials-opt-check")
        .unwrap()
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("val_ndcg"));

    let ok = write_options(
        &tmp,
        r#"{"validation": {"topk": 5}, "optimize": {"loss": "val_ndcg"}}"#,
    );
    Command::cargo_bin("ials-opt-check")
        .unwrap()
        .arg(&ok)
        .args(["--samples", "0"])
        .assert()
        .success();
}

#[test]
fn missing_file_fails() {
    let tmp = TempDir::new().unwrap();
    Command::cargo_bin("ials-opt-check")
        .unwrap()
        .arg(tmp.path().join("nope.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}
