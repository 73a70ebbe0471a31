//! CLI argument handling tests.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn missing_input_path_prints_usage() {
    Command::cargo_bin("alertlog")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_describes_recognized_options() {
    Command::cargo_bin("alertlog")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--buckets"))
        .stdout(predicate::str::contains("--threshold"))
        .stdout(predicate::str::contains("--threads"))
        .stdout(predicate::str::contains("--max-length"));
}
