//! End-to-end CLI tests for the paperfetch binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CITATION: &str =
    "Vaswani, A., Shazeer, N. (2017). Attention is all you need. Advances in Neural Information Processing Systems.\n";

/// Binary command isolated from any user-level config file.
fn paperfetch(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("paperfetch").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    paperfetch(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolve bibliographic records"))
        .stdout(predicate::str::contains("--no-fallback"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    paperfetch(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("paperfetch"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    paperfetch(&home)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_requires_input() {
    let home = TempDir::new().unwrap();
    paperfetch(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--input"));
}

#[test]
fn test_binary_missing_input_file_exits_one() {
    let home = TempDir::new().unwrap();
    paperfetch(&home)
        .args(["-i", "/definitely/not/here.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to read records"));
}

#[test]
fn test_binary_unsupported_extension_exits_one() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("records.xlsx");
    std::fs::write(&input, "title,authors\n").unwrap();

    paperfetch(&home)
        .arg("-i")
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("xlsx"));
}

#[test]
fn test_binary_empty_record_list_exits_one() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("records.txt");
    std::fs::write(&input, "\n   \n").unwrap();

    paperfetch(&home)
        .arg("-i")
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No records found"));
}

#[test]
fn test_binary_unknown_source_exits_one_before_network() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("records.txt");
    std::fs::write(&input, CITATION).unwrap();
    let output = home.path().join("out");

    paperfetch(&home)
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-s", "scihub"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("scihub"));
}

#[test]
fn test_binary_invalid_config_file_exits_one() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("records.txt");
    std::fs::write(&input, CITATION).unwrap();
    let config = home.path().join("custom.toml");
    std::fs::write(&config, "max_concurrent_downloads = 0\n").unwrap();

    paperfetch(&home)
        .arg("-i")
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn test_binary_quiet_and_verbose_conflict() {
    let home = TempDir::new().unwrap();
    paperfetch(&home)
        .args(["-i", "x.txt", "-q", "-v"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
