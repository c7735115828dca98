//! End-to-end tests for the `fluentdb` binary

use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path) -> String {
    let config = dir.join("fluentdb.toml");
    fs::write(
        &config,
        format!("[[connection]]\npath = \"{}\"\n", dir.join("cli.db").display()),
    )
    .unwrap();
    config.display().to_string()
}

fn fluentdb() -> Command {
    Command::cargo_bin("fluentdb").unwrap()
}

#[test]
fn test_create_insert_and_select() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    fluentdb()
        .args([config.as_str(), "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL)"])
        .assert()
        .success()
        .stdout("[]\n");

    fluentdb()
        .args([config.as_str(), "INSERT INTO users (name, score) VALUES (?, ?)", "alice", "9.5"])
        .assert()
        .success();

    fluentdb()
        .args([config.as_str(), "SELECT id, name, score FROM users WHERE name = ?", "alice"])
        .assert()
        .success()
        .stdout("[{\"id\":1,\"name\":\"alice\",\"score\":9.5}]\n");
}

#[test]
fn test_prepare_error_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = fluentdb()
        .args([config.as_str(), "SELECT * FROM missing"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no such table"), "stderr was: {stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn test_missing_sql_prints_usage() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = fluentdb().arg(&config).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("usage: fluentdb"));
}
