use std::fs;
use std::process::{Command as StdCommand, Stdio};

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const START: &str = "http://example.com/page#alpha";

fn simulate(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("hash-track").unwrap();
    cmd.current_dir(dir).arg("simulate").arg("--start").arg(START);
    cmd
}

#[test]
fn fragment_prints_text_after_first_marker() {
    let mut cmd = Command::cargo_bin("hash-track").unwrap();
    cmd.arg("fragment").arg("http://example.com/page#a#b");

    cmd.assert().success().stdout("a#b\n");
}

#[test]
fn fragment_without_marker_is_empty() {
    let mut cmd = Command::cargo_bin("hash-track").unwrap();
    cmd.arg("fragment").arg("http://example.com/page");

    cmd.assert().success().stdout("\n");
}

#[test]
fn native_profile_reports_changes_from_stdin_script() {
    let dir = tempdir().unwrap();
    let mut cmd = simulate(dir.path());
    cmd.arg("-").write_stdin("go beta\ngo beta\nexternal gamma\n");

    cmd.assert()
        .success()
        .stdout("initial\talpha\nchange\tbeta\nchange\tgamma\n");
}

#[test]
fn polling_profile_needs_a_tick() {
    let dir = tempdir().unwrap();
    let script = dir.path().join("steps.txt");
    fs::write(&script, "external beta\nread\ntick 50\n").unwrap();

    let mut cmd = simulate(dir.path());
    cmd.arg("--profile").arg("polling").arg(&script);

    cmd.assert()
        .success()
        .stdout("initial\talpha\nread\tbeta\nchange\tbeta\n");
}

#[test]
fn legacy_profile_reports_through_surface_polling() {
    let dir = tempdir().unwrap();
    let mut cmd = simulate(dir.path());
    cmd.arg("--profile")
        .arg("legacy")
        .arg("-")
        .write_stdin("go beta\ntick 50\nback\ntick 50\n");

    cmd.assert()
        .success()
        .stdout("initial\talpha\ninitial\tbeta\ninitial\talpha\n");
}

#[test]
fn json_format_emits_one_object_per_line() {
    let dir = tempdir().unwrap();
    let mut cmd = simulate(dir.path());
    cmd.arg("--format")
        .arg("json")
        .arg("-")
        .write_stdin("tick 20\ngo beta\n");

    let output = cmd.assert().success().get_output().stdout.clone();
    let lines: Vec<serde_json::Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "initial");
    assert_eq!(lines[0]["at_ms"], 0);
    assert_eq!(lines[1]["event"], "change");
    assert_eq!(lines[1]["fragment"], "beta");
    assert_eq!(lines[1]["at_ms"], 20);
}

#[test]
fn script_errors_name_the_line() {
    let dir = tempdir().unwrap();
    let mut cmd = simulate(dir.path());
    cmd.arg("-").write_stdin("go beta\njump gamma\n");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("jump"));
}

#[test]
fn override_config_slows_polling() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("slow.toml");
    fs::write(&config, "[detector]\npoll_interval_ms = 200\n").unwrap();

    let mut cmd = simulate(dir.path());
    cmd.arg("--profile")
        .arg("polling")
        .arg("--config")
        .arg(&config)
        .arg("-")
        .write_stdin("external beta\ntick 100\nread\ntick 100\n");

    cmd.assert()
        .success()
        .stdout("initial\talpha\nread\tbeta\nchange\tbeta\n");
}

#[test]
fn local_config_is_picked_up_from_working_directory() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join(".hash-track.toml"),
        "[detector]\npoll_interval_ms = 0\n",
    )
    .unwrap();

    let mut cmd = simulate(dir.path());
    cmd.arg("-").write_stdin("go beta\n");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("detector.poll_interval_ms"));
}

#[test]
fn missing_override_config_fails() {
    let dir = tempdir().unwrap();
    let mut cmd = simulate(dir.path());
    cmd.arg("--config").arg("absent.toml").arg("-").write_stdin("");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn exits_successfully_when_downstream_pipe_closes() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let script = dir.path().join("steps.txt");
    fs::write(&script, "go beta\n")?;

    let mut cmd = StdCommand::new(cargo_bin("hash-track"));
    cmd.current_dir(dir.path())
        .arg("simulate")
        .arg(&script)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    drop(child.stdout.take());

    let output = child.wait_with_output()?;
    assert!(
        output.status.success(),
        "expected success, got status: {status:?}",
        status = output.status
    );
    assert!(
        output.stderr.is_empty(),
        "expected stderr to be empty, got: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    Ok(())
}

#[test]
fn oversized_tick_is_rejected_before_running() {
    let dir = tempdir().unwrap();
    let mut cmd = simulate(dir.path());
    cmd.arg("--profile")
        .arg("polling")
        .arg("-")
        .write_stdin("tick 18446744073709551615\n");

    cmd.assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("exceeds"));
}
