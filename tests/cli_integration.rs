use std::process::Command;

fn vibeguard() -> Command {
    Command::new(env!("CARGO_BIN_EXE_vibeguard"))
}

#[test]
fn minimal_pass_exits_zero() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("vibeguard.yaml"),
        "version: \"1\"\nchecks:\n  - id: hello\n    run: echo hi\n",
    )
    .unwrap();

    let output = vibeguard().current_dir(dir.path()).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("PASS  hello"));
    assert!(stdout.contains("1 checks passed"));
}

#[test]
fn error_severity_failure_exits_one() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("vibeguard.yaml"),
        "version: \"1\"\nchecks:\n  - id: x\n    run: exit 7\n    severity: error\n",
    )
    .unwrap();

    let output = vibeguard().current_dir(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAIL  x"));
    assert!(stdout.contains("1 violation(s)"));
}

#[test]
fn warning_severity_failure_exits_zero() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("vibeguard.yaml"),
        "version: \"1\"\nchecks:\n  - id: x\n    run: exit 7\n    severity: warning\n",
    )
    .unwrap();

    let output = vibeguard().current_dir(dir.path()).output().unwrap();
    assert!(output.status.success());
}

#[test]
fn missing_config_is_a_configuration_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = vibeguard().current_dir(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("vibeguard:"));
}

#[test]
fn cyclic_dependency_is_a_configuration_error() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("vibeguard.yaml"),
        "version: \"1\"\nchecks:\n  - id: a\n    run: echo a\n    requires: [b]\n  - id: b\n    run: echo b\n    requires: [a]\n",
    )
    .unwrap();

    let output = vibeguard().current_dir(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cyclic dependency"));
}

#[test]
fn dependent_check_is_skipped_when_prerequisite_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("vibeguard.yaml"),
        "version: \"1\"\nchecks:\n  - id: a\n    run: exit 1\n  - id: b\n    run: echo b\n    requires: [a]\n",
    )
    .unwrap();

    let output = vibeguard().current_dir(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAIL  b"));
    assert!(stdout.contains("Skipped: required dependency failed"));
}

#[test]
fn explicit_config_flag_is_honored() {
    let dir = tempfile::TempDir::new().unwrap();
    let config_path = dir.path().join("custom.yaml");
    std::fs::write(
        &config_path,
        "version: \"1\"\nchecks:\n  - id: a\n    run: echo hi\n",
    )
    .unwrap();

    let output = vibeguard()
        .args(["--config", config_path.to_str().unwrap()])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
}

#[test]
fn single_check_flag_bypasses_the_graph() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("vibeguard.yaml"),
        "version: \"1\"\nchecks:\n  - id: a\n    run: exit 1\n  - id: b\n    run: echo hi\n    requires: [a]\n",
    )
    .unwrap();

    let output = vibeguard()
        .args(["--check", "b"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("PASS  b"));
}

#[test]
fn unknown_check_id_via_flag_is_a_configuration_error() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("vibeguard.yaml"),
        "version: \"1\"\nchecks:\n  - id: a\n    run: echo hi\n",
    )
    .unwrap();

    let output = vibeguard()
        .args(["--check", "nope"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn grok_and_assert_drive_pass_fail_independent_of_exit_code() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("vibeguard.yaml"),
        "version: \"1\"\nchecks:\n  - id: cov\n    run: \"echo 'coverage: 65%'\"\n    grok: \"coverage: %{NUMBER:coverage}%\"\n    assert: \"coverage >= 70\"\n    severity: warning\n",
    )
    .unwrap();

    let output = vibeguard().current_dir(dir.path()).output().unwrap();
    assert!(output.status.success()); // warning-only
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAIL  cov"));
}

#[test]
fn init_writes_a_starter_config() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = vibeguard()
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(dir.path().join("vibeguard.yaml").is_file());
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("vibeguard.yaml"), "version: \"1\"\nchecks: []\n").unwrap();

    let output = vibeguard()
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already exists"));
}

#[test]
fn log_file_is_written_per_check() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("vibeguard.yaml"),
        "version: \"1\"\nchecks:\n  - id: hello\n    run: echo logged-output\n",
    )
    .unwrap();

    let output = vibeguard().current_dir(dir.path()).output().unwrap();
    assert!(output.status.success());
    let log = std::fs::read_to_string(dir.path().join(".vibeguard/log/hello.log")).unwrap();
    assert!(log.contains("logged-output"));
}
