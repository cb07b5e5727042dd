#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use bench_core::BenchError;
use bench_exp::{ProcessRunner, RunMode, Runner, SweepDriver};

mod common;
use common::scaling_plan;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

#[test]
fn captures_stdout_stderr_and_exit_status() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let exe = script(
        temp.path(),
        "echo.sh",
        "echo \"args: $1 $2\"\necho 'Parallel time (s): 0.5' >&2\nexit 3",
    );
    let mut runner = ProcessRunner::new(&exe);
    runner.preflight().expect("preflight");
    let raw = runner
        .run(&["1000".to_string(), "4".to_string()])
        .expect("run");
    assert_eq!(raw.exit_status, 3);
    assert!(raw.text.contains("args: 1000 4"));
    assert!(raw.text.contains("Parallel time (s): 0.5"));
}

#[test]
fn killed_child_reports_negative_signal() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let exe = script(temp.path(), "crash.sh", "kill -9 $$");
    let raw = ProcessRunner::new(&exe).run(&[]).expect("run");
    assert_eq!(raw.exit_status, -9);
}

#[test]
fn missing_executable_fails_preflight_and_launch() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let mut runner = ProcessRunner::new(temp.path().join("absent"));
    let err = runner.preflight().expect_err("preflight");
    assert!(matches!(err, BenchError::Launch(_)));
    assert!(err.info().context["path"].ends_with("absent"));
    assert!(matches!(runner.run(&[]), Err(BenchError::Launch(_))));
}

#[test]
fn bare_program_name_is_resolved_through_path() {
    let mut runner = ProcessRunner::new("sh");
    runner.preflight().expect("bare name skips the file check");
    let raw = runner
        .run(&["-c".to_string(), "echo from-path".to_string()])
        .expect("run");
    assert_eq!(raw.exit_status, 0);
    assert!(raw.text.contains("from-path"));

    let mut absent = ProcessRunner::new("no-such-benchmark-binary");
    absent.preflight().expect("resolved at launch");
    let err = absent.run(&[]).expect_err("launch");
    assert!(matches!(err, BenchError::Launch(_)));
}

#[test]
fn non_executable_file_fails_preflight() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let path = temp.path().join("plain.sh");
    fs::write(&path, "#!/bin/sh\n").expect("write");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");
    let err = ProcessRunner::new(&path).preflight().expect_err("not executable");
    assert_eq!(err.info().message, "benchmark executable is not executable");
}

#[test]
fn sweep_over_real_process_persists_rows() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let exe = script(
        temp.path(),
        "bench.sh",
        "echo \"Serial time (s): $1\"\necho \"Parallel time (s): $2\"\necho 'Results match!'",
    );
    let store = temp.path().join("out").join("scaling.csv");
    let mut plan = scaling_plan(&store, &[4, 8], &[1, 2], 2);
    plan.executable = exe.clone();
    let mut driver = SweepDriver::new(plan, ProcessRunner::new(&exe));
    let summary = driver.run(RunMode::Fresh).expect("sweep");
    assert_eq!(summary.persisted, 4);
    assert_eq!(summary.failed_attempts, 0);

    let table = driver.load().expect("load");
    let row = &table.rows[3];
    assert_eq!(row.combination.label(), "size=8 workers=2");
    assert_eq!(row.derived("speedup"), Some(4.0));
}

#[test]
fn sweep_aborts_when_executable_is_missing() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let store = temp.path().join("scaling.csv");
    let plan = scaling_plan(&store, &[4], &[1], 1);
    let mut driver = SweepDriver::new(plan, ProcessRunner::new(temp.path().join("absent")));
    let err = driver.run(RunMode::Fresh).expect_err("launch failure");
    assert!(err.is_fatal());
    assert!(!store.exists());
}
