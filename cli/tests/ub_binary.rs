//! The `ub` binary: exit codes and depth-cap configuration.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

const SCRIPT: &str = "
(axiom A Type)
(axiom B (-> A Prop))
(axiom C (-> A Prop))
(axiom L (forall (x A) (-> (B x) (C x))))
(goal (forall (x A) (C x)))
(apply L)
";

fn script_file(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ub-tests-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("create temp dir");
    let path = dir.join(name);
    fs::write(&path, contents).expect("write script");
    path
}

fn ub(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ub"));
    cmd.args(args).env_remove("UB_MAX_DEPTH").env_remove("UB_LOG");
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().expect("failed to run ub")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn successful_script_exits_zero() {
    let path = script_file("ok.ub", SCRIPT);
    let output = ub(&["run", path.to_str().unwrap()], &[]);
    assert!(output.status.success(), "stdout:\n{}", stdout(&output));
    assert!(stdout(&output).contains("apply L at depth 1"));
}

#[test]
fn max_depth_flag_caps_the_search() {
    let path = script_file("capped.ub", SCRIPT);
    let output = ub(&["run", path.to_str().unwrap(), "--max-depth", "0"], &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("error: transformation failed"));
}

#[test]
fn environment_cap_applies_without_the_flag() {
    let path = script_file("env.ub", SCRIPT);
    let capped = ub(&["run", path.to_str().unwrap()], &[("UB_MAX_DEPTH", "0")]);
    assert_eq!(capped.status.code(), Some(1));

    let flag_wins = ub(
        &["run", path.to_str().unwrap(), "--max-depth", "3"],
        &[("UB_MAX_DEPTH", "0")],
    );
    assert!(flag_wins.status.success(), "stdout:\n{}", stdout(&flag_wins));
}

#[test]
fn missing_file_is_an_error() {
    let output = ub(&["run", "/nonexistent/script.ub"], &[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot read"));
}
