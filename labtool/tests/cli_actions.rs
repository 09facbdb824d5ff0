//! CLI tests for the action subcommands.
//!
//! Spawns the labtool binary in a temp directory whose `labtool.toml` runs
//! scripts with `sh`, then checks exit codes, script arguments and the log.
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use labtool::exit_codes;
use labtool::test_support::write_script;

const CONFIG: &str = r#"log_file = "labtool.log"
log_level = "debug"
scripts_dir = "scripts"

[interpreter]
candidates = ["sh"]
args = []
"#;

const RECORD_ARGS: &str = "printf '%s\\n' \"$@\" > args.txt\n";

fn lab_dir() -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("labtool.toml"), CONFIG).expect("write config");
    temp
}

fn labtool(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_labtool"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("run labtool")
}

fn recorded_args(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("args.txt"))
        .expect("args.txt")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn create_user_passes_flags_to_script() {
    let temp = lab_dir();
    write_script(temp.path(), "scripts/crear_usuario.ps1", RECORD_ARGS);

    let output = labtool(temp.path(), &["create-user", "--never-expire", "O'Brien Test"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        recorded_args(temp.path()),
        vec!["-Username", "O'Brien Test", "-NoPassword", "-NeverExpire"]
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("O'Brien Test"), "stdout: {stdout}");
}

#[test]
fn failing_script_exits_with_failed_code_and_reports_stderr() {
    let temp = lab_dir();
    write_script(
        temp.path(),
        "scripts/bloquear_fondo.ps1",
        "echo 'access denied' >&2\nexit 3\n",
    );

    let output = labtool(temp.path(), &["block-wallpaper"]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error - Block wallpaper"), "stderr: {stderr}");
    assert!(stderr.contains("access denied"), "stderr: {stderr}");
}

#[test]
fn log_file_is_recreated_on_each_start() {
    let temp = lab_dir();
    write_script(temp.path(), "scripts/desbloquear_fondo.ps1", "exit 0\n");
    let log_path = temp.path().join("labtool.log");
    fs::write(&log_path, "stale line from an earlier run\n").expect("seed log");

    let output = labtool(temp.path(), &["unblock-wallpaper"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let log = fs::read_to_string(&log_path).expect("read log");
    assert!(!log.contains("stale line"));
    assert!(log.contains("launching action"), "log: {log}");
    assert!(log.contains("desbloquear_fondo.ps1"), "log: {log}");
}

#[test]
fn run_passes_exit_code_and_output_through() {
    let temp = lab_dir();
    write_script(
        temp.path(),
        "probe.sh",
        "echo \"$X:$1\"\necho warn >&2\nexit 4\n",
    );

    let output = labtool(
        temp.path(),
        &["run", "--env", "X=1", "probe.sh", "-Flag"],
    );

    assert_eq!(output.status.code(), Some(4));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1:-Flag");
    assert!(String::from_utf8_lossy(&output.stderr).contains("warn"));
}

#[test]
fn delete_user_attempts_every_name() {
    let temp = lab_dir();
    write_script(
        temp.path(),
        "scripts/borrar_usuario_completo.ps1",
        "printf '%s\\n' \"$2\" >> deleted.txt\n[ \"$2\" = bad ] && exit 2\nexit 0\n",
    );

    let output = labtool(temp.path(), &["delete-user", "a", "bad", "c"]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let deleted = fs::read_to_string(temp.path().join("deleted.txt")).expect("deleted.txt");
    assert_eq!(deleted.lines().collect::<Vec<_>>(), vec!["a", "bad", "c"]);
}

#[test]
fn init_config_refuses_to_overwrite_without_force() {
    let temp = lab_dir();

    let output = labtool(temp.path(), &["init-config"]);
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));

    let output = labtool(temp.path(), &["init-config", "--force"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let written = fs::read_to_string(temp.path().join("labtool.toml")).expect("config");
    assert!(written.contains("\"sh\""), "config: {written}");
}

#[test]
fn list_folders_failure_is_reported_and_logged() {
    let temp = lab_dir();

    let output = labtool(temp.path(), &["list-folders", "missing-root"]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error - List folders"), "stderr: {stderr}");
    let log = fs::read_to_string(temp.path().join("labtool.log")).expect("read log");
    assert!(log.contains("action failed"), "log: {log}");
    assert!(log.contains("missing-root"), "log: {log}");
}

#[test]
fn list_folders_prints_names_then_summary() {
    let temp = lab_dir();
    fs::create_dir_all(temp.path().join("profiles/beta")).expect("mkdir");
    fs::create_dir_all(temp.path().join("profiles/alpha")).expect("mkdir");

    let output = labtool(temp.path(), &["list-folders", "profiles"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["alpha", "beta", "Done: 2 folder(s) found."]);
}

#[test]
fn run_rejects_zero_timeout() {
    let temp = lab_dir();
    write_script(temp.path(), "probe.sh", "exit 0\n");

    let output = labtool(temp.path(), &["run", "--timeout", "0", "probe.sh"]);

    assert_ne!(output.status.code(), Some(exit_codes::OK));
    assert!(!temp.path().join("labtool.log").exists());
}
