#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crashlog_core::normalize::{run_filter_blocking, CommandFilter};
use crashlog_core::{FilterConfig, ReportLoader, SymbolicatorConfig};
use serde_json::json;
use tempfile::tempdir;

fn sh(script: &str) -> CommandFilter {
    CommandFilter::new("/bin/sh", vec!["-c".into(), script.into()])
}

#[test]
fn stdout_of_the_program_is_the_rendered_report() {
    let filter = sh("cat >/dev/null; printf 'Process: Piped [77]\\n'");
    let out = run_filter_blocking(&filter, json!({ "k": 1 }), Duration::from_secs(10)).unwrap();
    assert_eq!(out.as_deref(), Some("Process: Piped [77]\n"));
}

#[test]
fn report_json_is_written_to_stdin() {
    let filter = sh("cat");
    let out = run_filter_blocking(&filter, json!({ "k": 1 }), Duration::from_secs(10)).unwrap();
    assert_eq!(out.as_deref(), Some("{\"k\":1}"));
}

#[test]
fn failing_program_falls_back_to_raw_text() {
    let loader = ReportLoader::default()
        .with_filter(Arc::new(sh("cat >/dev/null; echo boom >&2; exit 3")));
    let content = br#"{"procName":"Fallback","pid":1}"#;
    let report = loader.load_bytes(Path::new("r.json"), content).unwrap();
    assert_eq!(report.processes()[0].name, "Fallback");
}

#[test]
fn missing_program_falls_back_to_raw_text() {
    let filter = CommandFilter::new("/nonexistent/report-fmt", Vec::new());
    let out = run_filter_blocking(&filter, json!({}), Duration::from_secs(10)).unwrap();
    assert_eq!(out, None);
}

fn wait_for_pid(pid_file: &Path) -> String {
    let start = Instant::now();
    loop {
        if let Ok(pid) = fs::read_to_string(pid_file) {
            if !pid.trim().is_empty() {
                return pid.trim().to_string();
            }
        }
        assert!(start.elapsed() < Duration::from_secs(5), "formatter never started");
        thread::sleep(Duration::from_millis(20));
    }
}

fn is_running(pid: &str) -> bool {
    Command::new("kill").args(["-0", pid]).status().unwrap().success()
}

#[test]
fn hung_program_is_killed_at_its_deadline() {
    let dir = tempdir().unwrap();
    let pid_file = dir.path().join("formatter.pid");
    let filter = sh(&format!("echo $$ > '{}'; exec sleep 30", pid_file.display()))
        .with_deadline(Duration::from_millis(500));

    let started = Instant::now();
    let out = run_filter_blocking(&filter, json!({}), Duration::from_secs(10)).unwrap();
    assert_eq!(out, None);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!is_running(&wait_for_pid(&pid_file)));
}

#[test]
fn configured_timeout_fails_the_load_and_reaps_the_formatter() {
    let dir = tempdir().unwrap();
    let pid_file = dir.path().join("formatter.pid");
    let config = SymbolicatorConfig {
        filter: FilterConfig::Command {
            program: "/bin/sh".into(),
            args: vec!["-c".into(), format!("echo $$ > '{}'; exec sleep 30", pid_file.display())],
        },
        filter_timeout_secs: 1,
        ..SymbolicatorConfig::default()
    };

    let err = ReportLoader::from_config(&config)
        .load_bytes(Path::new("stuck.json"), b"{\"a\":1}")
        .unwrap_err();
    assert_eq!(err.kind(), "other");

    let pid = wait_for_pid(&pid_file);
    let start = Instant::now();
    while is_running(&pid) {
        assert!(start.elapsed() < Duration::from_secs(5), "formatter {pid} outlived its deadline");
        thread::sleep(Duration::from_millis(50));
    }
}
