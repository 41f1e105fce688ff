use std::fs;

use crash_symbolicator::commands::{collect_build_ids, inspect_report, loader_from_config};
use crash_symbolicator::{resolve_path, sha256_file};
use crashlog_core::ReportFormat;
use tempfile::tempdir;

#[test]
fn sha256_file_matches_known_hash() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("abc.txt");
    fs::write(&path, b"abc").expect("write");
    assert_eq!(
        sha256_file(&path).expect("hash"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn resolve_path_keeps_missing_absolute_paths() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("nope.crash");
    assert_eq!(resolve_path(&missing.to_string_lossy()).expect("resolve"), missing);
}

#[test]
fn inspect_report_summarizes_incident_reports() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("Demo.ips");
    fs::write(
        &path,
        "{\"bug_type\":\"309\"}\n{\"procName\":\"Demo\",\"pid\":7,\"cpuType\":\"X86-64\",\"usedImages\":[{\"base\":4096,\"size\":4096,\"uuid\":\"AAAAAAAA-1111-2222-3333-444444444444\",\"path\":\"/Demo\"}]}",
    )
    .expect("write");

    let summary = inspect_report(&path.to_string_lossy(), None).expect("inspect");
    assert_eq!(summary.format, ReportFormat::IncidentReport);
    assert_eq!(summary.processes.len(), 1);
    assert_eq!(summary.processes[0].pid, Some(7));
    assert_eq!(summary.processes[0].architecture.as_deref(), Some("x86_64"));
    assert_eq!(summary.build_ids, vec!["AAAAAAAA-1111-2222-3333-444444444444".to_string()]);
    assert!(summary.save_path.ends_with("Demo_symbolicated.ips"));
}

#[test]
fn collect_build_ids_errors_on_missing_report() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("missing.crash");
    let err = collect_build_ids(&missing.to_string_lossy(), None).unwrap_err();
    assert!(err.to_string().contains("Failed to load crash report"));
}

#[test]
fn loader_from_config_reads_yaml() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("c.yml");
    fs::write(&config, "config_version: 0.1.0\nfilter:\n  kind: disabled\nfilter_timeout_secs: 3\n")
        .expect("write");

    let loader = loader_from_config(Some(&config.to_string_lossy())).expect("loader");
    assert_eq!(loader.filter_name(), "unavailable");
    assert_eq!(loader.filter_timeout().as_secs(), 3);

    assert_eq!(loader_from_config(None).expect("default").filter_name(), "apple-fmt");
}
