use std::fs;
use std::path::Path;

use crashlog_core::{ReportError, ReportFile, ReportLoader};
use tempfile::tempdir;

#[test]
fn missing_file_is_a_reading_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("does-not-exist.crash");

    let err = ReportFile::open(&path).unwrap_err();
    match &err {
        ReportError::ReadingFile { path: p, .. } => assert_eq!(p, &path),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), "reading_file");
}

#[test]
fn blank_content_is_empty_for_every_route() {
    let dir = tempdir().unwrap();
    for (name, bytes) in [
        ("empty.crash", &b""[..]),
        ("blank.ips", &b"  \n\t\r\n"[..]),
        ("bom.txt", &b"\xef\xbb\xbf \n"[..]),
        ("empty.json", &b""[..]),
        ("blank.json", &b"\n\n   "[..]),
    ] {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        let err = ReportFile::open(&path).unwrap_err();
        assert!(matches!(err, ReportError::EmptyFile), "{name}: {err:?}");
    }
}

#[test]
fn undecodable_bytes_are_a_reading_error() {
    let err = ReportLoader::default()
        .load_bytes(Path::new("garbage.crash"), &[0xc3, 0x28, 0xa0, 0xa1])
        .unwrap_err();
    assert_eq!(err.kind(), "reading_file");

    let err = ReportLoader::default()
        .load_bytes(Path::new("garbage.json"), &[0xff, 0xfe, 0xfd])
        .unwrap_err();
    assert_eq!(err.kind(), "reading_file");
}

#[test]
fn unrelated_json_fails_translation() {
    let err = ReportLoader::default()
        .load_bytes(Path::new("settings.txt"), br#"{"theme":"dark","fontSize":12}"#)
        .unwrap_err();
    assert!(matches!(err, ReportError::Translation(_)), "{err:?}");
    assert!(err.to_string().contains("no recognizable process"));
}

#[test]
fn json_with_only_empty_images_fails_translation() {
    let err = ReportLoader::default()
        .load_bytes(Path::new("incident.ips"), b"{\"bug_type\":\"309\"}\n{\"usedImages\":[]}")
        .unwrap_err();
    assert_eq!(err.kind(), "translation");
}

#[test]
fn leading_whitespace_before_json_still_translates() {
    let content = "\u{feff}\n  {\"procName\":\"Late\",\"pid\":5}";
    let report = ReportLoader::default()
        .load_bytes(Path::new("late.ips"), content.as_bytes())
        .unwrap();
    assert_eq!(report.processes()[0].name, "Late");
    assert!(report.build_ids_for_symbolication().is_empty());
}
