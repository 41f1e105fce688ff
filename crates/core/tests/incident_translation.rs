use std::fs;

use crashlog_core::extract::find_processes;
use crashlog_core::translate::{translate_incident, TranslationError};
use crashlog_core::{ReportFile, ReportFormat};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

const IPS_HEADER: &str = r#"{"app_name":"Demo","timestamp":"2023-04-01 10:20:30.00 +0000","app_version":"1.2.0","bug_type":"309","os_version":"iPhone OS 16.4 (20E247)","incident_id":"8F0E5D3C-1A2B-4C5D-8E9F-0A1B2C3D4E5F","build_version":"12","bundleID":"com.example.demo","name":"Demo"}"#;

const IPS_PAYLOAD: &str = r#"{
  "uptime" : 1200,
  "procRole" : "Foreground",
  "procLaunch" : "2023-04-01 10:19:00.0000 +0000",
  "modelCode" : "iPhone14,2",
  "captureTime" : "2023-04-01 10:20:30.1234 +0000",
  "incident" : "8F0E5D3C-1A2B-4C5D-8E9F-0A1B2C3D4E5F",
  "pid" : 4242,
  "translated" : false,
  "cpuType" : "ARM-64",
  "procName" : "Demo",
  "procPath" : "/private/var/containers/Bundle/Application/X/Demo.app/Demo",
  "bundleInfo" : {"CFBundleShortVersionString":"1.2.0","CFBundleVersion":"12","CFBundleIdentifier":"com.example.demo"},
  "osVersion" : {"train":"iPhone OS 16.4","build":"20E247","releaseType":"User"},
  "parentProc" : "launchd",
  "parentPid" : 1,
  "exception" : {"codes":"0x0000000000000000, 0x0000000000000000","type":"EXC_CRASH","signal":"SIGABRT"},
  "termination" : {"code":4,"namespace":"SIGNAL","indicator":"Abort trap: 6"},
  "asi" : {"libsystem_c.dylib":["abort() called"]},
  "faultingThread" : 1,
  "threads" : [
    {"queue":"com.apple.main-thread","frames":[
      {"imageOffset":29396,"symbol":"mach_msg_trap","symbolLocation":8,"imageIndex":1},
      {"imageOffset":23228,"imageIndex":0}
    ]},
    {"triggered":true,"name":"worker","frames":[
      {"imageOffset":41384,"symbol":"__pthread_kill","symbolLocation":8,"imageIndex":1},
      {"imageOffset":16400,"imageIndex":0},
      {"imageOffset":12,"imageIndex":7}
    ]}
  ],
  "usedImages" : [
    {"source":"P","arch":"arm64","base":4294967296,"size":65536,"uuid":"aaaaaaaa-1111-2222-3333-444444444444","path":"/private/var/containers/Bundle/Application/X/Demo.app/Demo","name":"Demo","CFBundleShortVersionString":"1.2.0","CFBundleVersion":"12"},
    {"source":"P","arch":"arm64e","base":7392612352,"size":229376,"uuid":"4b6e2c1d-93a8-3a9b-8f0d-6e5a7c3b2a10","path":"/usr/lib/system/libsystem_kernel.dylib","name":"libsystem_kernel.dylib"},
    {"source":"A","base":0,"size":0},
    {"source":"P","arch":"arm64e","base":7516192768,"size":32768,"uuid":"c1f4a8d0-2b3e-3f6a-8c9d-0e1f2a3b4c5d","path":"/usr/lib/system/libsystem_c.dylib","name":"libsystem_c.dylib"}
  ]
}"#;

fn ips() -> String {
    format!("{IPS_HEADER}\n{IPS_PAYLOAD}")
}

#[test]
fn translated_text_round_trips_through_extraction() {
    let text = translate_incident(&ips()).unwrap();
    let processes = find_processes(&text);
    assert_eq!(processes.len(), 1);

    let process = &processes[0];
    assert_eq!(process.name, "Demo");
    assert_eq!(process.pid, Some(4242));
    assert_eq!(process.identifier.as_deref(), Some("com.example.demo"));
    assert_eq!(process.version.as_deref(), Some("1.2.0 (12)"));
    assert_eq!(process.architecture.as_deref(), Some("arm64"));
    assert_eq!(process.crashed_thread, Some(1));

    let ids: Vec<String> = process.build_ids().map(|id| id.simple_lowercase()).collect();
    assert_eq!(
        ids,
        vec![
            "aaaaaaaa111122223333444444444444",
            "4b6e2c1d93a83a9b8f0d6e5a7c3b2a10",
            "c1f4a8d02b3e3f6a8c9d0e1f2a3b4c5d",
        ]
    );
    assert_eq!(process.binary_images[0].version.as_deref(), Some("1.2.0 - 12"));
    assert_eq!(process.binary_images[0].end_address, Some(0x1_0000_ffff));
}

#[test]
fn threads_are_rebuilt_with_absolute_addresses() {
    let text = translate_incident(&ips()).unwrap();
    let process = find_processes(&text).remove(0);

    assert_eq!(process.threads.len(), 2);
    assert_eq!(process.threads[0].name.as_deref(), Some("Dispatch queue: com.apple.main-thread"));
    assert!(!process.threads[0].crashed);
    assert_eq!(process.threads[1].name.as_deref(), Some("worker"));
    assert!(process.threads[1].crashed);

    let crashed = &process.threads[1].frames;
    assert_eq!(crashed[1].address, 0x1_0000_0000 + 16400);
    assert_eq!(crashed[1].image_name, "Demo");
    // imageIndex 7 does not exist.
    assert_eq!(crashed[2].image_name, "???");
    assert_eq!(
        process.image_containing(crashed[1].address).map(|i| i.name.as_str()),
        Some("Demo")
    );
}

#[test]
fn header_block_carries_exception_and_termination() {
    let text = translate_incident(&ips()).unwrap();
    assert!(text.contains("Exception Type:  EXC_CRASH (SIGABRT)\n"), "{text}");
    assert!(text.contains("Termination Reason: Namespace SIGNAL, Code 4, Abort trap: 6\n"));
    assert!(text.contains("Triggered by Thread:  1\n"));
    assert!(text.contains("abort() called\n"));
    assert!(text.contains("OS Version:          iPhone OS 16.4 (20E247)\n"));
    assert!(text.contains("Code Type:           ARM-64 (Native)\n"));
}

#[test]
fn ips_file_is_translated_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Demo-2023-04-01-102030.ips");
    fs::write(&path, ips()).unwrap();

    let report = ReportFile::open(&path).unwrap();
    assert_eq!(report.format(), ReportFormat::IncidentReport);
    assert!(!report.processes().is_empty());
    assert!(report.content().starts_with("Incident Identifier: "));
    assert_eq!(report.build_ids_for_symbolication().len(), 3);
    assert_eq!(
        report.symbolicated_content_save_path(),
        dir.path().join("Demo-2023-04-01-102030_symbolicated.ips")
    );
}

#[test]
fn payload_without_header_is_accepted() {
    let text = translate_incident(IPS_PAYLOAD).unwrap();
    assert_eq!(find_processes(&text)[0].name, "Demo");
}

#[test]
fn header_only_is_missing_payload() {
    let err = translate_incident(IPS_HEADER).unwrap_err();
    assert!(matches!(err, TranslationError::MissingPayload));
}

#[test]
fn malformed_json_is_reported() {
    let err = translate_incident("{\"bug_type\":\"309\"}\n{\"procName\": ").unwrap_err();
    assert!(matches!(err, TranslationError::Json(_)));
}

#[test]
fn wrongly_typed_field_is_reported() {
    let err = translate_incident("{\"procName\":\"App\",\"pid\":\"not a number\"}").unwrap_err();
    assert!(matches!(err, TranslationError::Json(_)));
}

#[test]
fn empty_image_table_without_identity_has_no_structure() {
    let err = translate_incident("{\"bug_type\":\"309\"}\n{\"usedImages\":[]}").unwrap_err();
    assert!(matches!(err, TranslationError::NoProcessStructure));
}

#[test]
fn image_table_alone_is_enough() {
    let content = "{\"usedImages\":[{\"base\":4096,\"size\":16,\"uuid\":\"AAAAAAAA-1111-2222-3333-444444444444\",\"path\":\"/lib/x\"}]}";
    let text = translate_incident(content).unwrap();
    let processes = find_processes(&text);
    assert_eq!(processes[0].name, "???");
    assert_eq!(processes[0].binary_images[0].name, "x");
}
