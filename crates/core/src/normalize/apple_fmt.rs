//! In-process renderer for KSCrash-style JSON reports.
//!
//! Produces the "symbolicated side-by-side" Apple layout: every frame shows its
//! address as `image base + offset` followed by whatever symbol the reporter already
//! recorded, and the binary image table carries the identifiers the symbolication
//! stage keys on.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{FilterCompletion, FilterError, FilterOutcome, ReportFilter};
use crate::build_id::BuildId;

const CPU_TYPE_X86: i64 = 7;
const CPU_TYPE_ARM: i64 = 12;
const CPU_ARCH_ABI64: i64 = 0x0100_0000;
const CPU_ARCH_ABI64_32: i64 = 0x0200_0000;
const CPU_SUBTYPE_ARM64E: i64 = 2;
const CPU_SUBTYPE_ARM_V7S: i64 = 11;
const CPU_SUBTYPE_ARM_V7K: i64 = 12;

#[derive(Debug, Clone, Copy, Default)]
pub struct AppleFmtFilter;

impl ReportFilter for AppleFmtFilter {
    fn name(&self) -> &'static str {
        "apple-fmt"
    }

    fn filter_reports(&self, reports: Vec<Value>, on_completion: FilterCompletion) {
        let mut rendered = Vec::with_capacity(reports.len());
        for report in reports {
            match render_report(report) {
                Ok(text) => rendered.push(text),
                Err(err) => return on_completion(FilterOutcome::failure(err)),
            }
        }
        on_completion(FilterOutcome::success(rendered));
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KsReport {
    report: KsReportInfo,
    system: Option<KsSystem>,
    binary_images: Vec<KsBinaryImage>,
    crash: Option<KsCrash>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KsReportInfo {
    id: Option<String>,
    timestamp: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KsSystem {
    #[serde(rename = "CFBundleExecutable")]
    executable: Option<String>,
    #[serde(rename = "CFBundleExecutablePath")]
    executable_path: Option<String>,
    #[serde(rename = "CFBundleIdentifier")]
    bundle_identifier: Option<String>,
    #[serde(rename = "CFBundleShortVersionString")]
    short_version: Option<String>,
    #[serde(rename = "CFBundleVersion")]
    bundle_version: Option<String>,
    process_name: Option<String>,
    process_id: Option<u64>,
    parent_process_name: Option<String>,
    parent_process_id: Option<u64>,
    cpu_arch: Option<String>,
    system_name: Option<String>,
    system_version: Option<String>,
    os_version: Option<String>,
    machine: Option<String>,
    device_app_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KsBinaryImage {
    image_addr: u64,
    #[serde(default)]
    image_size: u64,
    name: String,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    cpu_type: Option<i64>,
    #[serde(default)]
    cpu_subtype: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KsCrash {
    error: Option<KsError>,
    threads: Vec<KsThread>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KsError {
    mach: Option<KsMach>,
    signal: Option<KsSignal>,
    nsexception: Option<KsNsException>,
    address: Option<u64>,
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KsMach {
    exception_name: Option<String>,
    code_name: Option<String>,
    code: Option<u64>,
    subcode: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KsSignal {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KsNsException {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KsThread {
    index: u32,
    crashed: bool,
    name: Option<String>,
    dispatch_queue: Option<String>,
    backtrace: Option<KsBacktrace>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KsBacktrace {
    contents: Vec<KsFrame>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KsFrame {
    instruction_addr: u64,
    object_addr: Option<u64>,
    object_name: Option<String>,
    symbol_addr: Option<u64>,
    symbol_name: Option<String>,
}

fn render_report(report: Value) -> Result<String, FilterError> {
    let report: KsReport = serde_json::from_value(report)
        .map_err(|err| FilterError::UnsupportedReport(err.to_string()))?;
    let (Some(system), Some(crash)) = (&report.system, &report.crash) else {
        return Err(FilterError::UnsupportedReport(
            "missing `system` or `crash` section".into(),
        ));
    };

    let mut out = String::new();
    render_header(&mut out, &report, system);
    render_exception(&mut out, crash);
    render_threads(&mut out, crash);
    render_images(&mut out, &report.binary_images, system);
    Ok(out)
}

fn render_header(out: &mut String, report: &KsReport, system: &KsSystem) {
    let unknown = "???";
    let process_name = system
        .process_name
        .as_deref()
        .or(system.executable.as_deref())
        .unwrap_or(unknown);

    let _ = writeln!(out, "Incident Identifier: {}", report.report.id.as_deref().unwrap_or(unknown));
    let _ = writeln!(out, "CrashReporter Key:   {}", system.device_app_hash.as_deref().unwrap_or(unknown));
    let _ = writeln!(out, "Hardware Model:      {}", system.machine.as_deref().unwrap_or(unknown));
    let _ = writeln!(out, "Process:         {}{}", process_name, pid_suffix(system.process_id));
    let _ = writeln!(out, "Path:            {}", system.executable_path.as_deref().unwrap_or(unknown));
    let _ = writeln!(out, "Identifier:      {}", system.bundle_identifier.as_deref().unwrap_or(unknown));
    let _ = writeln!(
        out,
        "Version:         {} ({})",
        system.bundle_version.as_deref().unwrap_or(unknown),
        system.short_version.as_deref().unwrap_or(unknown)
    );
    let code_type = system.cpu_arch.as_deref().map(code_type_for_arch).unwrap_or(unknown);
    let _ = writeln!(out, "Code Type:       {code_type}");
    let _ = writeln!(
        out,
        "Parent Process:  {}{}",
        system.parent_process_name.as_deref().unwrap_or(unknown),
        pid_suffix(system.parent_process_id)
    );
    out.push('\n');

    let date = report.report.timestamp.as_ref().and_then(format_timestamp);
    let _ = writeln!(out, "Date/Time:       {}", date.as_deref().unwrap_or(unknown));
    let _ = writeln!(
        out,
        "OS Version:      {} {} ({})",
        system.system_name.as_deref().unwrap_or(unknown),
        system.system_version.as_deref().unwrap_or(unknown),
        system.os_version.as_deref().unwrap_or(unknown)
    );
    out.push_str("Report Version:  104\n\n");
}

fn render_exception(out: &mut String, crash: &KsCrash) {
    let crashed = crash.threads.iter().find(|t| t.crashed).map(|t| t.index);
    if let Some(error) = &crash.error {
        let mach = error.mach.as_ref();
        let exception = mach.and_then(|m| m.exception_name.as_deref()).unwrap_or("EXC_CRASH");
        let signal = error.signal.as_ref().and_then(|s| s.name.as_deref()).unwrap_or("SIGABRT");
        let _ = writeln!(out, "Exception Type:  {exception} ({signal})");

        match (mach.and_then(|m| m.code_name.as_deref()), error.address) {
            (Some(code_name), Some(address)) => {
                let _ = writeln!(out, "Exception Codes: {code_name} at 0x{address:016x}");
            }
            _ => {
                let code = mach.and_then(|m| m.code).unwrap_or(0);
                let subcode = mach.and_then(|m| m.subcode).unwrap_or(0);
                let _ = writeln!(out, "Exception Codes: 0x{code:016x}, 0x{subcode:016x}");
            }
        }
    }
    if let Some(index) = crashed {
        let _ = writeln!(out, "Crashed Thread:  {index}");
    }
    out.push('\n');

    if let Some(error) = &crash.error {
        if let (Some(name), Some(reason)) =
            (error.nsexception.as_ref().and_then(|e| e.name.as_deref()), error.reason.as_deref())
        {
            out.push_str("Application Specific Information:\n");
            let _ = writeln!(
                out,
                "*** Terminating app due to uncaught exception '{name}', reason: '{reason}'\n"
            );
        }
    }
}

fn render_threads(out: &mut String, crash: &KsCrash) {
    for thread in &crash.threads {
        if let Some(name) = &thread.name {
            let _ = writeln!(out, "Thread {} name:  {}", thread.index, name);
        } else if let Some(queue) = &thread.dispatch_queue {
            let _ = writeln!(out, "Thread {} name:  Dispatch queue: {}", thread.index, queue);
        }
        if thread.crashed {
            let _ = writeln!(out, "Thread {} Crashed:", thread.index);
        } else {
            let _ = writeln!(out, "Thread {}:", thread.index);
        }

        let frames = thread.backtrace.as_ref().map(|b| b.contents.as_slice()).unwrap_or(&[]);
        for (index, frame) in frames.iter().enumerate() {
            let image = frame.object_name.as_deref().map(basename).unwrap_or("???");
            let _ = write!(out, "{index:<4}{image:<31}\t0x{:016x}", frame.instruction_addr);
            if let Some(base) = frame.object_addr {
                let _ = write!(out, " 0x{base:x} + {}", frame.instruction_addr.saturating_sub(base));
            }
            if let (Some(symbol), Some(symbol_addr)) = (&frame.symbol_name, frame.symbol_addr) {
                let _ = write!(out, " ({symbol} + {})", frame.instruction_addr.saturating_sub(symbol_addr));
            }
            out.push('\n');
        }
        out.push('\n');
    }
}

fn render_images(out: &mut String, images: &[KsBinaryImage], system: &KsSystem) {
    out.push_str("Binary Images:\n");
    for image in images {
        let Some(uuid) = image.uuid.as_deref() else { continue };
        let end = image.image_addr.wrapping_add(image.image_size.saturating_sub(1));
        let arch = image_arch(image)
            .or(system.cpu_arch.as_deref())
            .map(|a| format!(" {a}"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "0x{:x} - 0x{:x} {}{}  <{}> {}",
            image.image_addr,
            end,
            basename(&image.name),
            arch,
            identifier_token(uuid),
            image.name
        );
    }
}

/// Image-table identifier token: lowercase hex without separators. Unparseable
/// values pass through so the row is dropped by extraction rather than here.
pub(crate) fn identifier_token(raw: &str) -> String {
    match BuildId::parse(raw) {
        Ok(id) => id.simple_lowercase(),
        Err(_) => raw.replace('-', "").to_ascii_lowercase(),
    }
}

fn image_arch(image: &KsBinaryImage) -> Option<&'static str> {
    let cpu_type = image.cpu_type?;
    let subtype = image.cpu_subtype.unwrap_or(0) & 0x00ff_ffff;
    let arch = match cpu_type {
        t if t == CPU_TYPE_ARM | CPU_ARCH_ABI64 => {
            if subtype == CPU_SUBTYPE_ARM64E {
                "arm64e"
            } else {
                "arm64"
            }
        }
        t if t == CPU_TYPE_ARM | CPU_ARCH_ABI64_32 => "arm64_32",
        CPU_TYPE_ARM => match subtype {
            CPU_SUBTYPE_ARM_V7S => "armv7s",
            CPU_SUBTYPE_ARM_V7K => "armv7k",
            _ => "armv7",
        },
        t if t == CPU_TYPE_X86 | CPU_ARCH_ABI64 => "x86_64",
        CPU_TYPE_X86 => "i386",
        _ => return None,
    };
    Some(arch)
}

fn code_type_for_arch(arch: &str) -> &'static str {
    match arch {
        "arm64" | "arm64e" => "ARM-64",
        "arm64_32" => "ARM-64_32",
        a if a.starts_with("arm") => "ARM",
        "x86_64" | "x86_64h" => "X86-64",
        "i386" | "x86" => "X86",
        _ => "???",
    }
}

fn format_timestamp(value: &Value) -> Option<String> {
    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %z";
    match value {
        Value::String(s) => {
            let parsed: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(s).ok()?;
            Some(parsed.format(FORMAT).to_string())
        }
        Value::Number(n) => {
            let raw = n.as_i64()?;
            // Newer reporters record microseconds since the epoch.
            let micros = if raw > 100_000_000_000 { raw } else { raw.checked_mul(1_000_000)? };
            let parsed = DateTime::<Utc>::from_timestamp_micros(micros)?;
            Some(parsed.format(FORMAT).to_string())
        }
        _ => None,
    }
}

fn basename(path: &str) -> &str {
    Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or(path)
}

fn pid_suffix(pid: Option<u64>) -> String {
    pid.map(|pid| format!(" [{pid}]")).unwrap_or_default()
}
