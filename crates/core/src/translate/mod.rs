//! Translation of JSON incident reports (`.ips`) into canonical crash-log text.
//!
//! This is the one place that knows the incident schema. Frame addresses are stored
//! there as offsets into `usedImages`; the legacy layout wants absolute addresses and
//! an image table with inclusive end addresses, so both are reconstructed here.

use std::fmt::Write as _;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::extract::BINARY_IMAGES_HEADER;
use crate::normalize::apple_fmt::identifier_token;

mod schema;

use schema::{IpsFrame, IpsHeader, IpsImage, IpsPayload};

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Malformed incident report JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Incident report has a header but no payload")]
    MissingPayload,

    #[error("JSON document has no recognizable process or binary image information")]
    NoProcessStructure,
}

/// Translate an incident report into canonical crash-log text.
///
/// Accepts the usual header-line + payload pair, or a bare payload object.
pub fn translate_incident(content: &str) -> Result<String, TranslationError> {
    let documents = serde_json::Deserializer::from_str(content)
        .into_iter::<Value>()
        .collect::<Result<Vec<_>, _>>()?;

    let mut documents = documents.into_iter();
    let (header, payload) = match (documents.next(), documents.next()) {
        (Some(header), Some(payload)) => {
            (serde_json::from_value::<IpsHeader>(header)?, payload)
        }
        (Some(single), None) if is_header_only(&single) => {
            return Err(TranslationError::MissingPayload)
        }
        (Some(single), None) => (IpsHeader::default(), single),
        (None, _) => return Err(TranslationError::NoProcessStructure),
    };
    if documents.next().is_some() {
        debug!("ignoring trailing documents after incident payload");
    }

    let payload: IpsPayload = serde_json::from_value(payload)?;
    let has_images = payload.used_images.as_ref().is_some_and(|images| !images.is_empty());
    if payload.proc_name.is_none() && payload.pid.is_none() && !has_images {
        return Err(TranslationError::NoProcessStructure);
    }

    debug!(bug_type = header.bug_type.as_deref().unwrap_or("?"), "translating incident report");
    Ok(render(&header, &payload))
}

fn is_header_only(doc: &Value) -> bool {
    let Some(object) = doc.as_object() else { return false };
    object.contains_key("bug_type")
        && !object.contains_key("procName")
        && !object.contains_key("usedImages")
}

fn render(header: &IpsHeader, payload: &IpsPayload) -> String {
    let images = payload.used_images.as_deref().unwrap_or(&[]);
    let mut out = String::new();

    render_header(&mut out, header, payload);
    render_exception(&mut out, payload);

    if !payload.last_exception_backtrace.is_empty() {
        out.push_str("Last Exception Backtrace:\n");
        for (index, frame) in payload.last_exception_backtrace.iter().enumerate() {
            render_frame(&mut out, index, frame, images);
        }
        out.push('\n');
    }

    for (index, thread) in payload.threads.iter().enumerate() {
        if let Some(name) = &thread.name {
            let _ = writeln!(out, "Thread {index} name:   {name}");
        } else if let Some(queue) = &thread.queue {
            let _ = writeln!(out, "Thread {index} name:   Dispatch queue: {queue}");
        }
        if thread.triggered {
            let _ = writeln!(out, "Thread {index} Crashed:");
        } else {
            let _ = writeln!(out, "Thread {index}:");
        }
        for (frame_index, frame) in thread.frames.iter().enumerate() {
            render_frame(&mut out, frame_index, frame, images);
        }
        out.push('\n');
    }

    let fallback_arch =
        payload.cpu_type.as_deref().and_then(crate::model::architecture_for_code_type);
    let _ = writeln!(out, "{BINARY_IMAGES_HEADER}");
    for image in images {
        render_image(&mut out, image, fallback_arch.as_deref());
    }
    out.push_str("\nEOF\n");
    out
}

fn render_header(out: &mut String, header: &IpsHeader, payload: &IpsPayload) {
    let mut field = |label: &str, value: Option<&str>| {
        if let Some(value) = value {
            let _ = writeln!(out, "{:<21}{}", format!("{label}:"), value);
        }
    };

    field("Incident Identifier", payload.incident.as_deref().or(header.incident_id.as_deref()));
    field("CrashReporter Key", payload.crash_reporter_key.as_deref());
    field("Hardware Model", payload.model_code.as_deref());

    let name = payload.proc_name.as_deref().or(header.app_name.as_deref()).unwrap_or("???");
    let process = match payload.pid {
        Some(pid) => format!("{name} [{pid}]"),
        None => name.to_string(),
    };
    field("Process", Some(process.as_str()));
    field("Path", payload.proc_path.as_deref());

    let bundle = payload.bundle_info.as_ref();
    field(
        "Identifier",
        bundle.and_then(|b| b.identifier.as_deref()).or(header.bundle_id.as_deref()),
    );
    let short = bundle.and_then(|b| b.short_version.as_deref()).or(header.app_version.as_deref());
    let build = bundle.and_then(|b| b.version.as_deref()).or(header.build_version.as_deref());
    let version = match (short, build) {
        (Some(short), Some(build)) => Some(format!("{short} ({build})")),
        (Some(v), None) | (None, Some(v)) => Some(v.to_string()),
        (None, None) => None,
    };
    field("Version", version.as_deref());

    let code_type = payload.cpu_type.as_deref().map(|cpu| match payload.translated {
        Some(true) => format!("{cpu} (Translated)"),
        Some(false) => format!("{cpu} (Native)"),
        None => cpu.to_string(),
    });
    field("Code Type", code_type.as_deref());
    field("Role", payload.proc_role.as_deref());
    let parent = payload.parent_proc.as_deref().map(|p| match payload.parent_pid {
        Some(pid) => format!("{p} [{pid}]"),
        None => p.to_string(),
    });
    field("Parent Process", parent.as_deref());
    field("Coalition", payload.coalition_name.as_deref());
    out.push('\n');

    let mut field = |label: &str, value: Option<&str>| {
        if let Some(value) = value {
            let _ = writeln!(out, "{:<21}{}", format!("{label}:"), value);
        }
    };
    field("Date/Time", payload.capture_time.as_deref().or(header.timestamp.as_deref()));
    field("Launch Time", payload.proc_launch.as_deref());
    let os = payload.os_version.as_ref();
    let os_version = match os.and_then(|o| o.train.as_deref()) {
        Some(train) => Some(match os.and_then(|o| o.build.as_deref()) {
            Some(build) => format!("{train} ({build})"),
            None => train.to_string(),
        }),
        None => header.os_version.clone(),
    };
    field("OS Version", os_version.as_deref());
    field("Release Type", os.and_then(|o| o.release_type.as_deref()));
    field("Report Version", Some("104"));
    out.push('\n');
}

fn render_exception(out: &mut String, payload: &IpsPayload) {
    let mut wrote = false;
    if let Some(exception) = &payload.exception {
        let kind = exception.kind.as_deref().unwrap_or("EXC_CRASH");
        match &exception.signal {
            Some(signal) => {
                let _ = writeln!(out, "Exception Type:  {kind} ({signal})");
            }
            None => {
                let _ = writeln!(out, "Exception Type:  {kind}");
            }
        }
        if let Some(subtype) = &exception.subtype {
            let _ = writeln!(out, "Exception Subtype: {subtype}");
        }
        if let Some(codes) = &exception.codes {
            let _ = writeln!(out, "Exception Codes: {codes}");
        }
        wrote = true;
    }
    if let Some(termination) = &payload.termination {
        let mut parts = Vec::new();
        if let Some(namespace) = &termination.namespace {
            parts.push(format!("Namespace {namespace}"));
        }
        match &termination.code {
            Some(Value::Number(n)) => parts.push(format!("Code {n}")),
            Some(Value::String(s)) => parts.push(format!("Code {s}")),
            _ => {}
        }
        if let Some(indicator) = &termination.indicator {
            parts.push(indicator.clone());
        }
        if !parts.is_empty() {
            let _ = writeln!(out, "Termination Reason: {}", parts.join(", "));
            wrote = true;
        }
    }
    let triggered = payload
        .faulting_thread
        .or_else(|| payload.threads.iter().position(|t| t.triggered).map(|i| i as u32));
    if let Some(index) = triggered {
        let _ = writeln!(out, "Triggered by Thread:  {index}");
        wrote = true;
    }
    if wrote {
        out.push('\n');
    }

    if let Some(asi) = payload.asi.as_ref().and_then(Value::as_object) {
        out.push_str("Application Specific Information:\n");
        for (owner, messages) in asi {
            let _ = writeln!(out, "{owner}:");
            match messages {
                Value::Array(items) => {
                    for item in items.iter().filter_map(Value::as_str) {
                        let _ = writeln!(out, "{item}");
                    }
                }
                Value::String(s) => {
                    let _ = writeln!(out, "{s}");
                }
                _ => {}
            }
        }
        out.push('\n');
    }
}

fn render_frame(out: &mut String, index: usize, frame: &IpsFrame, images: &[IpsImage]) {
    let image = frame.image_index.and_then(|i| images.get(i));
    let name = image.map(image_name).unwrap_or("???");
    match image {
        Some(image) => {
            let address = image.base.wrapping_add(frame.image_offset);
            let _ = write!(
                out,
                "{index:<4}{name:<30}\t0x{address:016x} 0x{:x} + {}",
                image.base, frame.image_offset
            );
        }
        None => {
            let _ = write!(out, "{index:<4}{name:<30}\t0x{:016x}", frame.image_offset);
        }
    }
    if let Some(symbol) = &frame.symbol {
        let _ = write!(out, " ({symbol} + {})", frame.symbol_location.unwrap_or(0));
    }
    out.push('\n');
}

fn render_image(out: &mut String, image: &IpsImage, fallback_arch: Option<&str>) {
    let Some(uuid) = image.uuid.as_deref() else { return };
    let end = image.base.wrapping_add(image.size.saturating_sub(1));
    let arch = image.arch.as_deref().or(fallback_arch).map(|a| format!(" {a}")).unwrap_or_default();
    let version = match (&image.short_version, &image.version) {
        (Some(short), Some(build)) => format!(" ({short} - {build})"),
        (Some(v), None) | (None, Some(v)) => format!(" ({v})"),
        (None, None) => String::new(),
    };
    let _ = writeln!(
        out,
        "0x{:x} - 0x{:x} {}{}{}  <{}> {}",
        image.base,
        end,
        image_name(image),
        arch,
        version,
        identifier_token(uuid),
        image.path.as_deref().unwrap_or("???")
    );
}

fn image_name(image: &IpsImage) -> &str {
    image
        .name
        .as_deref()
        .or_else(|| {
            image.path.as_deref().and_then(|p| Path::new(p).file_name()).and_then(|n| n.to_str())
        })
        .unwrap_or("???")
}
