//! Process/image extraction from canonical crash-report text.
//!
//! The scan is line oriented. A line starting with `Process:` opens a new process
//! span; inside a span we pick up header fields, thread backtraces and the
//! `Binary Images:` table. Image rows whose identifier does not parse are skipped
//! individually: a damaged row never costs the rest of the table.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::build_id::BuildId;
use crate::model::{architecture_for_code_type, BinaryImage, Frame, Process, Thread};

/// Marker that opens a process section in legacy crash text.
pub const PROCESS_HEADER_PREFIX: &str = "Process:";

/// Marker that opens the binary image table of a process.
pub const BINARY_IMAGES_HEADER: &str = "Binary Images:";

static PROCESS_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Process:\s*(.*?)(?:\s*\[(\d+)\])?\s*$").unwrap());

static THREAD_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Thread\s+(\d+)(\s+Crashed)?::?(?:\s+(.*?))?\s*$").unwrap());

static THREAD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Thread\s+(\d+)\s+name:\s*(.*?)\s*$").unwrap());

static FRAME_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\s+(.+?)\s+(0x[0-9a-fA-F]+)(?:\s+(.*?))?\s*$").unwrap()
});

static IMAGE_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(0x[0-9a-fA-F]+)\s*-\s*(0x[0-9a-fA-F]+|\?\?\?)\s+\+?(.+?)\s+<([^>]*)>\s+(.+?)\s*$",
    )
    .unwrap()
});

const KNOWN_ARCHITECTURES: &[&str] =
    &["arm64", "arm64e", "arm64_32", "armv7", "armv7s", "armv7k", "x86_64", "x86_64h", "i386"];

/// Scan canonical text and return its processes in order of appearance.
///
/// Pure function of `content`: calling it twice yields identical results.
pub fn find_processes(content: &str) -> Vec<Process> {
    let mut processes = Vec::new();
    let mut current: Option<ProcessScanner> = None;

    for line in content.lines() {
        if let Some(caps) = PROCESS_HEADER.captures(line) {
            if let Some(scanner) = current.take() {
                processes.push(scanner.finish());
            }
            let name = caps.get(1).map(|m| m.as_str()).filter(|s| !s.is_empty()).unwrap_or("???");
            let pid = caps.get(2).and_then(|m| m.as_str().parse().ok());
            current = Some(ProcessScanner::new(Process::new(name, pid)));
            continue;
        }
        if let Some(scanner) = current.as_mut() {
            scanner.feed(line);
        }
    }

    if let Some(scanner) = current.take() {
        processes.push(scanner.finish());
    }
    debug!(count = processes.len(), "extracted processes");
    processes
}

/// Parse one `Binary Images:` row. Returns `None` for lines that are not image rows
/// and for rows whose identifier is unusable.
pub fn parse_image_row(line: &str) -> Option<BinaryImage> {
    let caps = IMAGE_ROW.captures(line)?;
    let load_address = parse_hex(&caps[1])?;
    let end_address = match &caps[2] {
        "???" => None,
        end => Some(parse_hex(end)?),
    };
    let build_id = match BuildId::parse(&caps[4]) {
        Ok(id) => id,
        Err(err) => {
            debug!(row = line.trim(), %err, "skipping image row");
            return None;
        }
    };
    let (name, version, architecture) = split_image_descriptor(&caps[3]);

    Some(BinaryImage {
        load_address,
        end_address,
        name,
        version,
        architecture,
        build_id,
        path: caps[5].to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Thread,
    Images,
    Other,
}

struct ProcessScanner {
    process: Process,
    section: Section,
    pending_names: Vec<(u32, String)>,
}

impl ProcessScanner {
    fn new(process: Process) -> Self {
        Self { process, section: Section::Header, pending_names: Vec::new() }
    }

    fn feed(&mut self, line: &str) {
        if line.trim().is_empty() {
            if matches!(self.section, Section::Thread | Section::Images) {
                self.section = Section::Other;
            }
            return;
        }

        if line.starts_with(BINARY_IMAGES_HEADER) {
            self.section = Section::Images;
            return;
        }

        if let Some(caps) = THREAD_NAME.captures(line) {
            if let Ok(index) = caps[1].parse() {
                self.pending_names.push((index, caps[2].to_string()));
            }
            return;
        }

        if let Some(caps) = THREAD_HEADER.captures(line) {
            let Ok(index) = caps[1].parse::<u32>() else { return };
            let crashed = caps.get(2).is_some();
            let inline_name = caps.get(3).map(|m| m.as_str().to_string()).filter(|s| !s.is_empty());
            let name = inline_name.or_else(|| {
                self.pending_names.iter().rev().find(|(i, _)| *i == index).map(|(_, n)| n.clone())
            });
            if crashed && self.process.crashed_thread.is_none() {
                self.process.crashed_thread = Some(index);
            }
            self.process.threads.push(Thread { index, name, crashed, frames: Vec::new() });
            self.section = Section::Thread;
            return;
        }

        match self.section {
            Section::Images => match parse_image_row(line) {
                Some(image) => self.process.binary_images.push(image),
                None => trace!(line, "ignoring non-image line in image table"),
            },
            Section::Thread => {
                if let Some(frame) = parse_frame_row(line) {
                    if let Some(thread) = self.process.threads.last_mut() {
                        thread.frames.push(frame);
                    }
                }
            }
            Section::Header | Section::Other => self.feed_header_field(line),
        }
    }

    fn feed_header_field(&mut self, line: &str) {
        let process = &mut self.process;
        if let Some(value) = field_value(line, "Path:") {
            process.path.get_or_insert(value);
        } else if let Some(value) = field_value(line, "Identifier:") {
            process.identifier.get_or_insert(value);
        } else if let Some(value) = field_value(line, "Version:") {
            process.version.get_or_insert(value);
        } else if let Some(value) = field_value(line, "Code Type:") {
            if process.architecture.is_none() {
                process.architecture = architecture_for_code_type(&value);
            }
        } else if let Some(value) = field_value(line, "Crashed Thread:")
            .or_else(|| field_value(line, "Triggered by Thread:"))
        {
            if process.crashed_thread.is_none() {
                process.crashed_thread =
                    value.split_whitespace().next().and_then(|tok| tok.parse().ok());
            }
        }
    }

    fn finish(self) -> Process {
        self.process
    }
}

fn field_value(line: &str, key: &str) -> Option<String> {
    let rest = line.strip_prefix(key)?;
    let value = rest.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_frame_row(line: &str) -> Option<Frame> {
    let caps = FRAME_ROW.captures(line)?;
    Some(Frame {
        index: caps[1].parse().ok()?,
        image_name: caps[2].trim().to_string(),
        address: parse_hex(&caps[3])?,
        detail: caps.get(4).map(|m| m.as_str().to_string()).filter(|s| !s.is_empty()),
    })
}

fn parse_hex(token: &str) -> Option<u64> {
    let digits = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}

/// Split the descriptor between the address range and the identifier into
/// `(name, version, architecture)`.
///
/// macOS rows read `com.example.App (1.0 - 1)`, iOS rows read `App arm64`.
fn split_image_descriptor(descriptor: &str) -> (String, Option<String>, Option<String>) {
    let mut rest = descriptor.trim();
    let mut version = None;
    if rest.ends_with(')') {
        if let Some(open) = rest.rfind(" (") {
            version = Some(rest[open + 2..rest.len() - 1].trim().to_string());
            rest = rest[..open].trim_end();
        }
    }

    let mut architecture = None;
    if let Some((head, last)) = rest.rsplit_once(char::is_whitespace) {
        if KNOWN_ARCHITECTURES.contains(&last) {
            architecture = Some(last.to_string());
            rest = head.trim_end();
        }
    }

    let name = if rest.is_empty() { "???".to_string() } else { rest.to_string() };
    (name, version, architecture)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_macos_descriptor() {
        let (name, version, arch) = split_image_descriptor("com.apple.CoreFoundation (6.9 - 1856.105)");
        assert_eq!(name, "com.apple.CoreFoundation");
        assert_eq!(version.as_deref(), Some("6.9 - 1856.105"));
        assert_eq!(arch, None);
    }

    #[test]
    fn splits_ios_descriptor() {
        let (name, version, arch) = split_image_descriptor("libsystem_kernel.dylib arm64e");
        assert_eq!(name, "libsystem_kernel.dylib");
        assert_eq!(version, None);
        assert_eq!(arch.as_deref(), Some("arm64e"));
    }

    #[test]
    fn keeps_names_with_spaces() {
        let (name, _, arch) = split_image_descriptor("Google Chrome Framework x86_64");
        assert_eq!(name, "Google Chrome Framework");
        assert_eq!(arch.as_deref(), Some("x86_64"));
    }

    #[test]
    fn parses_image_row_with_unknown_end() {
        let image = parse_image_row(
            "0x1000 - ??? App <aaaaaaaa111122223333444444444444> /App",
        )
        .unwrap();
        assert_eq!(image.load_address, 0x1000);
        assert_eq!(image.end_address, None);
    }

    #[test]
    fn frame_row_keeps_detail() {
        let frame = parse_frame_row(
            "0   libsystem_kernel.dylib        \t0x00000001b8c2a964 0x1b8c22000 + 35172",
        )
        .unwrap();
        assert_eq!(frame.index, 0);
        assert_eq!(frame.image_name, "libsystem_kernel.dylib");
        assert_eq!(frame.address, 0x1b8c2a964);
        assert_eq!(frame.detail.as_deref(), Some("0x1b8c22000 + 35172"));
    }
}
