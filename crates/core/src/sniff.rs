//! Format sniffing: decide how raw report content must be handled.
//!
//! Routing happens in two stages. The file extension only selects how the bytes are
//! decoded (`.json` goes through the structured-report filter, everything else is read
//! as text). The content itself then decides between legacy text and an incident
//! report that needs translation, and the only reliable signal for that is whether a
//! first extraction pass found any process.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::Process;

/// How the raw bytes of a report file are decoded, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRoute {
    /// Structured crash-reporter JSON, rendered through a [`crate::normalize::ReportFilter`].
    StructuredJson,
    /// Anything else: decoded as UTF-8 text.
    RawText,
}

/// What the decoded content turned out to be after the first extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentShape {
    /// Canonical crash-log text, usable as-is (possibly with zero processes).
    LegacyText,
    /// JSON without any process header; hand it to the incident-report translator.
    NeedsTranslation,
}

/// The input shape a report was classified as, recorded on the loaded report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    LegacyText,
    StructuredJson,
    IncidentReport,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::LegacyText => "legacy_text",
            ReportFormat::StructuredJson => "structured_json",
            ReportFormat::IncidentReport => "incident_report",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the decoding route for a file from its extension.
pub fn route_for_path(path: &Path) -> InputRoute {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => InputRoute::StructuredJson,
        _ => InputRoute::RawText,
    }
}

/// Whether `content` opens a JSON object, ignoring a byte-order mark and leading
/// whitespace.
pub fn looks_like_json_object(content: &str) -> bool {
    content.trim_start_matches('\u{feff}').trim_start().starts_with('{')
}

/// Classify decoded content given the result of a first extraction pass over it.
pub fn classify(content: &str, first_pass: &[Process]) -> ContentShape {
    if first_pass.is_empty() && looks_like_json_object(content) {
        ContentShape::NeedsTranslation
    } else {
        ContentShape::LegacyText
    }
}
