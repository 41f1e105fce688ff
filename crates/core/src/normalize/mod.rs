//! Structured crash-report JSON normalization.
//!
//! Structured reports (KSCrash-style JSON) are rendered into canonical crash-log text
//! by a [`ReportFilter`]. Filters report back through a completion callback, which may
//! fire on another thread; [`run_filter_blocking`] turns that into a bounded blocking
//! call. When a filter cannot produce exactly one report the raw bytes are used
//! instead, so a broken filter degrades the output rather than failing the load.
//! Bytes that are not JSON at all are a read failure.

use std::io;
use std::path::Path;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use serde::de::IgnoredAny;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::report::ReportError;

pub mod apple_fmt;
pub mod command;

pub use apple_fmt::AppleFmtFilter;
pub use command::CommandFilter;

/// Callback a filter must invoke exactly once when it is done.
pub type FilterCompletion = Box<dyn FnOnce(FilterOutcome) + Send + 'static>;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Report filter unavailable: {0}")]
    Unavailable(String),
    #[error("Report not understood by filter: {0}")]
    UnsupportedReport(String),
    #[error("Filter command failed: {0}")]
    Command(String),
}

/// What a filter hands to its completion callback.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub reports: Vec<String>,
    pub completed: bool,
    pub error: Option<FilterError>,
}

impl FilterOutcome {
    pub fn success(reports: Vec<String>) -> Self {
        Self { reports, completed: true, error: None }
    }

    pub fn failure(error: FilterError) -> Self {
        Self { reports: Vec::new(), completed: false, error: Some(error) }
    }

    /// The single rendered report, or `None` if the outcome does not qualify.
    fn into_single_report(mut self, filter: &str) -> Option<String> {
        if let Some(err) = &self.error {
            warn!(filter, %err, "report filter failed");
            return None;
        }
        if !self.completed {
            warn!(filter, "report filter did not complete");
            return None;
        }
        if self.reports.len() != 1 {
            warn!(filter, count = self.reports.len(), "report filter did not yield exactly one report");
            return None;
        }
        self.reports.pop()
    }
}

/// Formatting filter turning structured crash JSON into canonical crash-log text.
///
/// Implementations must call `on_completion` exactly once, from any thread, and must
/// be safe to invoke concurrently when reports are loaded in parallel.
pub trait ReportFilter: Send + Sync {
    fn name(&self) -> &'static str;

    fn filter_reports(&self, reports: Vec<Value>, on_completion: FilterCompletion);
}

/// A filter that never renders anything, forcing the raw-text fallback.
#[derive(Debug, Clone, Default)]
pub struct UnavailableFilter;

impl ReportFilter for UnavailableFilter {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn filter_reports(&self, _reports: Vec<Value>, on_completion: FilterCompletion) {
        on_completion(FilterOutcome::failure(FilterError::Unavailable(
            "report filtering disabled".into(),
        )));
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Report filter '{filter}' did not complete within {timeout:?}")]
    TimedOut { filter: &'static str, timeout: Duration },
}

/// Run `filter` on a single report and wait at most `timeout` for its completion.
///
/// `Ok(None)` means the filter finished (or dropped its callback) without a usable
/// report. A filter that never answers is an error, not a fallback.
pub fn run_filter_blocking(
    filter: &dyn ReportFilter,
    report: Value,
    timeout: Duration,
) -> Result<Option<String>, NormalizeError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    filter.filter_reports(
        vec![report],
        Box::new(move |outcome| {
            // The receiver is gone only if we already timed out.
            let _ = tx.send(outcome);
        }),
    );

    match rx.recv_timeout(timeout) {
        Ok(outcome) => Ok(outcome.into_single_report(filter.name())),
        Err(RecvTimeoutError::Timeout) => {
            Err(NormalizeError::TimedOut { filter: filter.name(), timeout })
        }
        Err(RecvTimeoutError::Disconnected) => {
            warn!(filter = filter.name(), "report filter dropped its completion without calling it");
            Ok(None)
        }
    }
}

/// Turn the bytes of a structured JSON report into canonical content.
///
/// Bytes that are not JSON fail as a read error. Blank content and a stream of
/// several JSON documents (an incident report saved as `.json`) pass through as text.
pub fn normalize_structured(
    path: &Path,
    bytes: &[u8],
    filter: &dyn ReportFilter,
    timeout: Duration,
) -> Result<String, ReportError> {
    let text = decode_text(path, bytes)?;
    if text.trim().is_empty() {
        return Ok(text);
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            let rendered = run_filter_blocking(filter, json, timeout)
                .map_err(|err| ReportError::Other(Box::new(err)))?;
            if let Some(text) = rendered {
                debug!(filter = filter.name(), path = %path.display(), "rendered structured report");
                return Ok(text);
            }
            warn!(path = %path.display(), "falling back to raw report text");
            Ok(text)
        }
        Err(_) if is_document_stream(&text) => {
            debug!(path = %path.display(), "structured report holds several JSON documents");
            Ok(text)
        }
        Err(err) => Err(ReportError::ReadingFile {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, err),
        }),
    }
}

fn is_document_stream(text: &str) -> bool {
    let mut count = 0;
    for document in serde_json::Deserializer::from_str(text).into_iter::<IgnoredAny>() {
        if document.is_err() {
            return false;
        }
        count += 1;
    }
    count > 1
}

/// Decode raw report bytes as UTF-8, dropping a leading byte-order mark.
pub fn decode_text(path: &Path, bytes: &[u8]) -> Result<String, ReportError> {
    let bytes = bytes.strip_prefix(&[0xef, 0xbb, 0xbf][..]).unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|err| ReportError::ReadingFile {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, err),
    })
}
