//! The report container and the loading pipeline that builds it.
//!
//! Loading is one blocking call that either yields a fully populated [`ReportFile`] or
//! a single [`ReportError`]: decode by extension, reject blank content, extract, and
//! when nothing was found in JSON-looking content translate it and extract again.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::build_id::BuildId;
use crate::config::{FilterConfig, SymbolicatorConfig};
use crate::extract::find_processes;
use crate::model::Process;
use crate::normalize::{
    decode_text, normalize_structured, AppleFmtFilter, CommandFilter, ReportFilter,
    UnavailableFilter,
};
use crate::sniff::{classify, route_for_path, ContentShape, InputRoute, ReportFormat};
use crate::translate::{translate_incident, TranslationError};

/// Suffix appended to the file stem of the suggested symbolicated output path.
pub const DEFAULT_SAVE_SUFFIX: &str = "_symbolicated";

/// How long a report filter may take before loading fails.
pub const DEFAULT_FILTER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to read crash report {}: {source}", .path.display())]
    ReadingFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Crash report is empty")]
    EmptyFile,

    #[error("Failed to translate incident report: {0}")]
    Translation(#[from] TranslationError),

    #[error("{0}")]
    Other(Box<dyn StdError + Send + Sync>),
}

impl ReportError {
    /// Stable tag for presentation layers (CLI output, JSON).
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::ReadingFile { .. } => "reading_file",
            ReportError::EmptyFile => "empty_file",
            ReportError::Translation(_) => "translation",
            ReportError::Other(_) => "other",
        }
    }
}

/// A crash report loaded into canonical text, with its extracted processes.
#[derive(Debug)]
pub struct ReportFile {
    path: PathBuf,
    filename: String,
    format: ReportFormat,
    content: String,
    processes: Vec<Process>,
    build_ids: OnceLock<Vec<BuildId>>,
    symbolicated_content: Option<String>,
    save_suffix: String,
}

impl ReportFile {
    /// Load `path` with the default loader.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        ReportLoader::default().load(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Canonical crash-log text; never empty.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// Every build identifier across all processes, deduplicated in first-seen order.
    pub fn build_ids_for_symbolication(&self) -> &[BuildId] {
        self.build_ids.get_or_init(|| {
            let mut seen = std::collections::HashSet::new();
            self.processes
                .iter()
                .flat_map(Process::build_ids)
                .filter(|id| seen.insert(*id))
                .collect()
        })
    }

    pub fn symbolicated_content(&self) -> Option<&str> {
        self.symbolicated_content.as_deref()
    }

    pub fn set_symbolicated_content(&mut self, content: impl Into<String>) {
        self.symbolicated_content = Some(content.into());
    }

    /// Suggested destination for the symbolicated text, next to the source file.
    pub fn symbolicated_content_save_path(&self) -> PathBuf {
        self.save_path_with_suffix(&self.save_suffix)
    }

    /// `<dir>/<stem><suffix>.<ext>`; the extension is omitted when the source has none.
    pub fn save_path_with_suffix(&self, suffix: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.clone());
        let name = match self.path.extension() {
            Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
            None => format!("{stem}{suffix}"),
        };
        self.path.with_file_name(name)
    }
}

/// Builds [`ReportFile`]s with a given report filter and timeout.
#[derive(Clone)]
pub struct ReportLoader {
    filter: Arc<dyn ReportFilter>,
    filter_timeout: Duration,
    save_suffix: String,
}

impl Default for ReportLoader {
    fn default() -> Self {
        Self {
            filter: Arc::new(AppleFmtFilter),
            filter_timeout: DEFAULT_FILTER_TIMEOUT,
            save_suffix: DEFAULT_SAVE_SUFFIX.to_string(),
        }
    }
}

impl fmt::Debug for ReportLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportLoader")
            .field("filter", &self.filter.name())
            .field("filter_timeout", &self.filter_timeout)
            .field("save_suffix", &self.save_suffix)
            .finish()
    }
}

impl ReportLoader {
    pub fn from_config(config: &SymbolicatorConfig) -> Self {
        let filter_timeout = config.filter_timeout();
        let filter: Arc<dyn ReportFilter> = match &config.filter {
            FilterConfig::Builtin => Arc::new(AppleFmtFilter),
            FilterConfig::Command { program, args } => {
                Arc::new(CommandFilter::new(program, args.clone()).with_deadline(filter_timeout))
            }
            FilterConfig::Disabled => Arc::new(UnavailableFilter),
        };
        Self {
            filter,
            filter_timeout,
            save_suffix: config.save_suffix.clone(),
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn ReportFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.filter_timeout = timeout;
        self
    }

    pub fn filter_timeout(&self) -> Duration {
        self.filter_timeout
    }

    pub fn filter_name(&self) -> &'static str {
        self.filter.name()
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<ReportFile, ReportError> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|source| ReportError::ReadingFile { path: path.to_path_buf(), source })?;
        self.load_bytes(path, &bytes)
    }

    /// Run the loading pipeline on bytes already read from `path`.
    pub fn load_bytes(&self, path: &Path, bytes: &[u8]) -> Result<ReportFile, ReportError> {
        let route = route_for_path(path);
        debug!(path = %path.display(), ?route, "routing crash report");

        let mut content = match route {
            InputRoute::StructuredJson => {
                normalize_structured(path, bytes, self.filter.as_ref(), self.filter_timeout)?
            }
            InputRoute::RawText => decode_text(path, bytes)?,
        };
        if content.trim().is_empty() {
            return Err(ReportError::EmptyFile);
        }

        let mut format = match route {
            InputRoute::StructuredJson => ReportFormat::StructuredJson,
            InputRoute::RawText => ReportFormat::LegacyText,
        };
        let mut processes = find_processes(&content);
        if classify(&content, &processes) == ContentShape::NeedsTranslation {
            debug!(path = %path.display(), "no processes found in JSON content, translating");
            content = translate_incident(&content)?;
            processes = find_processes(&content);
            format = ReportFormat::IncidentReport;
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let report = ReportFile {
            path: path.to_path_buf(),
            filename,
            format,
            content,
            processes,
            build_ids: OnceLock::new(),
            symbolicated_content: None,
            save_suffix: self.save_suffix.clone(),
        };
        info!(
            path = %report.path.display(),
            format = %report.format,
            processes = report.processes.len(),
            "loaded crash report"
        );
        Ok(report)
    }
}
