use std::path::Path;

use anyhow::{Context, Result};
use crashlog_core::config::load_config_or_default;
use crashlog_core::{ReportFile, ReportLoader};
use tracing::debug;

use crate::resolve_path;

/// Build a report loader from an optional config file path.
pub fn loader_from_config(config: Option<&str>) -> Result<ReportLoader> {
    let config_path = config.map(resolve_path).transpose()?;
    let config = load_config_or_default(config_path.as_deref())?;
    let loader = ReportLoader::from_config(&config);
    debug!(config = ?config_path, ?loader, "report loader ready");
    Ok(loader)
}

/// Resolve `report` and load it with the loader described by `config`.
pub fn load_report(report: &str, config: Option<&str>) -> Result<ReportFile> {
    let loader = loader_from_config(config)?;
    let path = resolve_path(report)?;
    load_with(&loader, &path)
}

pub fn load_with(loader: &ReportLoader, path: &Path) -> Result<ReportFile> {
    loader.load(path).with_context(|| format!("Failed to load crash report {}", path.display()))
}
