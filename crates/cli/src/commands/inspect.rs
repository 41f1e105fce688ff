use anyhow::Result;
use crashlog_core::{ReportFile, ReportFormat};
use serde::Serialize;

use crate::commands::load_report;
use crate::sha256_file;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crashed_thread: Option<u32>,
    pub threads: usize,
    pub images: usize,
}

/// Everything `inspect` reports about a loaded crash report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub path: String,
    pub filename: String,
    pub format: ReportFormat,
    pub sha256: String,
    pub processes: Vec<ProcessSummary>,
    pub build_ids: Vec<String>,
    pub save_path: String,
}

impl ReportSummary {
    pub fn from_report(report: &ReportFile) -> Result<Self> {
        let processes = report
            .processes()
            .iter()
            .map(|p| ProcessSummary {
                name: p.name.clone(),
                pid: p.pid,
                identifier: p.identifier.clone(),
                version: p.version.clone(),
                architecture: p.architecture.clone(),
                crashed_thread: p.crashed_thread,
                threads: p.threads.len(),
                images: p.binary_images.len(),
            })
            .collect();
        Ok(Self {
            path: report.path().display().to_string(),
            filename: report.filename().to_string(),
            format: report.format(),
            sha256: sha256_file(report.path())?,
            processes,
            build_ids: report.build_ids_for_symbolication().iter().map(|id| id.to_string()).collect(),
            save_path: report.symbolicated_content_save_path().display().to_string(),
        })
    }
}

pub fn inspect_report(report: &str, config: Option<&str>) -> Result<ReportSummary> {
    let report = load_report(report, config)?;
    ReportSummary::from_report(&report)
}

/// Print a summary of a crash report.
pub fn inspect_command(report: &str, json: bool, config: Option<&str>) -> Result<()> {
    let summary = inspect_report(report, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Crash Report");
    println!("============");
    println!("File: {}", summary.filename);
    println!("Path: {}", summary.path);
    println!("Format: {}", summary.format);
    println!("SHA-256: {}", summary.sha256);
    println!("Save path: {}", summary.save_path);
    println!();

    if summary.processes.is_empty() {
        println!("No processes found.");
    } else {
        println!("Processes:");
        for p in &summary.processes {
            let pid = p.pid.map(|pid| format!(" [{pid}]")).unwrap_or_default();
            let arch = p.architecture.as_deref().unwrap_or("unknown arch");
            println!(
                "- {}{} ({}, {} threads, {} images)",
                p.name, pid, arch, p.threads, p.images
            );
        }
    }
    println!();

    println!("Build identifiers: {}", summary.build_ids.len());
    for id in &summary.build_ids {
        println!("  {id}");
    }

    Ok(())
}
