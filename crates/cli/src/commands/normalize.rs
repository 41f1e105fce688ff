use std::fs;
use std::io::Write;

use anyhow::{Context, Result};

use crate::commands::load_report;
use crate::resolve_path;

/// Write the canonical crash-log text of a report to `output`, or stdout.
pub fn normalize_command(report: &str, output: Option<&str>, config: Option<&str>) -> Result<()> {
    let report = load_report(report, config)?;

    match output {
        Some(output) => {
            let out_path = resolve_path(output)?;
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output dir: {}", parent.display())
                })?;
            }
            fs::write(&out_path, report.content()).with_context(|| {
                format!("Failed to write normalized report: {}", out_path.display())
            })?;
            eprintln!("Wrote {} ({}) to {}", report.filename(), report.format(), out_path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(report.content().as_bytes()).context("Failed to write to stdout")?;
            if !report.content().ends_with('\n') {
                writeln!(stdout).context("Failed to write to stdout")?;
            }
        }
    }

    Ok(())
}
