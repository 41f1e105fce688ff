use anyhow::Result;

use crate::commands::load_report;

/// Print where the symbolicated version of a report should be written.
pub fn save_path_command(report: &str, config: Option<&str>) -> Result<()> {
    let report = load_report(report, config)?;
    println!("{}", report.symbolicated_content_save_path().display());
    Ok(())
}
