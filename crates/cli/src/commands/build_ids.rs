use anyhow::Result;

use crate::commands::load_report;

/// Identifiers to hand to a symbol lookup, one per report image, first-seen order.
pub fn collect_build_ids(report: &str, config: Option<&str>) -> Result<Vec<String>> {
    let report = load_report(report, config)?;
    Ok(report.build_ids_for_symbolication().iter().map(|id| id.to_string()).collect())
}

/// Print one build identifier per line.
pub fn build_ids_command(report: &str, config: Option<&str>) -> Result<()> {
    for id in collect_build_ids(report, config)? {
        println!("{id}");
    }
    Ok(())
}
