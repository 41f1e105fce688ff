use anyhow::{anyhow, Result};
use crashlog_core::config::write_config;
use crashlog_core::SymbolicatorConfig;

use crate::resolve_path;

/// Write a default config file (JSON or YAML, by extension).
pub fn init_config_command(path: &str, force: bool) -> Result<()> {
    let config_path = resolve_path(path)?;
    if config_path.exists() && !force {
        return Err(anyhow!(
            "Config already exists: {} (use --force to overwrite)",
            config_path.display()
        ));
    }

    let config = SymbolicatorConfig::default();
    write_config(&config_path, &config)?;

    println!("Wrote config:");
    println!("  Path: {}", config_path.display());
    println!("  Config version: {}", config.config_version);
    println!("  Filter timeout: {}s", config.filter_timeout_secs);
    println!("  Save suffix: {}", config.save_suffix);

    Ok(())
}
