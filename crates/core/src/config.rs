use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::report::{DEFAULT_FILTER_TIMEOUT, DEFAULT_SAVE_SUFFIX};

/// Which report filter renders structured `.json` crash reports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    /// The in-process Apple-style renderer.
    #[default]
    Builtin,
    /// An external formatter reading JSON on stdin and writing crash text on stdout.
    Command {
        program: PathBuf,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
    },
    /// No filtering; structured reports are taken as raw text.
    Disabled,
}

/// Serializable settings for loading crash reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolicatorConfig {
    /// Schema/config version. This is about the config format, not the tool version.
    pub config_version: String,
    #[serde(default)]
    pub filter: FilterConfig,
    /// Upper bound on how long a filter may take to answer.
    #[serde(default = "default_filter_timeout_secs")]
    pub filter_timeout_secs: u64,
    /// Appended to the file stem of the suggested symbolicated output path.
    #[serde(default = "default_save_suffix")]
    pub save_suffix: String,
}

fn default_filter_timeout_secs() -> u64 {
    DEFAULT_FILTER_TIMEOUT.as_secs()
}

fn default_save_suffix() -> String {
    DEFAULT_SAVE_SUFFIX.to_string()
}

impl SymbolicatorConfig {
    /// The configured filter timeout, never shorter than one second.
    pub fn filter_timeout(&self) -> Duration {
        Duration::from_secs(self.filter_timeout_secs.max(1))
    }
}

impl Default for SymbolicatorConfig {
    fn default() -> Self {
        Self {
            config_version: "0.1.0".to_string(),
            filter: FilterConfig::default(),
            filter_timeout_secs: default_filter_timeout_secs(),
            save_suffix: default_save_suffix(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigSyntax {
    Json,
    Yaml,
}

fn syntax_for(path: &Path) -> Result<ConfigSyntax> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("json") => Ok(ConfigSyntax::Json),
        Some("yaml") | Some("yml") => Ok(ConfigSyntax::Yaml),
        _ => bail!("Unsupported config extension (expected .json, .yaml or .yml): {}", path.display()),
    }
}

/// Load a config file, picking JSON or YAML from its extension.
pub fn load_config(path: &Path) -> Result<SymbolicatorConfig> {
    let syntax = syntax_for(path)?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let config: SymbolicatorConfig = match syntax {
        ConfigSyntax::Json => serde_json::from_str(&text).context("Failed to parse config JSON")?,
        ConfigSyntax::Yaml => serde_yaml::from_str(&text).context("Failed to parse config YAML")?,
    };
    if config.filter_timeout_secs == 0 {
        bail!("filter_timeout_secs must be at least 1 in {}", path.display());
    }
    Ok(config)
}

/// Load `path` if given, otherwise the defaults.
pub fn load_config_or_default(path: Option<&Path>) -> Result<SymbolicatorConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(SymbolicatorConfig::default()),
    }
}

/// Write `config` to `path` as JSON or YAML depending on the extension.
pub fn write_config(path: &Path, config: &SymbolicatorConfig) -> Result<()> {
    let text = match syntax_for(path)? {
        ConfigSyntax::Json => serde_json::to_string_pretty(config)?,
        ConfigSyntax::Yaml => serde_yaml::to_string(config)?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("Failed to write config: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: SymbolicatorConfig =
            serde_json::from_str(r#"{"config_version":"0.1.0"}"#).unwrap();
        assert_eq!(config, SymbolicatorConfig::default());
    }

    #[test]
    fn command_filter_is_tagged() {
        let yaml = "config_version: 0.1.0\nfilter:\n  kind: command\n  program: /usr/bin/fmt\n  args: [--apple]\n";
        let config: SymbolicatorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.filter,
            FilterConfig::Command { program: "/usr/bin/fmt".into(), args: vec!["--apple".into()] }
        );
    }

    #[test]
    fn zero_timeout_is_raised_to_one_second() {
        let config = SymbolicatorConfig { filter_timeout_secs: 0, ..Default::default() };
        assert_eq!(config.filter_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(syntax_for(Path::new("config.toml")).is_err());
        assert_eq!(syntax_for(Path::new("c.YML")).unwrap(), ConfigSyntax::Yaml);
    }
}
