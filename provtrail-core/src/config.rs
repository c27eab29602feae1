//! Configuration system for provtrail.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> environment -> explicit overrides. Configuration is
//! loaded from `~/.config/provtrail/config.toml` and/or
//! `.provtrail/config.toml` in the workspace directory.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::attributes::Defaults;
use crate::render::Format;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvtrailConfig {
    pub database: DatabaseConfig,
    pub output: OutputConfig,
    pub lineage: LineageConfig,
    /// Initial default attribute groups for new definitions.
    #[serde(default)]
    pub defaults: Defaults,
}

/// Where the entity store lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, relative paths resolve against the working directory.
    pub path: PathBuf,
    /// Keep everything in memory; nothing is written to `path`.
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("provenance.db"),
            in_memory: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: Format,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageConfig {
    /// Maximum number of steps per chain; unlimited when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl ProvtrailConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.database.in_memory && self.database.path.as_os_str().is_empty() {
            problems.push("database.path is empty".to_string());
        }
        if self.lineage.max_depth == Some(0) {
            problems.push("lineage.max_depth must be at least 1".to_string());
        }
        problems
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `PROVTRAIL_`)
/// 3. Workspace-local config (`.provtrail/config.toml`)
/// 4. User config (`~/.config/provtrail/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ProvtrailConfig>,
) -> Result<ProvtrailConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(ProvtrailConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "provtrail", "provtrail") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".provtrail").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // PROVTRAIL_DATABASE__PATH, PROVTRAIL_OUTPUT__FORMAT, ...
    figment = figment.merge(Env::prefixed("PROVTRAIL_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProvtrailConfig::default();
        assert_eq!(config.database.path, PathBuf::from("provenance.db"));
        assert!(!config.database.in_memory);
        assert_eq!(config.output.format, Format::LogText);
        assert!(config.lineage.max_depth.is_none());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = ProvtrailConfig::default();
        overrides.database.in_memory = true;
        overrides.output.format = Format::Fhir;

        let config = load_config(None, Some(&overrides)).unwrap();
        assert!(config.database.in_memory);
        assert_eq!(config.output.format, Format::Fhir);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".provtrail");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[database]
path = "catalog/prov.db"

[output]
format = "flow-diagram"

[lineage]
max_depth = 8

[defaults.script]
name = "sample_etl.py"
version = "v1.9"
creator = "KG"

[defaults.governance]
name = "SOP z"
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.database.path, PathBuf::from("catalog/prov.db"));
        assert_eq!(config.output.format, Format::MermaidFlow);
        assert_eq!(config.lineage.max_depth, Some(8));
        assert_eq!(config.defaults.script.version.as_deref(), Some("v1.9"));
        assert_eq!(config.defaults.governance.name.as_deref(), Some("SOP z"));
        assert!(config.defaults.owner.name.is_none());
    }

    #[test]
    fn test_zero_depth_is_invalid() {
        let mut config = ProvtrailConfig::default();
        config.lineage.max_depth = Some(0);
        assert_eq!(config.validate().len(), 1);
    }
}
