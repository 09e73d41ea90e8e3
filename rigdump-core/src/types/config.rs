//! Export configuration
//!
//! Defines the `rigdump.json` config file format.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::OrphanPolicy;
use crate::path_utils::output_filename;

/// Name of the config file looked up next to the scene
pub const CONFIG_FILE_NAME: &str = "rigdump.json";

/// Error types for config loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// The exporter configuration file (rigdump.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    /// Directory documents are written to; relative paths resolve against the scene file
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File name template; `{name}` is replaced by the armature object name
    #[serde(default = "default_filename_template")]
    pub filename_template: String,

    /// Write indented JSON
    #[serde(default = "default_true")]
    pub pretty: bool,

    /// Version recorded in `meta.exporter_version`
    #[serde(default = "default_exporter_version")]
    pub exporter_version: String,

    /// How to treat bones whose parent is missing
    #[serde(default)]
    pub orphan_policy: OrphanPolicy,

    /// Keep drivers that belong to no exported bone
    #[serde(default = "default_true")]
    pub include_unassigned_drivers: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./configs/bone_mappings")
}

fn default_filename_template() -> String {
    "{name}_structure.json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_exporter_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            filename_template: default_filename_template(),
            pretty: true,
            exporter_version: default_exporter_version(),
            orphan_policy: OrphanPolicy::default(),
            include_unassigned_drivers: true,
        }
    }
}

impl ExportConfig {
    /// Load a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load `rigdump.json` from `dir` if present, else defaults
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            tracing::debug!("Using config {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write this config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// File name for an armature's document
    pub fn filename_for(&self, armature_name: &str) -> String {
        output_filename(&self.filename_template, armature_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("./configs/bone_mappings"));
        assert!(config.pretty);
        assert_eq!(config.orphan_policy, OrphanPolicy::Reject);
        assert_eq!(config.filename_for("Rig"), "Rig_structure.json");
    }

    #[test]
    fn test_partial_config() {
        let config: ExportConfig =
            serde_json::from_str(r#"{ "orphanPolicy": "promoteToRoot", "pretty": false }"#).unwrap();
        assert_eq!(config.orphan_policy, OrphanPolicy::PromoteToRoot);
        assert!(!config.pretty);
        assert!(config.include_unassigned_drivers);
        assert_eq!(config.filename_template, "{name}_structure.json");
    }

    #[test]
    fn test_config_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            exporter_version: "9.9.9".to_string(),
            ..Default::default()
        };
        config.save(&dir.path().join(CONFIG_FILE_NAME)).unwrap();

        let loaded = ExportConfig::discover(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_discover_missing_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ExportConfig::discover(dir.path()).unwrap(), ExportConfig::default());
    }
}
