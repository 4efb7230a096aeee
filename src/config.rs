//! Configuration module for Stackforge
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values (Google Compute Engine defaults)
//! - User configuration (~/.stackforge/config.toml or config.yaml)
//! - Project configuration (./stackforge.toml)
//! - Environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::telemetry::{LogFormat, LogLevel};

/// Default machine type: 1 vCPU, 3.75GB memory.
pub const DEFAULT_MACHINE_TYPE: &str = "n1-standard-1";

/// Default boot image, resolved from its image family.
pub const DEFAULT_MACHINE_IMAGE: &str = "ubuntu-1404-lts";

/// Deferred zone lookup, resolved by the provisioning engine from the region.
pub const DEFAULT_ZONE_LOOKUP: &str = "${lookup(var.zones, var.google_region)}";

/// Variable holding the provider credential; user templates must not reference it.
pub const CREDENTIALS_VARIABLE: &str = "google_credentials";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Provider defaults applied to instance declarations
    pub provider: ProviderDefaults,

    /// Boot-time configuration settings
    pub cloud_init: CloudInitSettings,

    /// Prefix of the generated per-resource deployment key variable
    pub deploy_key_prefix: String,

    /// Logging settings
    pub logging: LoggingSettings,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            provider: ProviderDefaults::default(),
            cloud_init: CloudInitSettings::default(),
            deploy_key_prefix: "deploy_keys_".to_string(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Defaults for one provider's compute instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderDefaults {
    /// Resource type holding compute instances
    pub instance_resource: String,

    /// Machine type used when none is set
    pub machine_type: String,

    /// Boot disk image used when no disk is declared
    pub image: String,

    /// Zone expression used when none is set
    pub zone: String,

    /// Network used by the default network interface
    pub network: String,

    /// Variables templates may never reference
    pub forbidden_variables: Vec<String>,

    /// Value written over forbidden variable declarations
    pub shadow_holder: String,
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            instance_resource: "google_compute_instance".to_string(),
            machine_type: DEFAULT_MACHINE_TYPE.to_string(),
            image: DEFAULT_MACHINE_IMAGE.to_string(),
            zone: DEFAULT_ZONE_LOOKUP.to_string(),
            network: "default".to_string(),
            forbidden_variables: vec![CREDENTIALS_VARIABLE.to_string()],
            shadow_holder: "FORBIDDEN".to_string(),
        }
    }
}

/// Cloud-init user settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudInitSettings {
    /// Supplementary groups for the provisioned user
    pub groups: Vec<String>,
}

impl Default for CloudInitSettings {
    fn default() -> Self {
        Self {
            groups: vec!["sudo".to_string()],
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level
    pub level: LogLevel,

    /// Output format
    pub format: LogFormat,

    /// Filter directive (e.g. `stackforge=debug`)
    pub filter: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            filter: None,
        }
    }
}

impl StackConfig {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = StackConfig::default();

        // First existing file wins
        if let Some(path) = Self::get_config_paths(config_path)
            .into_iter()
            .find(|p| p.exists())
        {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get the list of configuration file paths to check, highest priority first
    fn get_config_paths(explicit_path: Option<&Path>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.to_path_buf()];
        }

        let mut paths = Vec::new();

        if let Ok(env_config) = std::env::var("STACKFORGE_CONFIG") {
            paths.push(PathBuf::from(env_config));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".stackforge/config.toml"));
            paths.push(home.join(".stackforge/config.yaml"));
        }

        paths.push(PathBuf::from("stackforge.toml"));

        paths
    }

    /// Load from a specific file; the format follows the extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "toml" => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            _ => toml::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(machine_type) = std::env::var("STACKFORGE_MACHINE_TYPE") {
            if !machine_type.is_empty() {
                self.provider.machine_type = machine_type;
            }
        }

        if let Ok(image) = std::env::var("STACKFORGE_IMAGE") {
            if !image.is_empty() {
                self.provider.image = image;
            }
        }

        if let Ok(level) = std::env::var("STACKFORGE_LOG_LEVEL") {
            if let Ok(level) = level.parse() {
                self.logging.level = level;
            }
        }

        if let Ok(format) = std::env::var("STACKFORGE_LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                self.logging.format = format;
            }
        }
    }

    /// Name of the deployment key variable generated for `resource`.
    pub fn deploy_key_variable(&self, resource: &str) -> String {
        format!("{}{}", self.deploy_key_prefix, resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StackConfig::default();
        assert_eq!(config.provider.machine_type, "n1-standard-1");
        assert_eq!(config.provider.image, "ubuntu-1404-lts");
        assert_eq!(
            config.provider.zone,
            "${lookup(var.zones, var.google_region)}"
        );
        assert_eq!(config.provider.forbidden_variables, vec!["google_credentials"]);
        assert_eq!(config.cloud_init.groups, vec!["sudo"]);
        assert_eq!(config.deploy_key_variable("web"), "deploy_keys_web");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "deploy_key_prefix = \"keys_\"\n[provider]\nmachine_type = \"e2-small\"").unwrap();

        let config = StackConfig::from_file(file.path()).unwrap();
        assert_eq!(config.provider.machine_type, "e2-small");
        assert_eq!(config.provider.image, DEFAULT_MACHINE_IMAGE);
        assert_eq!(config.deploy_key_variable("db"), "keys_db");
    }

    #[test]
    fn test_yaml_config() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "cloud_init:\n  groups: [adm, docker]\nlogging:\n  level: debug\n  format: json").unwrap();

        let config = StackConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cloud_init.groups, vec!["adm", "docker"]);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "{{ not json").unwrap();

        let err = StackConfig::from_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse JSON config"));
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("STACKFORGE_MACHINE_TYPE", "e2-medium");
        std::env::set_var("STACKFORGE_LOG_LEVEL", "trace");
        let mut config = StackConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.provider.machine_type, "e2-medium");
        assert_eq!(config.logging.level, LogLevel::Trace);
        std::env::remove_var("STACKFORGE_MACHINE_TYPE");
        std::env::remove_var("STACKFORGE_LOG_LEVEL");
    }

    #[test]
    #[serial]
    fn test_load_explicit_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[provider]\nimage = \"debian-12\"").unwrap();

        let config = StackConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.provider.image, "debian-12");
    }
}
