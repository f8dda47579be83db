//! Configuration management
//!
//! This module handles loading and migrating the bucket-mirror configuration
//! file and layering environment variables on top of it. The configuration
//! file is stored in TOML format at ~/.config/bucket-mirror/config.toml.
//!
//! PROTECTED FILE: Changes to schema_version require migration support.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current configuration schema version
///
/// IMPORTANT: Bumping this version requires:
/// 1. Adding a migration in `ConfigManager::migrate`
/// 2. Updating migration tests
/// 3. Marking the change as BREAKING
pub const SCHEMA_VERSION: u32 = 1;

/// Default AWS region
const DEFAULT_REGION: &str = "us-east-1";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Storage backend connection settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Mirroring defaults
    #[serde(default)]
    pub mirror: MirrorDefaults,
}

/// Connection details for the storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint URL for S3-compatible services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Access key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    /// Secret access key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Session token for temporary credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Use path-style bucket addressing
    #[serde(default)]
    pub force_path_style: bool,
}

/// Defaults for the mirror run itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorDefaults {
    /// Directory the `<bucket>` folder is created in
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    /// Create every missing parent directory of a file before writing it
    #[serde(default = "default_true")]
    pub create_parents: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_destination() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            session_token: None,
            force_path_style: false,
        }
    }
}

impl Default for MirrorDefaults {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            create_parents: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            backend: BackendConfig::default(),
            mirror: MirrorDefaults::default(),
        }
    }
}

impl BackendConfig {
    /// Apply the standard AWS environment variables on top of this config
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(region) = get("AWS_REGION") {
            self.region = region;
        }
        if let Some(endpoint) = get("AWS_ENDPOINT_URL") {
            self.endpoint = Some(endpoint);
        }
        if let Some(access_key) = get("AWS_ACCESS_KEY_ID") {
            self.access_key = Some(access_key);
        }
        if let Some(secret_key) = get("AWS_SECRET_ACCESS_KEY") {
            self.secret_key = Some(secret_key);
        }
        if let Some(token) = get("AWS_SESSION_TOKEN") {
            self.session_token = Some(token);
        }
    }

    /// Static credentials, when both keys are configured
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// Check that the settings can be used to build a client
    pub fn validate(&self) -> Result<()> {
        if self.region.is_empty() {
            return Err(Error::Config("Region cannot be empty".into()));
        }

        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)?;
        }

        match (&self.access_key, &self.secret_key) {
            (Some(_), None) => Err(Error::Config(
                "Access key is set but secret key is missing".into(),
            )),
            (None, Some(_)) => Err(Error::Config(
                "Secret key is set but access key is missing".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Configuration manager handles locating and loading config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        let config_path = config_dir.join("bucket-mirror").join("config.toml");
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// If the schema version doesn't match, attempts migration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade bucket-mirror.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(config)
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, config: Config) -> Result<Config> {
        let mut config = config;

        // Version 0 files predate the schema and share the v1 layout.
        tracing::debug!(from = config.schema_version, to = SCHEMA_VERSION, "migrating config");
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::TempDir;

    fn temp_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = ConfigManager::with_path(config_path);
        (manager, temp_dir)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.backend.region, "us-east-1");
        assert!(config.backend.endpoint.is_none());
        assert_eq!(config.mirror.destination, PathBuf::from("."));
        assert!(config.mirror.create_parents);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (manager, _temp_dir) = temp_config_manager();
        let config = manager.load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_load_file() {
        let (manager, _temp_dir) = temp_config_manager();
        let content = r#"
            schema_version = 1

            [backend]
            region = "eu-west-1"
            endpoint = "http://localhost:9000"
            force_path_style = true

            [mirror]
            destination = "/srv/mirror"
            create_parents = false
        "#;
        std::fs::write(manager.config_path(), content).unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.backend.region, "eu-west-1");
        assert_eq!(
            config.backend.endpoint.as_deref(),
            Some("http://localhost:9000")
        );
        assert!(config.backend.force_path_style);
        assert_eq!(config.mirror.destination, PathBuf::from("/srv/mirror"));
        assert!(!config.mirror.create_parents);
    }

    #[test]
    fn test_migrate_old_schema() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(manager.config_path(), "schema_version = 0\n").unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_schema_version_too_new() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = format!(
            r#"
            schema_version = {}
            "#,
            SCHEMA_VERSION + 1
        );
        std::fs::write(manager.config_path(), content).unwrap();

        let result = manager.load();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("newer than supported"));
    }

    #[test]
    fn test_invalid_toml() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(manager.config_path(), "schema_version = ").unwrap();

        assert!(matches!(manager.load(), Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_apply_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AWS_REGION", "ap-south-1"),
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_ENDPOINT_URL", ""),
        ]);

        let mut backend = BackendConfig {
            endpoint: Some("http://localhost:9000".into()),
            ..Default::default()
        };
        backend.apply_env_with(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(backend.region, "ap-south-1");
        // Empty variables leave the file value alone
        assert_eq!(backend.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(
            backend.static_credentials(),
            Some(("AKIDEXAMPLE", "secret"))
        );
        assert!(backend.session_token.is_none());
    }

    #[test]
    fn test_validate() {
        assert!(BackendConfig::default().validate().is_ok());

        let backend = BackendConfig {
            endpoint: Some("not a url".into()),
            ..Default::default()
        };
        assert!(matches!(backend.validate(), Err(Error::InvalidUrl(_))));

        let backend = BackendConfig {
            access_key: Some("AKIDEXAMPLE".into()),
            ..Default::default()
        };
        assert!(matches!(backend.validate(), Err(Error::Config(_))));

        let backend = BackendConfig {
            region: String::new(),
            ..Default::default()
        };
        assert!(backend.validate().is_err());
    }
}
