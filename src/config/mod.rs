use crate::models::OrganizerConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;
use std::io::ErrorKind;

/// File name of the persisted settings document
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Prefix for environment overrides, e.g. `FILEKEEPER_RESOURCE_LIMITS__MAX_CPU_PERCENT`
pub const ENV_PREFIX: &str = "FILEKEEPER";

/// Configuration manager for loading and saving the organizer settings.
///
/// The settings front end writes the document; the agent only reads it at
/// startup and persists edits made through
/// [`Organizer::update_config`](crate::Organizer::update_config).
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding `config.yaml`
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// ConfigManager at the fixed per-user location `<home>/.filekeeper`.
    pub fn user_default() -> Result<Self> {
        let home = dirs::home_dir().context("Could not determine the home directory")?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| anyhow::anyhow!("Home directory is not valid UTF-8: {}", p.display()))?;
        Self::new(home.join(".filekeeper"))
    }

    /// Load the organizer configuration.
    ///
    /// A missing, malformed or invalid document yields the built-in defaults.
    /// Environment overrides are layered on top of whichever base was used.
    /// Only a document that exists but cannot be read is an error.
    pub fn load_config(&self) -> Result<OrganizerConfig> {
        let contents = match fs::read_to_string(&self.config_path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    "Config file not found at {}, using defaults",
                    self.config_path
                );
                None
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config: {}", self.config_path));
            }
        };

        if let Some(contents) = contents {
            match Self::layered(Some(&contents)) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", self.config_path);
                    return Ok(config);
                }
                Err(e) => {
                    tracing::warn!(
                        "Config file {} is unusable ({:#}), using defaults",
                        self.config_path,
                        e
                    );
                }
            }
        }

        match Self::layered(None) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("Ignoring invalid environment overrides: {:#}", e);
                Ok(OrganizerConfig::default())
            }
        }
    }

    /// Defaults, then the YAML document if any, then the environment.
    fn layered(yaml: Option<&str>) -> Result<OrganizerConfig> {
        let defaults = serde_yaml_ng::to_string(&OrganizerConfig::default())
            .context("Failed to serialize default config")?;

        let mut builder =
            Config::builder().add_source(File::from_str(&defaults, FileFormat::Yaml));

        if let Some(yaml) = yaml {
            // Reject documents that are not a mapping before merging
            serde_yaml_ng::from_str::<OrganizerConfig>(yaml).context("Failed to parse config")?;
            builder = builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        }

        let config: OrganizerConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to merge config sources")?
            .try_deserialize()
            .context("Failed to deserialize config")?;

        config
            .validate()
            .map_err(|reason| anyhow::anyhow!("Invalid config: {}", reason))?;

        Ok(config)
    }

    /// Save the organizer configuration.
    pub fn save_config(&self, config: &OrganizerConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BaseDirs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_create_config_manager() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.config_path().ends_with(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_load_save_config() {
        let (manager, temp_dir) = create_test_config_manager();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

        let mut config = OrganizerConfig::default();
        config.base_dirs = BaseDirs::under(&root);
        config.resource_limits.max_cpu_percent = 42;
        manager.save_config(&config).unwrap();

        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.resource_limits.max_cpu_percent, 42);
        assert_eq!(loaded.base_dirs, config.base_dirs);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.schedule.archive_after_days, 30);
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_path(), "resource_limits: [not, a, map").unwrap();

        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.resource_limits.max_ram_percent, 70);
    }
}
