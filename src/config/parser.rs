//! Settings parser for loading and layering promotion settings.
//!
//! Settings come from a YAML file with environment variable overrides on
//! top, so one file can serve several environments.

use crate::config::PromotionSettings;
use crate::error::{ConfigError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Parser for promotion settings.
#[derive(Debug, Default)]
pub struct SettingsParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl SettingsParser {
    /// Creates a new settings parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<PromotionSettings> {
        let path = path.as_ref();
        info!("Loading settings from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<PromotionSettings> {
        debug!("Parsing YAML settings");

        let settings: PromotionSettings = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ConfigError::Parse {
                message: format!("YAML parse error: {e}"),
                location,
            }
        })?;

        Ok(settings)
    }

    /// Loads settings with environment variable overrides.
    ///
    /// Environment variables are checked in the format:
    /// `SKALD_<KEY>` (e.g., `SKALD_BATCH_SIZE`)
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// value does not parse.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<PromotionSettings> {
        let mut settings = self.load_file(path)?;

        Self::apply_env_overrides(&mut settings)?;

        Ok(settings)
    }

    /// Builds settings from defaults and environment overrides alone, for
    /// runs without a settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if an override value does not parse.
    pub fn load_env_only(&self) -> Result<PromotionSettings> {
        debug!("No settings file, starting from defaults");
        let mut settings = PromotionSettings::default();

        Self::apply_env_overrides(&mut settings)?;

        Ok(settings)
    }

    /// Applies environment variable overrides to the settings.
    fn apply_env_overrides(settings: &mut PromotionSettings) -> Result<()> {
        if let Ok(batch_size) = std::env::var("SKALD_BATCH_SIZE") {
            debug!("Overriding batch_size from environment");
            settings.batch_size = batch_size.parse().map_err(|_| {
                ConfigError::invalid(
                    format!("SKALD_BATCH_SIZE is not a number: {batch_size}"),
                    "batch_size",
                )
            })?;
        }

        if let Ok(prune) = std::env::var("SKALD_PRUNE") {
            debug!("Overriding prune from environment");
            settings.prune = parse_bool(&prune).ok_or_else(|| {
                ConfigError::invalid(format!("SKALD_PRUNE is not a boolean: {prune}"), "prune")
            })?;
        }

        if let Ok(wait) = std::env::var("SKALD_LOCK_WAIT_SECS") {
            debug!("Overriding lock_wait_secs from environment");
            settings.lock_wait_secs = wait.parse().map_err(|_| {
                ConfigError::invalid(
                    format!("SKALD_LOCK_WAIT_SECS is not a number: {wait}"),
                    "lock_wait_secs",
                )
            })?;
        }

        if let Ok(expiry) = std::env::var("SKALD_LOCK_EXPIRY_SECS") {
            debug!("Overriding lock_expiry_secs from environment");
            settings.lock_expiry_secs = expiry.parse().map_err(|_| {
                ConfigError::invalid(
                    format!("SKALD_LOCK_EXPIRY_SECS is not a number: {expiry}"),
                    "lock_expiry_secs",
                )
            })?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::Parse {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Accepts the boolean spellings commonly found in environment variables.
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Default settings file names to search for.
pub const DEFAULT_SETTINGS_FILES: &[&str] = &[
    "skald.promote.yaml",
    "skald.promote.yml",
    "promote.yaml",
    "promote.yml",
];

/// Finds the settings file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no settings file is found.
pub fn find_settings_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_SETTINGS_FILES {
            let settings_path = current.join(filename);
            if settings_path.exists() {
                info!("Found settings file: {}", settings_path.display());
                return Ok(settings_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ConfigError::FileNotFound {
        path: start.join(DEFAULT_SETTINGS_FILES[0]),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceType;

    #[test]
    fn test_parse_empty_settings_yields_defaults() {
        let parser = SettingsParser::new();
        let settings = parser.parse_yaml("{}", None).expect("empty settings parse");

        assert_eq!(settings, PromotionSettings::default());
    }

    #[test]
    fn test_parse_full_settings() {
        let yaml = r"
batch_size: 10
prune: true
lock_wait_secs: 0
lock_expiry_secs: 60
types:
  - workflow
  - message_template
";
        let parser = SettingsParser::new();
        let settings = parser.parse_yaml(yaml, None).expect("full settings parse");

        assert_eq!(settings.batch_size, 10);
        assert!(settings.prune);
        assert_eq!(settings.lock_wait_secs, 0);
        assert_eq!(settings.lock_expiry_secs, 60);
        assert_eq!(
            settings.types,
            Some(vec![ResourceType::Workflow, ResourceType::MessageTemplate])
        );
    }

    #[test]
    fn test_parse_error_carries_the_source_location() {
        let parser = SettingsParser::new();
        let result = parser.parse_yaml("batch_size: [not, a, number]", Some(Path::new("bad.yaml")));

        match result {
            Err(crate::error::PromotionError::Config(ConfigError::Parse {
                location, ..
            })) => {
                assert_eq!(location.as_deref(), Some("bad.yaml"));
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let parser = SettingsParser::new();
        let result = parser.load_file("/nonexistent/skald.promote.yaml");

        assert!(matches!(
            result,
            Err(crate::error::PromotionError::Config(
                ConfigError::FileNotFound { .. }
            ))
        ));
    }

    #[test]
    fn test_find_settings_file_walks_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("create nested dirs");
        std::fs::write(dir.path().join("skald.promote.yaml"), "batch_size: 3\n")
            .expect("write settings");

        let found = find_settings_file(&nested).expect("settings file should be found");
        assert_eq!(found, dir.path().join("skald.promote.yaml"));

        let parsed = SettingsParser::new()
            .load_file(&found)
            .expect("settings should load");
        assert_eq!(parsed.batch_size, 3);
    }

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
