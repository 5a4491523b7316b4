/*!
 * Run settings
 *
 * Settings for a reconciliation pass, read from a JSON file. Every key is
 * optional; the command line overrides whatever the file says.
 */

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KeyfixError, KeyfixResult};
use crate::reconcile::ReconcileConfig;
use crate::store::RecordFilter;

/// Name of the SQLite database used when none is configured
pub const DEFAULT_DATABASE: &str = "keyfix.db";

/// How reports are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("text"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = KeyfixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(KeyfixError::ConfigError(format!(
                "unknown output format '{}', expected text or json",
                other
            ))),
        }
    }
}

/// Settings for one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Path to the SQLite database holding the records
    pub database: PathBuf,
    /// Write corrections instead of only reporting them
    pub apply: bool,
    /// Look at every record, not only those with an unknown expiration
    pub all_keys: bool,
    /// Only records of this owner; empty means everyone
    pub owner: Option<String>,
    /// At most this many records; 0 means no limit
    pub limit: u32,
    /// Debug-level logging
    pub verbose: bool,
    pub format: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            apply: false,
            all_keys: false,
            owner: None,
            limit: 0,
            verbose: false,
            format: OutputFormat::Text,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> KeyfixResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            KeyfixError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;

        let settings: Settings = serde_json::from_str(&text).map_err(|e| {
            KeyfixError::ConfigError(format!("invalid settings in {}: {}", path.display(), e))
        })?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings.normalized())
    }

    /// Load an explicitly named file, or the default file when it exists.
    ///
    /// A missing explicit file is an error; a missing default file yields
    /// the defaults.
    pub fn load_or_default(path: Option<&Path>) -> KeyfixResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// `keyfix/config.json` under the platform configuration directory
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("keyfix");
        path.push("config.json");
        Some(path)
    }

    /// Write the settings as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> KeyfixResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    // Empty owner means unset
    fn normalized(mut self) -> Self {
        if self.owner.as_deref().map_or(false, |o| o.trim().is_empty()) {
            self.owner = None;
        }
        self
    }

    /// The record filter these settings describe
    pub fn record_filter(&self) -> RecordFilter {
        RecordFilter {
            only_unset_expiration: !self.all_keys,
            owner: self
                .owner
                .as_deref()
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string),
            limit: (self.limit > 0).then_some(self.limit),
        }
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            apply: self.apply,
            filter: self.record_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_a_dry_run_over_unset_expirations() {
        let config = Settings::default().reconcile_config();
        assert!(!config.apply);
        assert!(config.filter.only_unset_expiration);
        assert_eq!(config.filter.owner, None);
        assert_eq!(config.filter.limit, None);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "apply": true, "limit": 25, "format": "json" }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!(settings.apply);
        assert_eq!(settings.format, OutputFormat::Json);
        assert_eq!(settings.database, PathBuf::from(DEFAULT_DATABASE));
        assert_eq!(settings.record_filter().limit, Some(25));
    }

    #[test]
    fn test_empty_owner_and_zero_limit_mean_unset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "owner": "  ", "limit": 0, "all_keys": true }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.owner, None);

        let filter = settings.record_filter();
        assert!(!filter.only_unset_expiration);
        assert_eq!(filter.limit, None);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let result = Settings::load_or_default(Some(missing.as_path()));
        assert!(matches!(result, Err(KeyfixError::ConfigError(_))));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "aply": true }"#).unwrap();

        assert!(matches!(Settings::load(&path), Err(KeyfixError::ConfigError(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let settings = Settings {
            owner: Some("bob".to_string()),
            verbose: true,
            ..Settings::default()
        };

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
