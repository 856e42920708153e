//! Application configuration loaded from `config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::license::gate::{DEFAULT_NOTICE_DAYS, DEFAULT_WARN_DAYS};
use crate::license::{IssuedKey, LicensePolicies, LicenseType, MAX_DURATION_DAYS};
use crate::validation::{
    default_sectors, FieldValidator, RuleError, RuleSpec, UploadPolicy, ValidationOptions,
};

const APP_DIR: &str = "ticketdesk";
const CONFIG_FILE: &str = "config.toml";

/// Error types for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("License type {license_type} has duration_days = {duration_days}, expected 1..={max}")]
    Duration {
        license_type: LicenseType,
        duration_days: i64,
        max: i64,
    },

    #[error("Invalid validation rule in config: {0}")]
    Rules(#[from] RuleError),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Log filter used when neither `-v` nor `TICKETDESK_LOG` is given
    pub log_level: Option<String>,
    pub license: LicenseSettings,
    pub upload: UploadPolicy,
    pub validation: ValidationSettings,
}

/// Where the license lives and what each tier grants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LicenseSettings {
    /// Directory for license state. Defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,
    pub license_file: PathBuf,
    pub machine_id_file: PathBuf,
    pub key_catalog_file: PathBuf,
    /// Secret the license file seal is keyed with
    pub seal_secret: String,
    pub warn_days: i64,
    pub notice_days: i64,
    pub types: LicensePolicies,
    /// Keys accepted for activation, in addition to the catalog file
    pub keys: Vec<IssuedKey>,
}

impl Default for LicenseSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            license_file: PathBuf::from("license.json"),
            machine_id_file: PathBuf::from(".machine_id"),
            key_catalog_file: PathBuf::from("keys.toml"),
            seal_secret: "ticketdesk-local-seal".to_string(),
            warn_days: DEFAULT_WARN_DAYS,
            notice_days: DEFAULT_NOTICE_DAYS,
            types: LicensePolicies::default(),
            keys: Vec::new(),
        }
    }
}

impl LicenseSettings {
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .map(|d| d.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR)),
        }
    }

    // Relative file names resolve under the data directory, absolute ones are kept

    pub fn license_file(&self) -> PathBuf {
        self.data_dir().join(&self.license_file)
    }

    pub fn machine_id_file(&self) -> PathBuf {
        self.data_dir().join(&self.machine_id_file)
    }

    pub fn key_catalog_file(&self) -> PathBuf {
        self.data_dir().join(&self.key_catalog_file)
    }
}

/// Extra rules and routing sectors for the helpdesk forms
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationSettings {
    pub rules: Vec<RuleSpec>,
    pub sectors: Vec<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            sectors: default_sectors(),
        }
    }
}

impl AppConfig {
    /// `config.toml` under the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one the default location is
    /// tried, and a missing file there means builtin defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from_file(&path),
                _ => {
                    debug!("no config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.check()?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Reject values the license gate cannot work with
    pub fn check(&self) -> Result<(), ConfigError> {
        if let Some((license_type, duration_days)) = self.license.types.invalid_duration() {
            return Err(ConfigError::Duration {
                license_type,
                duration_days,
                max: MAX_DURATION_DAYS,
            });
        }
        Ok(())
    }

    /// Validator over the builtin rules with configured overrides applied
    pub fn field_validator(&self) -> Result<FieldValidator, ConfigError> {
        Ok(FieldValidator::from_config(
            &self.validation.rules,
            self.upload.clone(),
        )?)
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            sectors: self.validation.sectors.clone(),
            ..ValidationOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldState;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.license.warn_days, 7);
        assert_eq!(config.license.notice_days, 15);
        assert_eq!(config.upload.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.validation.sectors.len(), 4);
        assert!(config.license.keys.is_empty());
    }

    #[test]
    fn test_load_full_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
log_level = "debug"

[license]
data_dir = "/var/lib/ticketdesk"
seal_secret = "clinic-secret"
warn_days = 3

[license.types.enterprise]
duration_days = 365

[license.types.enterprise.features]
max_users = 500
max_tickets = 100000
flags = ["api_access"]

[[license.keys]]
key = "DESK-AAAA-BBBB-CCCC-DDDD"
license_type = "enterprise"

[upload]
max_bytes = 1048576

[validation]
sectors = ["T.I", "Compras"]

[[validation.rules]]
field = "ramal"
required = true
max_length = 4
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.license.warn_days, 3);
        assert_eq!(config.license.notice_days, 15);
        assert_eq!(
            config.license.license_file(),
            PathBuf::from("/var/lib/ticketdesk/license.json")
        );
        assert_eq!(config.license.types.get(LicenseType::Enterprise).duration_days, 365);
        assert_eq!(config.license.types.get(LicenseType::Standard).duration_days, 30);
        assert_eq!(config.license.keys[0].license_type, LicenseType::Enterprise);
        assert_eq!(config.upload.max_bytes, 1_048_576);
        assert_eq!(config.upload.allowed_mime_types.len(), 3);
        assert_eq!(config.validation_options().sectors, vec!["T.I", "Compras"]);

        let validator = config.field_validator().unwrap();
        let mut ramal = FieldState::new("ramal", "12345");
        assert!(!validator.validate_field(&mut ramal));
    }

    #[test]
    fn test_absolute_file_overrides_data_dir() {
        let settings = LicenseSettings {
            data_dir: Some(PathBuf::from("/data")),
            license_file: PathBuf::from("/etc/ticketdesk/license.json"),
            ..LicenseSettings::default()
        };
        assert_eq!(settings.license_file(), PathBuf::from("/etc/ticketdesk/license.json"));
        assert_eq!(settings.machine_id_file(), PathBuf::from("/data/.machine_id"));
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = AppConfig::load(Some(&temp_dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_out_of_range_duration_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        for duration_days in ["0", "-1", "100000000"] {
            fs::write(
                &path,
                format!(
                    "[license.types.professional]\nduration_days = {}\n\n[license.types.professional.features]\nmax_users = 10\nmax_tickets = 100\n",
                    duration_days
                ),
            )
            .unwrap();
            assert!(matches!(
                AppConfig::load(Some(&path)),
                Err(ConfigError::Duration {
                    license_type: LicenseType::Professional,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[license\nwarn_days = 3").unwrap();
        assert!(matches!(AppConfig::load(Some(&path)), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_bad_rule_pattern() {
        let config = AppConfig {
            validation: ValidationSettings {
                rules: vec![RuleSpec {
                    field: "ramal".to_string(),
                    label: None,
                    required: false,
                    min_length: None,
                    max_length: None,
                    pattern: Some("[0-9".to_string()),
                    message: None,
                }],
                sectors: default_sectors(),
            },
            ..AppConfig::default()
        };
        assert!(matches!(config.field_validator(), Err(ConfigError::Rules(_))));
    }
}
